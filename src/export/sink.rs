use std::collections::HashSet;
use std::io::{Cursor, Write};

use anyhow::Context;

use crate::foundation::error::{SpriteFrameError, SpriteFrameResult};

/// Sink contract for named export entries.
///
/// Entry names must be unique; a repeated name is a caller bug and is rejected.
pub trait ArchiveSink: Send {
    /// Add one named byte buffer.
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> SpriteFrameResult<()>;
    /// Finalize and return the archive bytes. No entries may be added afterwards.
    fn finish(&mut self) -> SpriteFrameResult<Vec<u8>>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    entries: Vec<(String, Vec<u8>)>,
    names: HashSet<String>,
    finished: bool,
}

#[derive(serde::Serialize)]
struct ManifestEntry<'a> {
    name: &'a str,
    bytes: usize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(String, Vec<u8>)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl ArchiveSink for InMemoryArchive {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> SpriteFrameResult<()> {
        if self.finished {
            return Err(SpriteFrameError::archive("archive already finished"));
        }
        if !self.names.insert(name.to_string()) {
            return Err(SpriteFrameError::archive(format!(
                "duplicate entry name '{name}'"
            )));
        }
        self.entries.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }

    /// Returns a JSON manifest (`[{name, bytes}]`); the entries stay readable.
    fn finish(&mut self) -> SpriteFrameResult<Vec<u8>> {
        self.finished = true;
        let manifest: Vec<ManifestEntry<'_>> = self
            .entries
            .iter()
            .map(|(name, bytes)| ManifestEntry {
                name,
                bytes: bytes.len(),
            })
            .collect();
        Ok(serde_json::to_vec_pretty(&manifest)?)
    }
}

/// ZIP archive built in memory.
pub struct ZipArchive {
    zip: Option<zip::ZipWriter<Cursor<Vec<u8>>>>,
    method: zip::CompressionMethod,
    names: HashSet<String>,
}

impl Default for ZipArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchive {
    /// Deflate-compressed archive.
    pub fn new() -> Self {
        Self::with_compression(zip::CompressionMethod::Deflated)
    }

    pub fn with_compression(method: zip::CompressionMethod) -> Self {
        Self {
            zip: Some(zip::ZipWriter::new(Cursor::new(Vec::new()))),
            method,
            names: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ArchiveSink for ZipArchive {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> SpriteFrameResult<()> {
        let zip = self
            .zip
            .as_mut()
            .ok_or_else(|| SpriteFrameError::archive("archive already finished"))?;
        if !self.names.insert(name.to_string()) {
            return Err(SpriteFrameError::archive(format!(
                "duplicate entry name '{name}'"
            )));
        }
        let options = zip::write::SimpleFileOptions::default().compression_method(self.method);
        zip.start_file(name, options)
            .with_context(|| format!("failed to start zip entry: {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write zip entry: {name}"))?;
        Ok(())
    }

    fn finish(&mut self) -> SpriteFrameResult<Vec<u8>> {
        let zip = self
            .zip
            .take()
            .ok_or_else(|| SpriteFrameError::archive("archive already finished"))?;
        let cursor = zip.finish().context("failed to finish zip archive")?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/sink.rs"]
mod tests;
