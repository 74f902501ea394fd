use std::collections::HashSet;
use std::io::Cursor;
use std::str::FromStr;

use anyhow::Context;
use rayon::prelude::*;
use serde_json::Value;

use crate::{
    anim::parse::AnimationDoc,
    anim::symbols::{SymbolTable, build_symbol_table},
    atlas::index::{AtlasIndex, MatchOpts, build_atlas_index_with},
    atlas::names::{sanitize_file_name, strip_extension},
    export::fingerprint::{FrameFingerprint, fingerprint_commands},
    export::sink::ArchiveSink,
    foundation::core::FrameIndex,
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    render::bitmap::BitmapSource,
    render::compositor::{
        CompositeOpts, Composited, Compositor, DegenerateReason, PaintStrategy, RenderedFrame,
    },
    resolve::frames::discover_frame_indices_within,
    resolve::resolver::{ResolveOpts, ResolveReport, resolve_frame_report},
};

const MAX_NESTING: u32 = 32;
const MAX_INDEX_WIDTH: usize = 20;

/// What to emit for a frame that could not be reconstructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Transparent surface of the frame size (1x1 for empty frames).
    #[default]
    Placeholder,
    /// No archive entry.
    Skip,
    /// Raw source region of the frame's first command.
    FirstSprite,
}

impl FromStr for DegeneratePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "skip" => Ok(Self::Skip),
            "first_sprite" => Ok(Self::FirstSprite),
            other => Err(format!(
                "unknown degenerate policy '{other}' (expected placeholder, skip or first-sprite)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportThreading {
    pub parallel: bool,
    pub chunk_size: usize,
    pub threads: Option<usize>,
}

impl Default for ExportThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Options for [`export_all_frames`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportOpts {
    pub resolve: ResolveOpts,
    pub matching: MatchOpts,
    pub composite: CompositeOpts,
    pub degenerate: DegeneratePolicy,
    /// Skip frames whose resolved commands equal the previous frame's.
    pub dedupe_consecutive: bool,
    /// Add a `metadata.json` entry describing every emitted frame.
    pub write_metadata: bool,
    /// Archive folder for frame entries; empty puts them at the root.
    pub folder: String,
    /// Zero-padding width of the frame index in entry names.
    pub index_width: usize,
    /// Most frame indices one animation may cover; larger timelines fail `prepare`.
    pub max_frames: u64,
    pub threading: ExportThreading,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            resolve: ResolveOpts::default(),
            matching: MatchOpts::default(),
            composite: CompositeOpts::default(),
            degenerate: DegeneratePolicy::default(),
            dedupe_consecutive: false,
            write_metadata: true,
            folder: "frames".to_string(),
            index_width: 4,
            max_frames: 100_000,
            threading: ExportThreading::default(),
        }
    }
}

impl ExportOpts {
    pub fn validate(&self) -> SpriteFrameResult<()> {
        if self.resolve.max_depth > MAX_NESTING {
            return Err(SpriteFrameError::validation(format!(
                "max_depth must be <= {MAX_NESTING}, got {}",
                self.resolve.max_depth
            )));
        }
        if self.index_width == 0 || self.index_width > MAX_INDEX_WIDTH {
            return Err(SpriteFrameError::validation(format!(
                "index_width must be in 1..={MAX_INDEX_WIDTH}, got {}",
                self.index_width
            )));
        }
        if self.resolve.max_commands == 0 {
            return Err(SpriteFrameError::validation("max_commands must be >= 1"));
        }
        if self.max_frames == 0 {
            return Err(SpriteFrameError::validation("max_frames must be >= 1"));
        }
        if self.composite.max_side == 0 {
            return Err(SpriteFrameError::validation("max_side must be >= 1"));
        }
        if self.threading.threads == Some(0) {
            return Err(SpriteFrameError::validation(
                "export threading 'threads' must be >= 1 when set",
            ));
        }
        if self.folder.split('/').any(|part| part == "..") {
            return Err(SpriteFrameError::validation(format!(
                "folder '{}' must not contain '..'",
                self.folder
            )));
        }
        Ok(())
    }
}

/// Everything one export needs, parsed and validated up front.
pub struct ExportJob<'a> {
    bitmap: &'a dyn BitmapSource,
    atlas: AtlasIndex,
    symbols: SymbolTable,
    doc: AnimationDoc,
    frames: Vec<FrameIndex>,
    opts: ExportOpts,
}

impl<'a> ExportJob<'a> {
    /// Parse both descriptors and discover the frames to export.
    ///
    /// Fails only on structural problems: invalid options, an atlas without sprites, an
    /// animation without a main timeline, or one covering more than `max_frames` indices.
    pub fn prepare(
        bitmap: &'a dyn BitmapSource,
        atlas_json: &Value,
        anim_json: &Value,
        opts: &ExportOpts,
    ) -> SpriteFrameResult<Self> {
        opts.validate()?;
        let atlas = build_atlas_index_with(atlas_json, opts.matching)?;
        let doc = AnimationDoc::from_json(anim_json)?;
        let symbols = build_symbol_table(anim_json);
        if doc.timeline.is_empty() {
            tracing::warn!("main timeline has no frame records; exporting frame 0 only");
        }
        let frames = discover_frame_indices_within(&doc.timeline, opts.max_frames)?;

        tracing::info!(
            sprites = atlas.len(),
            symbols = symbols.len(),
            frames = frames.len(),
            animation = doc.name.as_deref().unwrap_or(""),
            "export job prepared"
        );

        Ok(Self {
            bitmap,
            atlas,
            symbols,
            doc,
            frames,
            opts: opts.clone(),
        })
    }

    pub fn atlas(&self) -> &AtlasIndex {
        &self.atlas
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn animation(&self) -> &AnimationDoc {
        &self.doc
    }

    pub fn frames(&self) -> &[FrameIndex] {
        &self.frames
    }

    /// Archive entry name of `frame`.
    pub fn entry_name(&self, frame: FrameIndex) -> String {
        frame_entry_name(
            &self.opts.folder,
            self.doc.name.as_deref(),
            frame,
            self.opts.index_width,
        )
    }

    pub fn resolve(&self, frame: FrameIndex) -> ResolveReport {
        resolve_frame_report(
            &self.doc.timeline,
            &self.symbols,
            &self.atlas,
            frame,
            &self.opts.resolve,
        )
    }

    /// Resolve and composite one frame without touching an archive.
    pub fn render(&self, frame: FrameIndex) -> SpriteFrameResult<Composited> {
        self.render_report(frame, &self.resolve(frame))
    }

    /// Composite an already resolved `report` of `frame`.
    pub fn render_report(
        &self,
        frame: FrameIndex,
        report: &ResolveReport,
    ) -> SpriteFrameResult<Composited> {
        Compositor::new(self.opts.composite).composite(
            &report.commands,
            self.bitmap,
            &self.entry_name(frame),
        )
    }
}

/// `<folder>/<animation>_<index>.png`, or `<folder>/frame_<index>.png` without a name.
pub fn frame_entry_name(
    folder: &str,
    animation: Option<&str>,
    frame: FrameIndex,
    width: usize,
) -> String {
    let stem = animation
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(sanitize_file_name)
        .unwrap_or_else(|| "frame".to_string());
    let file = format!("{stem}_{:0width$}.png", frame.0);
    in_folder(folder, &file)
}

fn in_folder(folder: &str, file: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        file.to_string()
    } else {
        format!("{folder}/{file}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExportStats {
    pub frames_total: u64,
    pub frames_written: u64,
    pub frames_deduped: u64,
    /// Frames that could not be reconstructed, whatever the policy did with them.
    pub frames_degenerate: u64,
    pub frames_skipped: u64,
    pub frames_failed: u64,
    pub issues: u64,
}

/// How an emitted frame entry was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameOutcome {
    Painted { strategy: PaintStrategy },
    Placeholder { reason: DegenerateReason },
    FirstSprite { reason: DegenerateReason },
}

/// One `metadata.json` frame record.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameEntry {
    pub file: String,
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    pub origin_x: i64,
    pub origin_y: i64,
    pub commands: usize,
    pub outcome: FrameOutcome,
}

#[derive(serde::Serialize)]
struct ExportMetadata<'a> {
    animation: Option<&'a str>,
    frame_rate: Option<f64>,
    sprites: usize,
    symbols: usize,
    degenerate_policy: DegeneratePolicy,
    stats: &'a ExportStats,
    frames: &'a [FrameEntry],
}

struct FramePlan {
    index: FrameIndex,
    name: String,
    report: ResolveReport,
    duplicate: bool,
}

enum FrameResult {
    Written {
        entry: FrameEntry,
        png: Vec<u8>,
        degenerate: bool,
    },
    Skipped,
}

/// Export every discovered frame of `job` into `sink`, in frame order.
///
/// Per-frame failures are logged, reported through `progress` and counted; only structural or
/// archive errors abort the export. The sink is left unfinished.
#[tracing::instrument(skip(job, sink, progress), fields(frames = job.frames.len()))]
pub fn export_all_frames(
    job: &ExportJob<'_>,
    sink: &mut dyn ArchiveSink,
    progress: Option<&mut dyn FnMut(&str)>,
) -> SpriteFrameResult<ExportStats> {
    let mut progress = progress;
    let mut stats = ExportStats {
        frames_total: job.frames.len() as u64,
        ..ExportStats::default()
    };
    let mut entries = Vec::<FrameEntry>::with_capacity(job.frames.len());
    let total = job.frames.len();
    let chunk_size = normalized_chunk_size(job.opts.threading.chunk_size);
    let pool = if job.opts.threading.parallel {
        Some(build_thread_pool(job.opts.threading.threads)?)
    } else {
        None
    };
    let mut serial = Compositor::new(job.opts.composite);
    let mut previous: Option<FrameFingerprint> = None;
    let mut done = 0usize;

    for chunk in job.frames.chunks(chunk_size) {
        let mut plans = Vec::with_capacity(chunk.len());
        for &index in chunk {
            let report = job.resolve(index);
            for issue in &report.issues {
                stats.issues += 1;
                notify(&mut progress, &format!("frame {}: {issue}", index.0));
            }
            let mut duplicate = false;
            if job.opts.dedupe_consecutive {
                let fp = fingerprint_commands(&report.commands);
                duplicate = previous == Some(fp);
                previous = Some(fp);
            }
            plans.push(FramePlan {
                index,
                name: job.entry_name(index),
                report,
                duplicate,
            });
        }

        let todo: Vec<&FramePlan> = plans.iter().filter(|p| !p.duplicate).collect();
        let results: Vec<SpriteFrameResult<FrameResult>> = match &pool {
            Some(pool) => pool.install(|| {
                todo.par_iter()
                    .map_init(
                        || Compositor::new(job.opts.composite),
                        |compositor, plan| render_plan(job, compositor, plan),
                    )
                    .collect()
            }),
            None => todo
                .iter()
                .map(|plan| render_plan(job, &mut serial, plan))
                .collect(),
        };
        let mut results = results.into_iter();

        for plan in &plans {
            done += 1;
            if plan.duplicate {
                stats.frames_deduped += 1;
                tracing::debug!(frame = plan.index.0, "unchanged frame skipped");
                notify(
                    &mut progress,
                    &format!("frame {}: unchanged, skipped ({done}/{total})", plan.index.0),
                );
                continue;
            }
            let result = results.next().ok_or_else(|| {
                SpriteFrameError::render("internal error: frame result missing")
            })?;
            match result {
                Ok(FrameResult::Written {
                    entry,
                    png,
                    degenerate,
                }) => {
                    sink.add_entry(&entry.file, &png)?;
                    stats.frames_written += 1;
                    if degenerate {
                        stats.frames_degenerate += 1;
                    }
                    notify(
                        &mut progress,
                        &format!("wrote {} ({done}/{total})", entry.file),
                    );
                    entries.push(entry);
                }
                Ok(FrameResult::Skipped) => {
                    stats.frames_degenerate += 1;
                    stats.frames_skipped += 1;
                    notify(
                        &mut progress,
                        &format!("frame {}: degenerate, skipped ({done}/{total})", plan.index.0),
                    );
                }
                Err(e) if e.is_structural() => return Err(e),
                Err(e) => {
                    stats.frames_failed += 1;
                    tracing::warn!(frame = plan.index.0, error = %e, "frame export failed");
                    notify(
                        &mut progress,
                        &format!("frame {} failed: {e} ({done}/{total})", plan.index.0),
                    );
                }
            }
        }
    }

    if job.opts.write_metadata {
        let meta = ExportMetadata {
            animation: job.doc.name.as_deref(),
            frame_rate: job.doc.frame_rate,
            sprites: job.atlas.len(),
            symbols: job.symbols.len(),
            degenerate_policy: job.opts.degenerate,
            stats: &stats,
            frames: &entries,
        };
        sink.add_entry("metadata.json", &serde_json::to_vec_pretty(&meta)?)?;
    }

    tracing::info!(
        written = stats.frames_written,
        deduped = stats.frames_deduped,
        degenerate = stats.frames_degenerate,
        failed = stats.frames_failed,
        "export finished"
    );
    Ok(stats)
}

fn render_plan(
    job: &ExportJob<'_>,
    compositor: &mut Compositor,
    plan: &FramePlan,
) -> SpriteFrameResult<FrameResult> {
    let commands = &plan.report.commands;
    let composited = compositor.composite(commands, job.bitmap, &plan.name)?;

    let (frame, outcome, degenerate) = match composited {
        Composited::Painted { frame, strategy } => {
            (frame, FrameOutcome::Painted { strategy }, false)
        }
        Composited::Degenerate { blank, reason } => match job.opts.degenerate {
            DegeneratePolicy::Skip => return Ok(FrameResult::Skipped),
            DegeneratePolicy::Placeholder => (blank, FrameOutcome::Placeholder { reason }, true),
            DegeneratePolicy::FirstSprite => match first_sprite(job, plan) {
                Some(frame) => (frame, FrameOutcome::FirstSprite { reason }, true),
                None => (blank, FrameOutcome::Placeholder { reason }, true),
            },
        },
    };

    let png = frame.encode_png()?;
    Ok(FrameResult::Written {
        entry: FrameEntry {
            file: plan.name.clone(),
            frame: plan.index.0,
            width: frame.width,
            height: frame.height,
            origin_x: frame.origin_x,
            origin_y: frame.origin_y,
            commands: commands.len(),
            outcome,
        },
        png,
        degenerate,
    })
}

fn first_sprite(job: &ExportJob<'_>, plan: &FramePlan) -> Option<RenderedFrame> {
    let cmd = plan.report.commands.first()?;
    match job.bitmap.region_premul(cmd.source_rect) {
        Ok(region) => Some(RenderedFrame::from_region(plan.name.clone(), region)),
        Err(e) => {
            tracing::warn!(frame = plan.index.0, error = %e, "first sprite unreadable; using placeholder");
            None
        }
    }
}

fn notify(progress: &mut Option<&mut dyn FnMut(&str)>, msg: &str) {
    if let Some(p) = progress {
        (*p)(msg);
    }
}

fn build_thread_pool(threads: Option<usize>) -> SpriteFrameResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SpriteFrameError::validation(
            "export threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SpriteFrameError::render(format!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> usize {
    chunk_size.max(1)
}

/// Options for [`export_atlas_pieces`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PieceOpts {
    pub folder: String,
    /// Pieces with a larger side are scaled down proportionally.
    pub max_side: u32,
}

impl Default for PieceOpts {
    fn default() -> Self {
        Self {
            folder: "pieces".to_string(),
            max_side: 4096,
        }
    }
}

/// Cut every atlas sprite into its own upright PNG entry. Returns the number of pieces written.
///
/// Unreadable regions are logged and skipped.
#[tracing::instrument(skip(bitmap, atlas, sink, opts, progress), fields(sprites = atlas.len()))]
pub fn export_atlas_pieces(
    bitmap: &dyn BitmapSource,
    atlas: &AtlasIndex,
    sink: &mut dyn ArchiveSink,
    opts: &PieceOpts,
    progress: Option<&mut dyn FnMut(&str)>,
) -> SpriteFrameResult<usize> {
    if opts.max_side == 0 {
        return Err(SpriteFrameError::validation("max_side must be >= 1"));
    }
    let mut progress = progress;
    let mut used = HashSet::<String>::new();
    let mut written = 0usize;

    for (name, rect) in atlas.iter() {
        let region = match bitmap.region_premul(rect) {
            Ok(region) => region,
            Err(e) => {
                tracing::warn!(sprite = name, error = %e, "sprite region unreadable; piece skipped");
                notify(&mut progress, &format!("piece '{name}' skipped: {e}"));
                continue;
            }
        };

        let mut img = RenderedFrame::from_region(name, region).to_rgba_image()?;
        if rect.rotated {
            img = image::imageops::rotate270(&img);
        }
        let img = fit_within(img, opts.max_side);

        let file = unique_piece_name(&mut used, name);
        let entry = in_folder(&opts.folder, &file);
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .with_context(|| format!("encode png '{entry}'"))?;
        sink.add_entry(&entry, &png)?;
        written += 1;
        notify(&mut progress, &format!("wrote {entry}"));
    }

    Ok(written)
}

fn fit_within(img: image::RgbaImage, max_side: u32) -> image::RgbaImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return img;
    }
    let scale = f64::from(max_side) / f64::from(longest);
    let nw = ((f64::from(w) * scale).round() as u32).clamp(1, max_side);
    let nh = ((f64::from(h) * scale).round() as u32).clamp(1, max_side);
    image::imageops::resize(&img, nw, nh, image::imageops::FilterType::Triangle)
}

fn unique_piece_name(used: &mut HashSet<String>, sprite: &str) -> String {
    let stem = sanitize_file_name(strip_extension(sprite));
    let mut file = format!("{stem}.png");
    let mut n = 2;
    while !used.insert(file.clone()) {
        file = format!("{stem}_{n}.png");
        n += 1;
    }
    file
}

#[cfg(test)]
#[path = "../../tests/unit/export/pipeline.rs"]
mod tests;
