use std::collections::HashMap;

use serde_json::Value;

use crate::{
    atlas::names,
    foundation::core::SpriteRect,
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    foundation::json,
};

/// Tuning for the last-resort fuzzy name match.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchOpts {
    /// Largest accepted edit distance divided by the longer name length.
    pub max_normalized_distance: f64,
}

impl Default for MatchOpts {
    fn default() -> Self {
        Self {
            max_normalized_distance: 0.3,
        }
    }
}

/// Descriptor layout an [`AtlasIndex`] was parsed from, in the order they are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum AtlasShape {
    /// Explicit list of `{name, x, y, w, h}` records (`ATLAS.SPRITES[].SPRITE`).
    SpriteList,
    /// Packer-style keyed map or array under `frames`.
    FrameMap,
    /// Any nested object exposing numeric `x, y, w, h` plus a `name`/`key`.
    RecursiveScan,
}

impl AtlasShape {
    const PRIORITY: [AtlasShape; 3] = [
        AtlasShape::SpriteList,
        AtlasShape::FrameMap,
        AtlasShape::RecursiveScan,
    ];

    fn parse(self, desc: &Value) -> Vec<(String, SpriteRect)> {
        match self {
            AtlasShape::SpriteList => parse_sprite_list(desc),
            AtlasShape::FrameMap => parse_frame_map(desc),
            AtlasShape::RecursiveScan => {
                let mut out = Vec::new();
                scan_rects(desc, &mut out);
                out
            }
        }
    }
}

/// How a sprite reference was matched to an atlas key.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub enum MatchKind {
    /// The reference is an atlas key.
    Exact,
    /// Matched after adding or removing an image extension.
    Extension,
    /// Matched on the numeric part of the name (`img_0014` -> `0014`).
    Numeric,
    /// Matched after case/diacritic/separator normalization.
    Normalized,
    /// Low-confidence edit-distance match.
    Fuzzy {
        /// Normalized edit distance of the accepted key.
        distance: f64,
    },
}

/// Result of [`AtlasIndex::resolve`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteMatch<'a> {
    /// Canonical atlas key.
    pub name: &'a str,
    /// Source rectangle in the atlas bitmap.
    pub rect: SpriteRect,
    /// Resolution stage that produced the match.
    pub kind: MatchKind,
}

#[derive(Clone, Debug)]
struct AtlasEntry {
    name: String,
    normalized: String,
    rect: SpriteRect,
}

/// Sprite name -> source rectangle lookup with alias resolution.
#[derive(Clone, Debug)]
pub struct AtlasIndex {
    entries: Vec<AtlasEntry>,
    by_name: HashMap<String, usize>,
    by_stem: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
    by_number: HashMap<u64, Vec<usize>>,
    shape: AtlasShape,
    opts: MatchOpts,
}

/// Parse an atlas descriptor with default matching options.
pub fn build_atlas_index(desc: &Value) -> SpriteFrameResult<AtlasIndex> {
    build_atlas_index_with(desc, MatchOpts::default())
}

/// Parse an atlas descriptor, trying each [`AtlasShape`] in priority order.
///
/// Fails when no shape yields a single sprite.
pub fn build_atlas_index_with(desc: &Value, opts: MatchOpts) -> SpriteFrameResult<AtlasIndex> {
    if !(0.0..=1.0).contains(&opts.max_normalized_distance) {
        return Err(SpriteFrameError::validation(
            "max_normalized_distance must be within [0, 1]",
        ));
    }
    for shape in AtlasShape::PRIORITY {
        let records = shape.parse(desc);
        if records.is_empty() {
            continue;
        }
        tracing::debug!(?shape, sprites = records.len(), "parsed atlas descriptor");
        return Ok(AtlasIndex::from_records(records, shape, opts));
    }
    Err(SpriteFrameError::validation(
        "no sprites found in atlas descriptor",
    ))
}

impl AtlasIndex {
    fn from_records(records: Vec<(String, SpriteRect)>, shape: AtlasShape, opts: MatchOpts) -> Self {
        let mut index = Self {
            entries: Vec::with_capacity(records.len()),
            by_name: HashMap::with_capacity(records.len()),
            by_stem: HashMap::new(),
            by_normalized: HashMap::new(),
            by_number: HashMap::new(),
            shape,
            opts,
        };
        for (name, rect) in records {
            index.insert(name, rect);
        }
        index
    }

    fn insert(&mut self, name: String, rect: SpriteRect) {
        // Later duplicates replace the rectangle but keep the first position.
        if let Some(&i) = self.by_name.get(&name) {
            self.entries[i].rect = rect;
            return;
        }
        let i = self.entries.len();
        let normalized = names::normalize(&name);
        self.by_stem
            .entry(names::strip_extension(&name).to_string())
            .or_insert(i);
        self.by_normalized.entry(normalized.clone()).or_insert(i);
        if let Some(n) = names::numeric_value(&name) {
            self.by_number.entry(n).or_default().push(i);
        }
        self.by_name.insert(name.clone(), i);
        self.entries.push(AtlasEntry {
            name,
            normalized,
            rect,
        });
    }

    /// Number of distinct sprites.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no sprites (never true for a built index).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor layout the index was parsed from.
    pub fn shape(&self) -> AtlasShape {
        self.shape
    }

    /// Exact-key lookup.
    pub fn get(&self, name: &str) -> Option<SpriteRect> {
        self.by_name.get(name).map(|&i| self.entries[i].rect)
    }

    /// Sprites in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SpriteRect)> + '_ {
        self.entries.iter().map(|e| (e.name.as_str(), e.rect))
    }

    /// Resolve a sprite reference from the animation descriptor.
    ///
    /// Stages: exact key, extension variants, numeric part, normalized name, fuzzy match.
    pub fn resolve(&self, reference: &str) -> Option<SpriteMatch<'_>> {
        if let Some(&i) = self.by_name.get(reference) {
            return Some(self.hit(i, MatchKind::Exact));
        }
        if let Some(i) = self.extension_variant(reference) {
            return Some(self.hit(i, MatchKind::Extension));
        }
        if let Some(i) = self.numeric_match(reference) {
            return Some(self.hit(i, MatchKind::Numeric));
        }
        let normalized = names::normalize(reference);
        if let Some(&i) = self.by_normalized.get(&normalized) {
            return Some(self.hit(i, MatchKind::Normalized));
        }
        let (i, distance) = self.closest(&normalized)?;
        if distance > self.opts.max_normalized_distance {
            return None;
        }
        tracing::info!(
            reference,
            key = %self.entries[i].name,
            distance,
            "low-confidence sprite match"
        );
        Some(self.hit(i, MatchKind::Fuzzy { distance }))
    }

    fn hit(&self, i: usize, kind: MatchKind) -> SpriteMatch<'_> {
        let e = &self.entries[i];
        SpriteMatch {
            name: &e.name,
            rect: e.rect,
            kind,
        }
    }

    fn extension_variant(&self, reference: &str) -> Option<usize> {
        if let Some(&i) = self.by_name.get(&format!("{reference}.png")) {
            return Some(i);
        }
        let stem = names::strip_extension(reference);
        if stem != reference
            && let Some(&i) = self.by_name.get(stem)
        {
            return Some(i);
        }
        self.by_stem.get(stem).copied()
    }

    fn numeric_match(&self, reference: &str) -> Option<usize> {
        let n = names::numeric_value(reference)?;
        let candidates = self.by_number.get(&n)?;
        if let [only] = candidates.as_slice() {
            return Some(*only);
        }
        // Several keys share the number: prefer the one whose name is closest.
        let normalized = names::normalize(reference);
        candidates
            .iter()
            .map(|&i| {
                let d = names::normalized_distance(&normalized, &self.entries[i].normalized);
                (i, d)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i)
    }

    fn closest(&self, normalized: &str) -> Option<(usize, f64)> {
        if normalized.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, names::normalized_distance(normalized, &e.normalized)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}

fn rect_from(obj: &Value) -> SpriteRect {
    let coord = |keys: &[&str]| json::number_or(obj, keys, 0.0).round() as i64;
    SpriteRect::new(
        coord(&["x"]),
        coord(&["y"]),
        coord(&["w", "width"]),
        coord(&["h", "height"]),
    )
}

fn parse_sprite_list(desc: &Value) -> Vec<(String, SpriteRect)> {
    let list = json::field(desc, &["ATLAS", "atlas"])
        .and_then(|atlas| json::array(atlas, &["SPRITES", "sprites"]))
        .or_else(|| json::array(desc, &["SPRITES", "sprites"]))
        .or_else(|| desc.as_array());
    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| {
            let s = json::field(item, &["SPRITE", "sprite"]).unwrap_or(item);
            let name = json::text(s, &["name", "NAME", "key"])?;
            let rotated = json::flag(s, &["rotated"]);
            Some((name, rect_from(s).with_rotated(rotated)))
        })
        .collect()
}

fn parse_frame_map(desc: &Value) -> Vec<(String, SpriteRect)> {
    let Some(frames) = json::field(desc, &["frames"]) else {
        return Vec::new();
    };
    let record = |v: &Value| {
        let f = json::field(v, &["frame"]).unwrap_or(v);
        rect_from(f).with_rotated(json::flag(v, &["rotated"]))
    };

    match frames {
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| (key.clone(), record(v)))
            .collect(),
        Value::Array(list) => list
            .iter()
            .filter_map(|v| {
                let key = json::text(v, &["filename", "name"]).or_else(|| {
                    json::field(v, &["frame"]).and_then(|f| json::text(f, &["name"]))
                })?;
                Some((key, record(v)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn scan_rects(v: &Value, out: &mut Vec<(String, SpriteRect)>) {
    match v {
        Value::Object(map) => {
            let has_rect = ["x", "y", "w", "h"]
                .iter()
                .all(|k| map.get(*k).and_then(json::to_f64).is_some());
            if has_rect && let Some(name) = json::text(v, &["name", "key"]) {
                out.push((name, rect_from(v).with_rotated(json::flag(v, &["rotated"]))));
            }
            for child in map.values() {
                scan_rects(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                scan_rects(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "../../tests/unit/atlas/index.rs"]
mod tests;
