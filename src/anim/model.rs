use crate::foundation::core::{Affine, FrameIndex, FrameRange};

/// Ordered layers; layer order is draw order as given by the descriptor.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Timeline {
    pub layers: Vec<Layer>,
}

impl Timeline {
    /// One past the last frame covered by any record (0 for an empty timeline).
    pub fn len_frames(&self) -> u64 {
        self.frame_records()
            .map(|r| r.range.end.0)
            .max()
            .unwrap_or(0)
    }

    pub fn frame_records(&self) -> impl Iterator<Item = &FrameRecord> + '_ {
        self.layers.iter().flat_map(|l| l.frames.iter())
    }

    /// Whether no layer carries a frame record.
    pub fn is_empty(&self) -> bool {
        self.frame_records().next().is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Layer {
    pub name: String,
    pub frames: Vec<FrameRecord>,
}

impl Layer {
    /// First record whose range contains `f`; overlapping records are not rejected.
    pub fn active_at(&self, f: FrameIndex) -> Option<&FrameRecord> {
        self.frames.iter().find(|r| r.range.contains(f))
    }
}

/// Keyframe with a duration, active over `range`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameRecord {
    pub range: FrameRange,
    pub elements: Vec<Element>, // draw order
}

impl FrameRecord {
    pub fn start(&self) -> FrameIndex {
        self.range.start
    }
}

/// Something placed on a frame record.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum Element {
    Atlas(AtlasInstance),
    Symbol(SymbolInstance),
}

/// Placement of one atlas sprite.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AtlasInstance {
    pub sprite: String, // as written in the descriptor, resolved through the atlas index
    pub transform: Affine,
}

/// Placement of a nested symbol timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SymbolInstance {
    pub symbol: String,
    pub transform: Affine,
    pub first_frame: u64,
    pub loop_mode: Option<LoopMode>,
}

/// Playback mode of a symbol instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LoopMode {
    /// Wrap around the symbol timeline.
    Loop,
    /// Hold the last frame once the timeline ends.
    PlayOnce,
    /// Always show `first_frame`.
    SingleFrame,
}

impl LoopMode {
    /// Parse both verbose (`loop`, `playonce`, `singleframe`) and compact (`LP`, `PO`, `SF`) tags.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match tag.as_str() {
            "loop" | "lp" => Some(Self::Loop),
            "playonce" | "po" => Some(Self::PlayOnce),
            "singleframe" | "sf" => Some(Self::SingleFrame),
            _ => None,
        }
    }

    /// Map `local + first_frame` onto a symbol timeline of `len` frames.
    ///
    /// A zero-length timeline leaves the index unchanged.
    pub fn map(self, local: u64, first_frame: u64, len: u64) -> u64 {
        let child = local.saturating_add(first_frame);
        if len == 0 {
            return child;
        }
        match self {
            Self::Loop => child % len,
            Self::PlayOnce => child.min(len - 1),
            Self::SingleFrame => first_frame,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/anim/model.rs"]
mod tests;
