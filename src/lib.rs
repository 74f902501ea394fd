//! spriteframe reconstructs the frames of a texture-atlas animation as standalone images.
//!
//! The input is a packed atlas bitmap, an atlas descriptor naming the sprite rectangles, and an
//! animation descriptor (Animate-style timelines with nested symbols). The output is one image
//! per frame index, collected into an archive.
//!
//! # Pipeline overview
//!
//! 1. **Index**: atlas descriptor -> [`AtlasIndex`], animation descriptor -> [`SymbolTable`] and
//!    the main timeline ([`AnimationDoc`])
//! 2. **Discover**: main timeline -> ordered [`FrameIndex`] list
//! 3. **Resolve**: timeline + frame -> flat [`DrawCommand`] list (symbols expanded, transforms
//!    composed, sprite names matched)
//! 4. **Composite**: draw commands + [`BitmapSource`] -> [`RenderedFrame`], with a fallback chain
//!    for fully transparent output
//! 5. **Export**: every frame encoded as PNG into an [`ArchiveSink`]
//!
//! Per-frame problems (missing sprites, missing symbols, runaway nesting, degenerate frames)
//! never stop an export; they are logged through `tracing` and reported to the progress callback.
#![forbid(unsafe_code)]

mod anim;
mod atlas;
mod export;
mod foundation;
mod render;
mod resolve;

/// Shared affine transform helpers.
pub mod transform;

pub use anim::model::{
    AtlasInstance, Element, FrameRecord, Layer, LoopMode, SymbolInstance, Timeline,
};
pub use anim::parse::AnimationDoc;
pub use anim::symbols::{SymbolDefinition, SymbolSource, SymbolTable, build_symbol_table};
pub use atlas::index::{
    AtlasIndex, AtlasShape, MatchKind, MatchOpts, SpriteMatch, build_atlas_index,
    build_atlas_index_with,
};
pub use atlas::names::sanitize_file_name;
pub use export::fingerprint::{FrameFingerprint, fingerprint_commands};
pub use export::pipeline::{
    DegeneratePolicy, ExportJob, ExportOpts, ExportStats, ExportThreading, FrameEntry,
    FrameOutcome, PieceOpts, export_all_frames, export_atlas_pieces, frame_entry_name,
};
pub use export::sink::{ArchiveSink, InMemoryArchive, ZipArchive};
pub use foundation::core::{Affine, FrameIndex, FrameRange, Point, Rect, SpriteRect, Vec2};
pub use foundation::error::{SpriteFrameError, SpriteFrameResult};
pub use render::bitmap::{BitmapSource, PreparedImage, PremulRegion, decode_image};
pub use render::compositor::{
    CompositeOpts, Composited, Compositor, DegenerateReason, PaintStrategy, PixelBounds,
    RenderedFrame, composite_frame, frame_bounds,
};
pub use resolve::frames::{
    MAX_DISCOVERED_FRAMES, discover_frame_indices, discover_frame_indices_within, frame_count,
};
pub use resolve::resolver::{
    DrawCommand, ResolveIssue, ResolveOpts, ResolveReport, resolve_frame, resolve_frame_report,
};
