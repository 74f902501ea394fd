use crate::{
    anim::model::Timeline,
    foundation::core::FrameIndex,
    foundation::error::{SpriteFrameError, SpriteFrameResult},
};

/// Most indices [`discover_frame_indices`] expands; longer timelines are cut with a warning.
pub const MAX_DISCOVERED_FRAMES: u64 = 1 << 20;

/// Every frame index covered by any record of `timeline`, sorted and deduplicated.
///
/// A timeline without frame records yields `[0]` so an export always produces one frame.
/// At most [`MAX_DISCOVERED_FRAMES`] indices are returned; use [`discover_frame_indices_within`]
/// to reject oversized timelines instead.
pub fn discover_frame_indices(timeline: &Timeline) -> Vec<FrameIndex> {
    let spans = merged_spans(timeline);
    let total = span_total(&spans);
    if total > MAX_DISCOVERED_FRAMES {
        tracing::warn!(
            frames = total,
            kept = MAX_DISCOVERED_FRAMES,
            "timeline covers too many frames; index list cut"
        );
    }
    expand(&spans, MAX_DISCOVERED_FRAMES)
}

/// Like [`discover_frame_indices`], but a timeline covering more than `max_frames` indices is a
/// validation error.
pub fn discover_frame_indices_within(
    timeline: &Timeline,
    max_frames: u64,
) -> SpriteFrameResult<Vec<FrameIndex>> {
    let spans = merged_spans(timeline);
    let total = span_total(&spans);
    if total > max_frames {
        return Err(SpriteFrameError::validation(format!(
            "timeline covers {total} frames, more than max_frames {max_frames}"
        )));
    }
    Ok(expand(&spans, max_frames))
}

/// Number of indices [`discover_frame_indices`] would report without its cut; saturates at
/// `u64::MAX`.
pub fn frame_count(timeline: &Timeline) -> u64 {
    span_total(&merged_spans(timeline))
}

/// Sorted, non-overlapping `[start, end)` spans; `[0, 1)` for a timeline without records.
fn merged_spans(timeline: &Timeline) -> Vec<(u64, u64)> {
    let mut spans: Vec<(u64, u64)> = timeline
        .frame_records()
        .filter(|r| !r.range.is_empty())
        .map(|r| (r.range.start.0, r.range.end.0))
        .collect();
    if spans.is_empty() {
        return vec![(0, 1)];
    }

    spans.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn span_total(spans: &[(u64, u64)]) -> u64 {
    spans
        .iter()
        .fold(0u64, |acc, (start, end)| acc.saturating_add(end - start))
}

fn expand(spans: &[(u64, u64)], limit: u64) -> Vec<FrameIndex> {
    spans
        .iter()
        .flat_map(|&(start, end)| (start..end).map(FrameIndex))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/frames.rs"]
mod tests;
