use super::*;
use crate::anim::model::{FrameRecord, Layer};
use crate::foundation::core::FrameRange;

fn layer(ranges: &[(u64, u64)]) -> Layer {
    Layer {
        name: String::new(),
        frames: ranges
            .iter()
            .map(|&(start, duration)| FrameRecord {
                range: FrameRange::from_start_duration(start, duration),
                elements: Vec::new(),
            })
            .collect(),
    }
}

fn indices(tl: &Timeline) -> Vec<u64> {
    discover_frame_indices(tl).into_iter().map(|f| f.0).collect()
}

#[test]
fn union_of_overlapping_layer_ranges() {
    // [0,3) and [2,5)
    let tl = Timeline {
        layers: vec![layer(&[(0, 3)]), layer(&[(2, 3)])],
    };
    assert_eq!(indices(&tl), [0, 1, 2, 3, 4]);
}

#[test]
fn gaps_are_not_filled() {
    let tl = Timeline {
        layers: vec![layer(&[(5, 2), (0, 1)])],
    };
    assert_eq!(indices(&tl), [0, 5, 6]);
}

#[test]
fn empty_timeline_falls_back_to_zero() {
    assert_eq!(indices(&Timeline::default()), [0]);
    let tl = Timeline {
        layers: vec![layer(&[]), layer(&[])],
    };
    assert_eq!(indices(&tl), [0]);
}

#[test]
fn output_is_sorted_and_unique() {
    let tl = Timeline {
        layers: vec![layer(&[(3, 2), (1, 1)]), layer(&[(0, 6)]), layer(&[(4, 1)])],
    };
    assert_eq!(indices(&tl), [0, 1, 2, 3, 4, 5]);
}

#[test]
fn huge_durations_are_counted_without_expanding() {
    let tl = Timeline {
        layers: vec![layer(&[(0, 4_000_000_000), (10, 5)]), layer(&[(u64::MAX - 1, 10)])],
    };
    // the last span saturates at u64::MAX and covers one frame
    assert_eq!(frame_count(&tl), 4_000_000_001);

    let err = discover_frame_indices_within(&tl, 1_000).unwrap_err();
    assert!(err.is_structural());
    assert!(err.to_string().contains("more than max_frames 1000"));

    let cut = discover_frame_indices(&tl);
    assert_eq!(cut.len() as u64, MAX_DISCOVERED_FRAMES);
    assert_eq!(cut[3].0, 3);
}

#[test]
fn limit_accepts_timelines_that_fit() {
    let tl = Timeline {
        layers: vec![layer(&[(0, 3)]), layer(&[(2, 3)])],
    };
    assert_eq!(frame_count(&tl), 5);
    let frames = discover_frame_indices_within(&tl, 5).unwrap();
    assert_eq!(frames.len(), 5);
    assert!(discover_frame_indices_within(&tl, 4).is_err());
    assert_eq!(frame_count(&Timeline::default()), 1);
}
