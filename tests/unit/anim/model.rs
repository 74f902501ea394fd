use super::*;

fn record(start: u64, duration: u64) -> FrameRecord {
    FrameRecord {
        range: FrameRange::from_start_duration(start, duration),
        elements: Vec::new(),
    }
}

#[test]
fn loop_mode_parses_verbose_and_compact_tags() {
    assert_eq!(LoopMode::parse("loop"), Some(LoopMode::Loop));
    assert_eq!(LoopMode::parse("LP"), Some(LoopMode::Loop));
    assert_eq!(LoopMode::parse("playonce"), Some(LoopMode::PlayOnce));
    assert_eq!(LoopMode::parse("play_once"), Some(LoopMode::PlayOnce));
    assert_eq!(LoopMode::parse("PO"), Some(LoopMode::PlayOnce));
    assert_eq!(LoopMode::parse("singleframe"), Some(LoopMode::SingleFrame));
    assert_eq!(LoopMode::parse("SF"), Some(LoopMode::SingleFrame));
    assert_eq!(LoopMode::parse("bounce"), None);
}

#[test]
fn loop_mode_maps_child_index() {
    assert_eq!(LoopMode::Loop.map(7, 0, 5), 2);
    assert_eq!(LoopMode::Loop.map(3, 4, 5), 2);
    assert_eq!(LoopMode::PlayOnce.map(9, 0, 5), 4);
    assert_eq!(LoopMode::PlayOnce.map(1, 1, 5), 2);
    assert_eq!(LoopMode::SingleFrame.map(9, 3, 5), 3);
    assert_eq!(LoopMode::Loop.map(9, 0, 0), 9);
}

#[test]
fn active_at_returns_first_containing_record() {
    let layer = Layer {
        name: "l".into(),
        frames: vec![record(0, 3), record(2, 4)],
    };
    assert_eq!(layer.active_at(FrameIndex(2)).map(|r| r.start()), Some(FrameIndex(0)));
    assert_eq!(layer.active_at(FrameIndex(4)).map(|r| r.start()), Some(FrameIndex(2)));
    assert!(layer.active_at(FrameIndex(6)).is_none());
}

#[test]
fn timeline_length_is_max_record_end() {
    let tl = Timeline {
        layers: vec![
            Layer {
                name: "a".into(),
                frames: vec![record(0, 3)],
            },
            Layer {
                name: "b".into(),
                frames: vec![record(5, 2)],
            },
        ],
    };
    assert_eq!(tl.len_frames(), 7);
    assert!(!tl.is_empty());
    assert!(Timeline::default().is_empty());
    assert_eq!(Timeline::default().len_frames(), 0);
}
