use super::*;

#[test]
fn frame_range_contains_boundaries() {
    let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
    assert!(!r.contains(FrameIndex(1)));
    assert!(r.contains(FrameIndex(2)));
    assert!(r.contains(FrameIndex(4)));
    assert!(!r.contains(FrameIndex(5)));
}

#[test]
fn frame_range_rejects_inverted_bounds() {
    assert!(FrameRange::new(FrameIndex(3), FrameIndex(2)).is_err());
}

#[test]
fn frame_range_from_start_duration_saturates() {
    let r = FrameRange::from_start_duration(u64::MAX - 1, 10);
    assert_eq!(r.end, FrameIndex(u64::MAX));
    assert_eq!(r.len_frames(), 1);
}

#[test]
fn sprite_rect_orientation_identity_when_upright() {
    let r = SpriteRect::new(0, 0, 10, 4);
    assert_eq!(r.orientation(), Affine::IDENTITY);
}

#[test]
fn rotated_sprite_orientation_swaps_extent() {
    let r = SpriteRect::new(0, 0, 10, 4).with_rotated(true);
    let bbox = r.orientation().transform_rect_bbox(r.local_bounds());
    assert!((bbox.x0 - 0.0).abs() < 1e-9);
    assert!((bbox.y0 - 0.0).abs() < 1e-9);
    assert!((bbox.x1 - 4.0).abs() < 1e-9);
    assert!((bbox.y1 - 10.0).abs() < 1e-9);
}
