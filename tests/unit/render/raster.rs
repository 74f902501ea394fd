use super::*;

fn opaque_region(w: u32, h: u32, rgba: [u8; 4]) -> PremulRegion {
    PremulRegion {
        width: w,
        height: h,
        rgba8_premul: rgba.repeat((w * h) as usize),
    }
}

fn alpha_at(bytes: &[u8], w: u32, x: u32, y: u32) -> u8 {
    bytes[((y * w + x) * 4 + 3) as usize]
}

#[test]
fn pixmap_from_premul_bytes_rejects_len_mismatch() {
    assert!(pixmap_from_premul_bytes(&[0u8; 12], 2, 2).is_err());
    assert!(pixmap_from_premul_bytes(&[0u8; 16], 2, 2).is_ok());
    assert!(pixmap_from_premul_bytes(&[], 70_000, 0).is_err());
}

#[test]
fn transparency_check() {
    assert!(is_fully_transparent(&[9, 9, 9, 0, 0, 0, 0, 0]));
    assert!(!is_fully_transparent(&[0, 0, 0, 0, 0, 0, 0, 1]));
    assert!(is_fully_transparent(&[]));
}

#[test]
fn over_blend_of_half_transparent_source() {
    let mut dst = vec![0, 0, 255, 255];
    let src = [128, 0, 0, 128];
    premul_over_at(&mut dst, 1, 1, &src, 1, 1, 0, 0).unwrap();
    assert_eq!(dst, [128, 0, 127, 255]);
}

#[test]
fn over_blend_clips_to_destination() {
    let mut dst = vec![0u8; 3 * 2 * 4];
    let src = [255u8, 255, 255, 255].repeat(4);
    premul_over_at(&mut dst, 3, 2, &src, 2, 2, 2, 1).unwrap();
    let painted: Vec<(u32, u32)> = (0..2)
        .flat_map(|y| (0..3).map(move |x| (x, y)))
        .filter(|&(x, y)| alpha_at(&dst, 3, x, y) != 0)
        .collect();
    assert_eq!(painted, [(2, 1)]);

    // Entirely outside: no-op.
    let before = dst.clone();
    premul_over_at(&mut dst, 3, 2, &src, 2, 2, -5, 0).unwrap();
    assert_eq!(dst, before);
}

#[test]
fn over_blend_rejects_bad_buffers() {
    let mut dst = vec![0u8; 4];
    assert!(premul_over_at(&mut dst, 2, 2, &[0u8; 4], 1, 1, 0, 0).is_err());
}

#[test]
fn rasterizer_paints_region_through_transform() {
    let paint = RegionPaint::new(&opaque_region(2, 2, [255, 0, 0, 255])).unwrap();
    let mut r = Rasterizer::default();
    let pm = r.paint(4, 2, [(&paint, Affine::translate((2.0, 0.0)))]);
    let bytes = pm.data_as_u8_slice();
    assert_eq!(bytes.len(), 4 * 2 * 4);
    assert_eq!(alpha_at(bytes, 4, 0, 0), 0);
    assert_eq!(alpha_at(bytes, 4, 1, 1), 0);
    assert!(alpha_at(bytes, 4, 2, 0) > 200);
    assert!(alpha_at(bytes, 4, 3, 1) > 200);
}

#[test]
fn rasterizer_reuses_context_across_sizes() {
    let paint = RegionPaint::new(&opaque_region(1, 1, [0, 0, 255, 255])).unwrap();
    let mut r = Rasterizer::default();
    let a = r.paint(3, 3, [(&paint, Affine::IDENTITY)]);
    let b = r.paint(3, 3, std::iter::empty());
    let c = r.paint(5, 1, [(&paint, Affine::translate((4.0, 0.0)))]);
    assert!(!is_fully_transparent(a.data_as_u8_slice()));
    assert!(is_fully_transparent(b.data_as_u8_slice()));
    assert!(alpha_at(c.data_as_u8_slice(), 5, 4, 0) > 200);
}
