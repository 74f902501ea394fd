use std::sync::Arc;

use anyhow::Context;

use crate::{
    foundation::core::SpriteRect,
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    foundation::math::premultiply_rgba8_in_place,
};

/// Pixels of one atlas region in premultiplied RGBA8, `width * height * 4` bytes.
///
/// Parts of the requested rectangle outside the bitmap are transparent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PremulRegion {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl PremulRegion {
    pub fn is_fully_transparent(&self) -> bool {
        self.rgba8_premul.chunks_exact(4).all(|px| px[3] == 0)
    }
}

/// Read access to a decoded atlas bitmap.
pub trait BitmapSource: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Copy `rect` out of the bitmap, clipped to its bounds.
    ///
    /// Fails for empty rectangles and rectangles entirely outside the bitmap.
    fn region_premul(&self, rect: SpriteRect) -> SpriteFrameResult<PremulRegion>;
}

/// Decoded image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Take ownership of a straight-alpha image and premultiply it.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let mut rgba8_premul = img.into_raw();
        premultiply_rgba8_in_place(&mut rgba8_premul);
        Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        }
    }
}

/// Decode any format supported by `image` into a [`PreparedImage`].
pub fn decode_image(bytes: &[u8]) -> SpriteFrameResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(PreparedImage::from_rgba_image(dyn_img.to_rgba8()))
}

impl BitmapSource for PreparedImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn region_premul(&self, rect: SpriteRect) -> SpriteFrameResult<PremulRegion> {
        copy_region(&self.rgba8_premul, self.width, self.height, rect, false)
    }
}

impl BitmapSource for image::RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn region_premul(&self, rect: SpriteRect) -> SpriteFrameResult<PremulRegion> {
        let (w, h) = self.dimensions();
        copy_region(self.as_raw(), w, h, rect, true)
    }
}

fn copy_region(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    rect: SpriteRect,
    premultiply: bool,
) -> SpriteFrameResult<PremulRegion> {
    if rect.is_empty() {
        return Err(SpriteFrameError::render(format!(
            "empty source region {}x{}",
            rect.w, rect.h
        )));
    }
    let (width, height) = match (u16::try_from(rect.w), u16::try_from(rect.h)) {
        (Ok(w), Ok(h)) => (u32::from(w), u32::from(h)),
        _ => {
            return Err(SpriteFrameError::render(format!(
                "source region {}x{} exceeds u16",
                rect.w, rect.h
            )));
        }
    };
    if src.len() != (src_w as usize) * (src_h as usize) * 4 {
        return Err(SpriteFrameError::render("bitmap byte len mismatch"));
    }

    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.x.saturating_add(rect.w).min(i64::from(src_w));
    let y1 = rect.y.saturating_add(rect.h).min(i64::from(src_h));
    if x0 >= x1 || y0 >= y1 {
        return Err(SpriteFrameError::render(format!(
            "source region ({}, {}, {}x{}) lies outside the {src_w}x{src_h} bitmap",
            rect.x, rect.y, rect.w, rect.h
        )));
    }

    let mut out = vec![0u8; (width as usize) * (height as usize) * 4];
    let row_bytes = ((x1 - x0) as usize) * 4;
    for sy in y0..y1 {
        let src_off = ((sy as usize) * (src_w as usize) + x0 as usize) * 4;
        let dy = (sy - rect.y) as usize;
        let dx = (x0 - rect.x) as usize;
        let dst_off = (dy * (width as usize) + dx) * 4;
        out[dst_off..dst_off + row_bytes].copy_from_slice(&src[src_off..src_off + row_bytes]);
    }
    if premultiply {
        premultiply_rgba8_in_place(&mut out);
    }

    Ok(PremulRegion {
        width,
        height,
        rgba8_premul: out,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/bitmap.rs"]
mod tests;
