use std::sync::Arc;

use crate::{
    foundation::core::Affine,
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    foundation::math::mul_div255_u8,
    render::bitmap::PremulRegion,
};

/// A source region ready to be used as an image paint.
#[derive(Clone)]
pub(crate) struct RegionPaint {
    pub(crate) paint: vello_cpu::Image,
    pub(crate) w: f64,
    pub(crate) h: f64,
}

impl RegionPaint {
    pub(crate) fn new(region: &PremulRegion) -> SpriteFrameResult<Self> {
        let pixmap = pixmap_from_premul_bytes(&region.rgba8_premul, region.width, region.height)?;
        Ok(Self {
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
            w: f64::from(region.width),
            h: f64::from(region.height),
        })
    }
}

/// CPU rasterizer; keeps one render context alive between surfaces of the same size.
#[derive(Default)]
pub(crate) struct Rasterizer {
    ctx: Option<vello_cpu::RenderContext>,
}

impl Rasterizer {
    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> R,
    ) -> R {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(&mut ctx);
        self.ctx = Some(ctx);
        out
    }

    /// Paint each region through its transform onto a fresh transparent surface, in order.
    pub(crate) fn paint<'a>(
        &mut self,
        width: u16,
        height: u16,
        items: impl IntoIterator<Item = (&'a RegionPaint, Affine)>,
    ) -> vello_cpu::Pixmap {
        let mut dst = vello_cpu::Pixmap::new(width, height);
        self.with_ctx_mut(width, height, |ctx| {
            ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            for (item, transform) in items {
                ctx.set_transform(affine_to_cpu(transform));
                ctx.set_paint(item.paint.clone());
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, item.w, item.h));
            }
            ctx.flush();
            ctx.render_to_pixmap(&mut dst);
        });
        dst
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> SpriteFrameResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| SpriteFrameError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| SpriteFrameError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(SpriteFrameError::render("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

pub(crate) fn is_fully_transparent(rgba8_premul: &[u8]) -> bool {
    rgba8_premul.chunks_exact(4).all(|px| px[3] == 0)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Source-over blend of `src` (`src_w x src_h`) onto `dst` with its top-left at `(x, y)`.
///
/// Both buffers are premultiplied RGBA8; the parts of `src` outside `dst` are dropped.
#[allow(clippy::too_many_arguments)]
pub(crate) fn premul_over_at(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x: i64,
    y: i64,
) -> SpriteFrameResult<()> {
    if dst.len() != (dst_w as usize) * (dst_h as usize) * 4
        || src.len() != (src_w as usize) * (src_h as usize) * 4
    {
        return Err(SpriteFrameError::render(
            "premul_over_at expects rgba8 buffers matching their sizes",
        ));
    }

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + i64::from(src_w)).min(i64::from(dst_w));
    let y1 = (y + i64::from(src_h)).min(i64::from(dst_h));
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let span = ((x1 - x0) as usize) * 4;
    for dy in y0..y1 {
        let sy = (dy - y) as usize;
        let sx = (x0 - x) as usize;
        let s_off = (sy * src_w as usize + sx) * 4;
        let d_off = ((dy as usize) * dst_w as usize + x0 as usize) * 4;
        premul_over_in_place(&mut dst[d_off..d_off + span], &src[s_off..s_off + span]);
    }
    Ok(())
}

fn premul_over_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = s[3];
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255u16 - u16::from(sa);
        d[3] = add_sat_u8(sa, mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            d[c] = add_sat_u8(s[c], mul_div255_u8(u16::from(d[c]), inv));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
