use std::io::Cursor;

use anyhow::Context;

use crate::{
    foundation::core::{Affine, Point, Rect},
    foundation::error::{SpriteFrameError, SpriteFrameResult},
    foundation::math::unpremultiply_rgba8_in_place,
    render::bitmap::{BitmapSource, PremulRegion},
    render::raster::{self, Rasterizer, RegionPaint},
    resolve::resolver::DrawCommand,
    transform::affine,
};

/// Compositor tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeOpts {
    /// Largest accepted surface side in pixels; larger frames fail with a render error.
    pub max_side: u32,
    /// Inspect the painted alpha channel to detect fully transparent output.
    pub inspect_alpha: bool,
    /// Run the fallback chain when the direct paint is fully transparent.
    pub fallbacks: bool,
}

impl Default for CompositeOpts {
    fn default() -> Self {
        Self {
            max_side: 4096,
            inspect_alpha: true,
            fallbacks: true,
        }
    }
}

/// How a painted frame was finally produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintStrategy {
    /// Every command through its full transform.
    Direct,
    /// Full transforms with translation rounded to whole pixels.
    RoundedTranslation,
    /// Each region placed untransformed at its transformed origin.
    OriginOnly,
    /// Non-transparent regions blended one by one at their transformed origins.
    Isolated,
}

impl PaintStrategy {
    const FALLBACKS: [PaintStrategy; 2] = [PaintStrategy::RoundedTranslation, PaintStrategy::OriginOnly];

    fn adjust(self, t: Affine) -> Affine {
        match self {
            PaintStrategy::Direct | PaintStrategy::Isolated => t,
            PaintStrategy::RoundedTranslation => affine::round_translation(t),
            PaintStrategy::OriginOnly => affine::origin_only(t),
        }
    }
}

/// Why a frame could not be reconstructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    /// Nothing to paint.
    NoCommands,
    /// Every paint strategy produced a fully transparent surface.
    Transparent,
}

/// Integer pixel bounds `[x0, x1) x [y0, y1)`, at least 1x1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PixelBounds {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelBounds {
    fn from_rect(r: Rect) -> Self {
        let x0 = r.x0.floor() as i64;
        let y0 = r.y0.floor() as i64;
        let x1 = (r.x1.ceil() as i64).max(x0.saturating_add(1));
        let y1 = (r.y1.ceil() as i64).max(y0.saturating_add(1));
        Self { x0, y0, x1, y1 }
    }

    pub fn width(self) -> u64 {
        self.x1.abs_diff(self.x0)
    }

    pub fn height(self) -> u64 {
        self.y1.abs_diff(self.y0)
    }

    pub fn origin(self) -> Point {
        Point::new(self.x0 as f64, self.y0 as f64)
    }
}

/// Axis-aligned bounds of every command's transformed source rectangle, snapped outward to the
/// pixel grid. Commands with non-finite transforms are ignored; `None` when nothing remains.
pub fn frame_bounds(commands: &[DrawCommand]) -> Option<PixelBounds> {
    bounds_of(commands.iter().filter(|c| affine::is_finite(c.transform)))
}

fn bounds_of<'a>(commands: impl Iterator<Item = &'a DrawCommand>) -> Option<PixelBounds> {
    commands
        .map(|c| c.transform.transform_rect_bbox(c.source_rect.local_bounds()))
        .reduce(|a, b| a.union(b))
        .map(PixelBounds::from_rect)
}

/// One finished frame image in premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFrame {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Position of the top-left pixel in animation space.
    pub origin_x: i64,
    pub origin_y: i64,
    pub rgba8_premul: Vec<u8>,
}

impl RenderedFrame {
    /// Fully transparent `width x height` frame.
    pub fn blank(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            origin_x: 0,
            origin_y: 0,
            rgba8_premul: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    /// Frame holding one raw, untransformed atlas region.
    pub fn from_region(name: impl Into<String>, region: PremulRegion) -> Self {
        Self {
            name: name.into(),
            width: region.width,
            height: region.height,
            origin_x: 0,
            origin_y: 0,
            rgba8_premul: region.rgba8_premul,
        }
    }

    pub fn is_fully_transparent(&self) -> bool {
        raster::is_fully_transparent(&self.rgba8_premul)
    }

    /// Straight-alpha copy of the pixels.
    pub fn to_rgba_image(&self) -> SpriteFrameResult<image::RgbaImage> {
        let mut rgba = self.rgba8_premul.clone();
        unpremultiply_rgba8_in_place(&mut rgba);
        image::RgbaImage::from_raw(self.width, self.height, rgba)
            .ok_or_else(|| SpriteFrameError::render("frame byte len mismatch"))
    }

    pub fn encode_png(&self) -> SpriteFrameResult<Vec<u8>> {
        let img = self.to_rgba_image()?;
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .with_context(|| format!("encode png '{}'", self.name))?;
        Ok(buf)
    }
}

/// Outcome of compositing one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Composited {
    Painted {
        frame: RenderedFrame,
        strategy: PaintStrategy,
    },
    /// The frame could not be reconstructed; `blank` is a transparent surface of the frame size.
    Degenerate {
        blank: RenderedFrame,
        reason: DegenerateReason,
    },
}

impl Composited {
    pub fn frame(&self) -> &RenderedFrame {
        match self {
            Composited::Painted { frame, .. } => frame,
            Composited::Degenerate { blank, .. } => blank,
        }
    }

    pub fn into_frame(self) -> RenderedFrame {
        match self {
            Composited::Painted { frame, .. } => frame,
            Composited::Degenerate { blank, .. } => blank,
        }
    }

    pub fn strategy(&self) -> Option<PaintStrategy> {
        match self {
            Composited::Painted { strategy, .. } => Some(*strategy),
            Composited::Degenerate { .. } => None,
        }
    }
}

/// Composite `commands` into one frame named `name`.
#[tracing::instrument(skip(commands, bitmap, opts), fields(commands = commands.len()))]
pub fn composite_frame(
    commands: &[DrawCommand],
    bitmap: &dyn BitmapSource,
    name: &str,
    opts: &CompositeOpts,
) -> SpriteFrameResult<Composited> {
    Compositor::new(*opts).composite(commands, bitmap, name)
}

struct PreparedCommand {
    paint: RegionPaint,
    region: PremulRegion,
    transform: Affine,
}

/// Reusable compositor; keeps its raster context between frames.
pub struct Compositor {
    opts: CompositeOpts,
    raster: Rasterizer,
}

impl Compositor {
    pub fn new(opts: CompositeOpts) -> Self {
        Self {
            opts,
            raster: Rasterizer::default(),
        }
    }

    /// Paint `commands` in order onto a surface sized to their pixel bounds.
    ///
    /// Commands with non-finite transforms or unreadable source regions are logged and skipped.
    /// Each fallback paints onto a surface sized to its own adjusted placement.
    pub fn composite(
        &mut self,
        commands: &[DrawCommand],
        bitmap: &dyn BitmapSource,
        name: &str,
    ) -> SpriteFrameResult<Composited> {
        let finite: Vec<&DrawCommand> = commands
            .iter()
            .filter(|c| {
                let ok = affine::is_finite(c.transform);
                if !ok {
                    tracing::warn!(sprite = %c.source_name, "non-finite transform; command skipped");
                }
                ok
            })
            .collect();

        let Some(bounds) = bounds_of(finite.iter().copied()) else {
            return Ok(Composited::Degenerate {
                blank: RenderedFrame::blank(name, 1, 1),
                reason: DegenerateReason::NoCommands,
            });
        };
        let (w, h) = self.surface_size(bounds)?;

        let mut prepared = Vec::with_capacity(finite.len());
        for cmd in finite {
            let ready = bitmap
                .region_premul(cmd.source_rect)
                .and_then(|region| Ok((RegionPaint::new(&region)?, region)));
            match ready {
                Ok((paint, region)) => prepared.push(PreparedCommand {
                    paint,
                    region,
                    transform: cmd.transform,
                }),
                Err(e) => {
                    tracing::warn!(sprite = %cmd.source_name, error = %e, "source region unusable; command skipped");
                }
            }
        }

        let frame = |b: PixelBounds, rgba8_premul: Vec<u8>| RenderedFrame {
            name: name.to_string(),
            width: b.width() as u32,
            height: b.height() as u32,
            origin_x: b.x0,
            origin_y: b.y0,
            rgba8_premul,
        };

        let direct = self.paint(w, h, &prepared, bounds.origin(), PaintStrategy::Direct);
        if !self.opts.inspect_alpha || !raster::is_fully_transparent(&direct) {
            return Ok(Composited::Painted {
                frame: frame(bounds, direct),
                strategy: PaintStrategy::Direct,
            });
        }

        if self.opts.fallbacks && !prepared.is_empty() {
            for strategy in PaintStrategy::FALLBACKS {
                let Some((b, w, h)) = self.fallback_surface(&prepared, strategy) else {
                    continue;
                };
                let px = self.paint(w, h, &prepared, b.origin(), strategy);
                if !raster::is_fully_transparent(&px) {
                    tracing::debug!(?strategy, "fallback composite succeeded");
                    return Ok(Composited::Painted {
                        frame: frame(b, px),
                        strategy,
                    });
                }
            }
            if let Some((b, w, h)) = self.fallback_surface(&prepared, PaintStrategy::Isolated) {
                let px = isolated(&prepared, u32::from(w), u32::from(h), b.origin())?;
                if !raster::is_fully_transparent(&px) {
                    tracing::debug!(strategy = ?PaintStrategy::Isolated, "fallback composite succeeded");
                    return Ok(Composited::Painted {
                        frame: frame(b, px),
                        strategy: PaintStrategy::Isolated,
                    });
                }
            }
        }

        tracing::warn!(frame = name, "composite is fully transparent");
        Ok(Composited::Degenerate {
            blank: frame(bounds, direct),
            reason: DegenerateReason::Transparent,
        })
    }

    fn surface_size(&self, bounds: PixelBounds) -> SpriteFrameResult<(u16, u16)> {
        let limit = u64::from(self.opts.max_side.clamp(1, u32::from(u16::MAX)));
        if bounds.width() > limit || bounds.height() > limit {
            return Err(SpriteFrameError::render(format!(
                "frame surface {}x{} exceeds max side {limit}",
                bounds.width(),
                bounds.height()
            )));
        }
        Ok((bounds.width() as u16, bounds.height() as u16))
    }

    /// Bounds and surface size of `strategy`'s placement; `None` when nothing is placed or the
    /// surface would exceed the side limit.
    fn fallback_surface(
        &self,
        prepared: &[PreparedCommand],
        strategy: PaintStrategy,
    ) -> Option<(PixelBounds, u16, u16)> {
        let bounds = placed_bounds(prepared, strategy)?;
        match self.surface_size(bounds) {
            Ok((w, h)) => Some((bounds, w, h)),
            Err(e) => {
                tracing::warn!(?strategy, error = %e, "fallback surface skipped");
                None
            }
        }
    }

    fn paint(
        &mut self,
        w: u16,
        h: u16,
        prepared: &[PreparedCommand],
        origin: Point,
        strategy: PaintStrategy,
    ) -> Vec<u8> {
        let items = prepared
            .iter()
            .map(|p| (&p.paint, affine::shift_origin(strategy.adjust(p.transform), origin)));
        self.raster
            .paint(w, h, items)
            .data_as_u8_slice()
            .to_vec()
    }
}

/// Pixel bounds of every region as `strategy` places it. The isolated pass only places
/// non-transparent regions, untransformed at their rounded origins.
fn placed_bounds(prepared: &[PreparedCommand], strategy: PaintStrategy) -> Option<PixelBounds> {
    prepared
        .iter()
        .filter_map(|p| {
            let size = (f64::from(p.region.width), f64::from(p.region.height));
            if strategy != PaintStrategy::Isolated {
                let local = Rect::new(0.0, 0.0, size.0, size.1);
                return Some(strategy.adjust(p.transform).transform_rect_bbox(local));
            }
            if p.region.is_fully_transparent() {
                return None;
            }
            let at = p.transform.translation();
            let (x, y) = (at.x.round(), at.y.round());
            Some(Rect::new(x, y, x + size.0, y + size.1))
        })
        .reduce(|a, b| a.union(b))
        .map(PixelBounds::from_rect)
}

fn isolated(
    prepared: &[PreparedCommand],
    w: u32,
    h: u32,
    origin: Point,
) -> SpriteFrameResult<Vec<u8>> {
    let mut dst = vec![0u8; (w as usize) * (h as usize) * 4];
    for p in prepared {
        if p.region.is_fully_transparent() {
            continue;
        }
        let at = p.transform.translation();
        raster::premul_over_at(
            &mut dst,
            w,
            h,
            &p.region.rgba8_premul,
            p.region.width,
            p.region.height,
            (at.x - origin.x).round() as i64,
            (at.y - origin.y).round() as i64,
        )?;
    }
    Ok(dst)
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
