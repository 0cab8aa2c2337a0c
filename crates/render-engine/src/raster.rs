//! Raster primitives on a `tiny_skia` surface.
//!
//! The compositor paints into a premultiplied [`Pixmap`]. Decoded frames
//! enter and composited frames leave as straight-alpha `image::RgbaImage`.

use image::{imageops, RgbaImage};
use reframe_project_model::background::{Fill, Rgb};
use resvg::tiny_skia::{
    self, Color, FillRule, FilterQuality, GradientStop, IntSize, LineJoin, LinearGradient, Mask,
    Paint, Path, PathBuilder, Pixmap, PixmapPaint, Point, SpreadMode, Stroke, Transform,
};

/// Axis-aligned rectangle in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Largest rectangle with `aspect` (w/h) that fits in `bounds`, centered.
    pub fn fit_centered(bounds: Rect, aspect: f64) -> Rect {
        if !(aspect.is_finite() && aspect > 0.0) || bounds.h <= 0.0 {
            return bounds;
        }
        let (w, h) = if aspect > bounds.w / bounds.h {
            (bounds.w, bounds.w / aspect)
        } else {
            (bounds.h * aspect, bounds.h)
        };
        Rect::new(
            bounds.x + (bounds.w - w) / 2.0,
            bounds.y + (bounds.h - h) / 2.0,
            w,
            h,
        )
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)` covering the rectangle grown by
    /// `pad`, clipped to `width`x`height`. Exclusive upper bounds.
    fn pixel_bounds(&self, pad: f64, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clip = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
        (
            clip((self.x - pad).floor(), width),
            clip((self.y - pad).floor(), height),
            clip((self.right() + pad).ceil(), width),
            clip((self.bottom() + pad).ceil(), height),
        )
    }
}

/// Fill the whole surface with a solid color or a diagonal two-stop gradient
/// running from the top-left to the bottom-right corner.
pub fn fill_background(surface: &mut Pixmap, fill: Fill) {
    match fill {
        Fill::Solid(color) => surface.fill(opaque(color)),
        Fill::LinearGradient { from, to } => {
            let (w, h) = (surface.width() as f32, surface.height() as f32);
            let shader = LinearGradient::new(
                Point::from_xy(0.0, 0.0),
                Point::from_xy(w, h),
                vec![
                    GradientStop::new(0.0, opaque(from)),
                    GradientStop::new(1.0, opaque(to)),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            );
            match (shader, tiny_skia::Rect::from_xywh(0.0, 0.0, w, h)) {
                (Some(shader), Some(rect)) => {
                    let paint = Paint {
                        shader,
                        ..Paint::default()
                    };
                    surface.fill_rect(rect, &paint, Transform::identity(), None);
                }
                _ => surface.fill(opaque(from)),
            }
        }
    }
}

/// Cubic control-point factor approximating a quarter circle.
const KAPPA: f32 = 0.552_284_8;

/// Closed rounded-rectangle path. The radius is clamped to half the shorter
/// side.
pub fn rounded_rect_path(rect: &Rect, radius: f64) -> Option<Path> {
    let (x, y, w, h) = (rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32);
    let r = radius.clamp(0.0, rect.w.min(rect.h) / 2.0) as f32;
    if r <= 0.0 {
        return tiny_skia::Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect);
    }
    let k = r * (1.0 - KAPPA);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - k, y, x + w, y + k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - k, x + w - k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + k, y + h, x, y + h - k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + k, x + k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Opacity of the drop shadow before blurring.
const SHADOW_ALPHA: u8 = 140;

/// Draw a blurred drop shadow under a rounded rectangle.
///
/// The shadow is filled and blurred on its own layer, so the blur is never
/// clipped by the content's rounded corners.
pub fn draw_shadow(surface: &mut Pixmap, rect: &Rect, radius: f64, blur: f64) {
    if blur <= 0.0 {
        return;
    }
    let sigma = (blur / 2.0).max(0.5);
    let pad = (sigma * 3.0).ceil();
    let shadow_rect = Rect::new(rect.x, rect.y + blur * 0.5, rect.w, rect.h);
    let (x0, y0, x1, y1) = shadow_rect.pixel_bounds(pad, surface.width(), surface.height());
    let (Some(mut layer), Some(path)) = (
        Pixmap::new(x1.saturating_sub(x0), y1.saturating_sub(y0)),
        rounded_rect_path(&shadow_rect, radius),
    ) else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, SHADOW_ALPHA);
    paint.anti_alias = true;
    let to_layer = Transform::from_translate(-(x0 as f32), -(y0 as f32));
    layer.fill_path(&path, &paint, FillRule::Winding, to_layer, None);

    // Premultiplied black blurs channel-wise without leaving the valid range.
    let (w, h) = (layer.width(), layer.height());
    let Some(mask) = RgbaImage::from_raw(w, h, layer.take()) else {
        return;
    };
    let blurred = imageops::blur(&mask, sigma as f32);
    let Some(shadow) = IntSize::from_wh(w, h).and_then(|size| Pixmap::from_vec(blurred.into_raw(), size))
    else {
        return;
    };
    surface.draw_pixmap(
        x0 as i32,
        y0 as i32,
        shadow.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Draw `source` through `transform`, clipped to the rounded `content`
/// rectangle, with bilinear filtering.
pub fn draw_clipped(
    surface: &mut Pixmap,
    source: &Pixmap,
    content: &Rect,
    radius: f64,
    transform: Transform,
) {
    let (Some(path), Some(mut clip)) = (
        rounded_rect_path(content, radius),
        Mask::new(surface.width(), surface.height()),
    ) else {
        return;
    };
    clip.fill_path(&path, FillRule::Winding, true, Transform::identity());
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    surface.draw_pixmap(0, 0, source.as_ref(), &paint, transform, Some(&clip));
}

/// Copy a straight-alpha image into a premultiplied pixmap.
pub fn image_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha < 255 {
            for channel in &mut px[..3] {
                *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
            }
        }
    }
    Pixmap::from_vec(data, size)
}

/// Convert a premultiplied pixmap back to a straight-alpha image.
pub fn pixmap_to_image(pixmap: &Pixmap) -> Option<RgbaImage> {
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
}

/// Classic arrow pointer outline, tip at the origin, 20 units tall.
const ARROW: [(f32, f32); 7] = [
    (0.0, 0.0),
    (0.0, 17.0),
    (4.2, 13.2),
    (7.0, 19.5),
    (9.8, 18.3),
    (7.1, 12.1),
    (12.6, 12.1),
];

/// Height of the arrow glyph in glyph units.
pub const ARROW_HEIGHT: f64 = 20.0;

/// Outline stroke width in glyph units.
const ARROW_OUTLINE: f32 = 1.4;

fn arrow_path() -> Option<Path> {
    let mut pb = PathBuilder::new();
    let (first, rest) = ARROW.split_first()?;
    pb.move_to(first.0, first.1);
    for &(x, y) in rest {
        pb.line_to(x, y);
    }
    pb.close();
    pb.finish()
}

/// Draw the pointer glyph with its tip at `(x, y)`, `size` pixels tall: a
/// white body with a black outline.
pub fn draw_arrow_cursor(surface: &mut Pixmap, x: f64, y: f64, size: f64) {
    if !(size.is_finite() && size > 0.5) {
        return;
    }
    let Some(path) = arrow_path() else {
        return;
    };
    let unit = (size / ARROW_HEIGHT) as f32;
    let transform = Transform::from_row(unit, 0.0, 0.0, unit, x as f32, y as f32);

    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(Color::WHITE);
    surface.fill_path(&path, &paint, FillRule::Winding, transform, None);

    paint.set_color(Color::BLACK);
    let stroke = Stroke {
        width: ARROW_OUTLINE,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    surface.stroke_path(&path, &paint, &stroke, transform, None);
}

fn opaque(color: Rgb) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, 255)
}
