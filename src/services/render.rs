//! Renderer — grid overlay and symbol marks on a bounded copy of an upload.
//!
//! DESIGN
//! ======
//! `render` is pure: it copies (and if needed downscales) the session's base
//! image, blends the grid and marks onto the copy, drops alpha and encodes a
//! PNG. Marks come from a `BTreeMap`, so drawing order and therefore output
//! bytes are stable for identical inputs.
//!
//! Strokes are rasterized by testing each pixel centre against the shape's
//! distance field and alpha-blending once per shape, which keeps
//! semi-transparent strokes uniform where a shape overlaps itself.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use crate::state::{Cell, Mark};

/// Uploads wider than this are downscaled to exactly this width.
pub const MAX_WIDTH: u32 = 900;

const GRID_COLOR: Rgba<u8> = Rgba([255, 255, 255, 180]);
const GRID_STROKE: f64 = 2.0;

const STAR_COLOR: Rgba<u8> = Rgba([255, 215, 0, 230]);
const BOMB_COLOR: Rgba<u8> = Rgba([255, 0, 0, 230]);
const MARK_STROKE: f64 = 8.0;
/// Bomb diagonals start this many pixels in from the cell corners.
const BOMB_INSET: i64 = 8;
/// Star radius as a fraction of the smaller cell dimension.
const MARK_SCALE: f64 = 0.28;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("image decode failed: {0}")]
    Decode(image::ImageError),
    #[error("image encode failed: {0}")]
    Encode(image::ImageError),
    #[error("render task failed: {0}")]
    Task(String),
}

// =============================================================================
// CODEC
// =============================================================================

/// Decode uploaded bytes into a bitmap.
///
/// # Errors
///
/// Returns [`RenderError::Decode`] for unsupported or corrupt data.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    image::load_from_memory(bytes).map_err(RenderError::Decode)
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, RenderError> {
    let flattened = DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    flattened
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(buf.into_inner())
}

/// [`decode`] on the blocking pool.
///
/// # Errors
///
/// Returns [`RenderError::Decode`] or [`RenderError::Task`] if the worker dies.
pub async fn decode_async(bytes: Vec<u8>) -> Result<DynamicImage, RenderError> {
    tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

// =============================================================================
// RENDER
// =============================================================================

/// Output dimensions for a source of `width × height`: unchanged up to
/// [`MAX_WIDTH`], otherwise scaled down to exactly that width with the
/// height rounded down.
#[must_use]
pub fn bounded_size(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_WIDTH {
        return (width, height);
    }
    let scaled = u64::from(height) * u64::from(MAX_WIDTH) / u64::from(width);
    (MAX_WIDTH, scaled.max(1) as u32)
}

/// Draw the grid and marks onto a bounded RGBA copy of `base`.
#[must_use]
pub fn render_canvas(base: &DynamicImage, rows: u32, cols: u32, marks: &BTreeMap<Cell, Mark>) -> RgbaImage {
    let (src_w, src_h) = base.dimensions();
    let (width, height) = bounded_size(src_w, src_h);
    let mut canvas = if (width, height) == (src_w, src_h) {
        base.to_rgba8()
    } else {
        base.resize_exact(width, height, FilterType::Lanczos3).to_rgba8()
    };

    let rows = rows.max(1);
    let cols = cols.max(1);
    let w = f64::from(width);
    let h = f64::from(height);
    let cw = w / f64::from(cols);
    let ch = h / f64::from(rows);

    for i in 1..cols {
        let x = f64::from(i) * cw;
        stroke_segment(&mut canvas, (x, 0.0), (x, h), GRID_STROKE, GRID_COLOR);
    }
    for j in 1..rows {
        let y = f64::from(j) * ch;
        stroke_segment(&mut canvas, (0.0, y), (w, y), GRID_STROKE, GRID_COLOR);
    }

    for (cell, mark) in marks {
        if cell.row >= rows || cell.col >= cols {
            continue;
        }
        let x0 = (f64::from(cell.col) * cw) as i64;
        let y0 = (f64::from(cell.row) * ch) as i64;
        let x1 = (f64::from(cell.col + 1) * cw) as i64;
        let y1 = (f64::from(cell.row + 1) * ch) as i64;
        match mark {
            Mark::Star => {
                let cx = (x0 + x1).div_euclid(2);
                let cy = (y0 + y1).div_euclid(2);
                let size = (cw.min(ch) * MARK_SCALE).floor();
                stroke_ring(&mut canvas, pixel_center(cx, cy), size, MARK_STROKE, STAR_COLOR);
            }
            Mark::Bomb => {
                let (l, t, r, b) = (x0 + BOMB_INSET, y0 + BOMB_INSET, x1 - BOMB_INSET, y1 - BOMB_INSET);
                stroke_segment(&mut canvas, pixel_center(l, t), pixel_center(r, b), MARK_STROKE, BOMB_COLOR);
                stroke_segment(&mut canvas, pixel_center(r, t), pixel_center(l, b), MARK_STROKE, BOMB_COLOR);
            }
        }
    }

    canvas
}

/// Render `base` with the grid and marks and encode it as an opaque PNG.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if PNG encoding fails.
pub fn render(base: &DynamicImage, rows: u32, cols: u32, marks: &BTreeMap<Cell, Mark>) -> Result<Vec<u8>, RenderError> {
    encode_png(render_canvas(base, rows, cols, marks))
}

/// [`render`] on the blocking pool, so encoding never stalls the runtime.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] or [`RenderError::Task`] if the worker dies.
pub async fn render_async(
    base: Arc<DynamicImage>,
    rows: u32,
    cols: u32,
    marks: BTreeMap<Cell, Mark>,
) -> Result<Vec<u8>, RenderError> {
    tokio::task::spawn_blocking(move || render(&base, rows, cols, &marks))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

// =============================================================================
// RASTER PRIMITIVES
// =============================================================================

fn pixel_center(x: i64, y: i64) -> (f64, f64) {
    (x as f64 + 0.5, y as f64 + 0.5)
}

fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = f64::from(src[3]) / 255.0;
    if a <= 0.0 {
        return dst;
    }
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    let out_a = (f64::from(src[3]) + f64::from(dst[3]) * inv)
        .round()
        .clamp(0.0, 255.0) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

/// Blend `color` into every pixel whose centre satisfies `inside`, scanning
/// only the clamped bounding box `[min, max]`.
fn fill_where(
    img: &mut RgbaImage,
    min: (f64, f64),
    max: (f64, f64),
    color: Rgba<u8>,
    inside: impl Fn(f64, f64) -> bool,
) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let max_x = i64::from(img.width()) - 1;
    let max_y = i64::from(img.height()) - 1;
    let x_lo = (min.0.floor() as i64).clamp(0, max_x);
    let x_hi = (max.0.ceil() as i64).clamp(0, max_x);
    let y_lo = (min.1.floor() as i64).clamp(0, max_y);
    let y_hi = (max.1.ceil() as i64).clamp(0, max_y);

    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let (px, py) = pixel_center(x, y);
            if inside(px, py) {
                let dst = *img.get_pixel(x as u32, y as u32);
                img.put_pixel(x as u32, y as u32, blend_pixel(dst, color));
            }
        }
    }
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f64::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (qx, qy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - qx).powi(2) + (p.1 - qy).powi(2)).sqrt()
}

fn stroke_segment(img: &mut RgbaImage, a: (f64, f64), b: (f64, f64), width: f64, color: Rgba<u8>) {
    let half = width / 2.0;
    let min = (a.0.min(b.0) - half, a.1.min(b.1) - half);
    let max = (a.0.max(b.0) + half, a.1.max(b.1) + half);
    fill_where(img, min, max, color, |x, y| distance_to_segment((x, y), a, b) <= half);
}

/// Circle outline whose outer edge sits at `radius`, drawn inward by `width`.
fn stroke_ring(img: &mut RgbaImage, center: (f64, f64), radius: f64, width: f64, color: Rgba<u8>) {
    let inner = (radius - width).max(0.0);
    let min = (center.0 - radius, center.1 - radius);
    let max = (center.0 + radius, center.1 + radius);
    fill_where(img, min, max, color, |x, y| {
        let d = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
        d <= radius && d >= inner
    });
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
