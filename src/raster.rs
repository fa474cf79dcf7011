//! Raster primitives shared by the compositor and the avatar chain.
//!
//! Shapes are anti-aliased by pixel-center coverage and blended onto opaque
//! RGBA canvases.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use crate::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Blend `color` over the pixel with the given coverage in `[0, 1]`.
pub fn blend(pixel: &mut Rgba<u8>, color: Color, coverage: f32) {
    if coverage <= 0.0 {
        return;
    }
    let a = coverage.min(1.0);
    let mix = |dst: u8, src: u8| (dst as f32 * (1.0 - a) + src as f32 * a).round() as u8;
    let alpha = (pixel[3] as f32 + (255.0 - pixel[3] as f32) * a).round() as u8;
    pixel.0 = [mix(pixel[0], color.r), mix(pixel[1], color.g), mix(pixel[2], color.b), alpha];
}

/// Two-stop gradient running from the top-left to the bottom-right corner.
pub fn fill_linear_gradient(canvas: &mut RgbaImage, start: Color, end: Color) {
    let (w, h) = canvas.dimensions();
    let span = (w + h).saturating_sub(2).max(1) as f32;
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let t = (x + y) as f32 / span;
        *pixel = start.lerp(end, t).to_rgba();
    }
}

/// Coverage of a pixel center by a rounded rectangle.
fn rounded_rect_coverage(rect: &Rect, radius: f32, px: f32, py: f32) -> f32 {
    let (x0, y0) = (rect.x as f32, rect.y as f32);
    let (x1, y1) = (rect.right() as f32, rect.bottom() as f32);
    if px < x0 || px > x1 || py < y0 || py > y1 {
        return 0.0;
    }
    if radius <= 0.0 {
        return 1.0;
    }
    let dx = (x0 + radius - px).max(px - (x1 - radius)).max(0.0);
    let dy = (y0 + radius - py).max(py - (y1 - radius)).max(0.0);
    let dist = (dx * dx + dy * dy).sqrt();
    (radius - dist + 0.5).clamp(0.0, 1.0)
}

pub fn fill_rounded_rect(canvas: &mut RgbaImage, rect: Rect, radius: u32, color: Color) {
    let radius = (radius as f32).min(rect.width as f32 / 2.0).min(rect.height as f32 / 2.0);
    let x_end = rect.right().min(canvas.width());
    let y_end = rect.bottom().min(canvas.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let coverage = rounded_rect_coverage(&rect, radius, x as f32 + 0.5, y as f32 + 0.5);
            blend(canvas.get_pixel_mut(x, y), color, coverage);
        }
    }
}

fn circle_coverage(cx: f32, cy: f32, radius: f32, px: f32, py: f32) -> f32 {
    let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
    (radius - dist + 0.5).clamp(0.0, 1.0)
}

/// Filled circle centered on `(cx, cy)` in canvas coordinates.
pub fn fill_circle(canvas: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Color) {
    let x_start = (cx - radius - 1.0).floor().max(0.0) as u32;
    let y_start = (cy - radius - 1.0).floor().max(0.0) as u32;
    let x_end = ((cx + radius + 1.0).ceil() as u32).min(canvas.width());
    let y_end = ((cy + radius + 1.0).ceil() as u32).min(canvas.height());
    for y in y_start..y_end {
        for x in x_start..x_end {
            let coverage = circle_coverage(cx, cy, radius, x as f32 + 0.5, y as f32 + 0.5);
            blend(canvas.get_pixel_mut(x, y), color, coverage);
        }
    }
}

/// Clear everything outside the inscribed circle to transparent.
pub fn mask_circle(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    let radius = w.min(h) as f32 / 2.0;
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let coverage = circle_coverage(cx, cy, radius, x as f32 + 0.5, y as f32 + 0.5);
        pixel[3] = (pixel[3] as f32 * coverage).round() as u8;
    }
}

/// Draw `top` onto `canvas` with its top-left corner at `(x, y)`.
pub fn overlay(canvas: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    image::imageops::overlay(canvas, top, x, y);
}

pub fn encode_png(image: DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_runs_corner_to_corner() {
        let mut canvas = RgbaImage::new(10, 10);
        let (a, b) = (Color::rgb(0, 0, 0), Color::rgb(200, 100, 0));
        fill_linear_gradient(&mut canvas, a, b);
        assert_eq!(*canvas.get_pixel(0, 0), a.to_rgba());
        assert_eq!(*canvas.get_pixel(9, 9), b.to_rgba());
    }

    #[test]
    fn rounded_rect_leaves_corners() {
        let mut canvas = RgbaImage::from_pixel(40, 40, Color::BLACK.to_rgba());
        fill_rounded_rect(&mut canvas, Rect::new(0, 0, 40, 40), 10, Color::WHITE);
        assert_eq!(*canvas.get_pixel(20, 20), Color::WHITE.to_rgba());
        assert_eq!(*canvas.get_pixel(0, 0), Color::BLACK.to_rgba());
        assert_eq!(*canvas.get_pixel(20, 0), Color::WHITE.to_rgba());
    }

    #[test]
    fn circle_mask_clears_corners() {
        let mut image = RgbaImage::from_pixel(20, 20, Color::WHITE.to_rgba());
        mask_circle(&mut image);
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(5, 5, 10, 10)));
        assert!(!a.intersects(&Rect::new(0, 10, 10, 10)));
    }

    #[test]
    fn png_signature() {
        let png = encode_png(DynamicImage::ImageRgba8(RgbaImage::new(2, 2))).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
