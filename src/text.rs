//! Text measurement and painting through an SVG text pipeline.
//!
//! Lines are laid out as SVG `<text>` elements, shaped by `usvg` against a
//! font database (system fonts plus an optional directory) and rasterized
//! with `resvg`.

use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::fit::{FontWeight, TextMeasurer};

/// One horizontally centered line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub size: u32,
    pub weight: FontWeight,
    pub color: Color,
    pub center_x: f32,
    pub baseline_y: f32,
}

pub trait TextPainter: TextMeasurer {
    fn paint(&self, canvas: &mut RgbaImage, lines: &[TextLine]) -> RenderResult<()>;
}

pub struct SvgTextEngine {
    fontdb: Arc<usvg::fontdb::Database>,
    family: String,
}

impl SvgTextEngine {
    pub fn new(font_dir: Option<&Path>, family: &str) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = font_dir {
            db.load_fonts_dir(dir);
        }
        if db.is_empty() {
            warn!("No fonts found; card text cannot be rendered");
        } else {
            debug!(faces = db.len(), "Loaded font database");
        }
        Self {
            fontdb: Arc::new(db),
            family: family.to_string(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }

    fn ensure_fonts(&self) -> RenderResult<()> {
        if self.fontdb.is_empty() {
            return Err(RenderError::CompositingFailed(
                "font database is empty; set fontDir or install system fonts".into(),
            ));
        }
        Ok(())
    }

    fn parse(&self, svg: &str) -> RenderResult<usvg::Tree> {
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            font_resolver: font_resolver(),
            ..Default::default()
        };
        usvg::Tree::from_str(svg, &opts)
            .map_err(|e| RenderError::CompositingFailed(format!("text svg: {}", e)))
    }

    fn text_element(&self, line: &TextLine) -> String {
        format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-family="{}" font-size="{}" font-weight="{}" fill="{}">{}</text>"#,
            line.center_x,
            line.baseline_y,
            escape_xml(&self.family),
            line.size,
            line.weight.css(),
            line.color.hex(),
            escape_xml(&line.text),
        )
    }
}

/// Requested families first, then the generic ones, then any face at all.
fn font_resolver() -> usvg::FontResolver<'static> {
    use usvg::fontdb::{Family, Query, Stretch, Style, Weight};

    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => Family::Serif,
                    usvg::FontFamily::SansSerif => Family::SansSerif,
                    usvg::FontFamily::Cursive => Family::Cursive,
                    usvg::FontFamily::Fantasy => Family::Fantasy,
                    usvg::FontFamily::Monospace => Family::Monospace,
                    usvg::FontFamily::Named(name) => Family::Name(name),
                });
            }
            families.extend([Family::SansSerif, Family::Serif, Family::Monospace]);

            let style = match font.style() {
                usvg::FontStyle::Normal => Style::Normal,
                usvg::FontStyle::Italic => Style::Italic,
                usvg::FontStyle::Oblique => Style::Oblique,
            };
            let query = Query {
                families: &families,
                weight: Weight(font.weight()),
                stretch: Stretch::Normal,
                style,
            };
            fontdb
                .query(&query)
                .or_else(|| fontdb.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

impl TextMeasurer for SvgTextEngine {
    fn measure(&self, text: &str, size: u32, weight: FontWeight) -> RenderResult<f32> {
        if text.trim().is_empty() {
            return Ok(0.0);
        }
        self.ensure_fonts()?;
        let line = TextLine {
            text: text.to_string(),
            size,
            weight,
            color: Color::BLACK,
            center_x: 0.0,
            baseline_y: size as f32,
        };
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1">{}</svg>"#,
            self.text_element(&line)
        );
        let width = self.parse(&svg)?.root().bounding_box().width();
        if width <= 0.0 {
            return Err(RenderError::CompositingFailed(format!(
                "no glyphs resolved for '{}' in family '{}'",
                text, self.family
            )));
        }
        Ok(width)
    }
}

impl TextPainter for SvgTextEngine {
    fn paint(&self, canvas: &mut RgbaImage, lines: &[TextLine]) -> RenderResult<()> {
        if lines.is_empty() {
            return Ok(());
        }
        self.ensure_fonts()?;
        let (width, height) = canvas.dimensions();
        let body: String = lines.iter().map(|l| self.text_element(l)).collect();
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = width,
            h = height,
            body = body,
        );
        let tree = self.parse(&svg)?;
        let has_text = lines.iter().any(|l| !l.text.trim().is_empty());
        if has_text && tree.root().bounding_box().width() <= 0.0 {
            return Err(RenderError::CompositingFailed("text produced no glyphs".into()));
        }

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| RenderError::CompositingFailed("failed to allocate text pixmap".into()))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        composite_premultiplied(canvas, pixmap.data());
        Ok(())
    }
}

/// Source-over of a premultiplied RGBA buffer the same size as `canvas`.
fn composite_premultiplied(canvas: &mut RgbaImage, src: &[u8]) {
    for (dst, s) in canvas.pixels_mut().zip(src.chunks_exact(4)) {
        let sa = s[3] as u32;
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        for c in 0..3 {
            dst[c] = (s[c] as u32 + dst[c] as u32 * inv / 255).min(255) as u8;
        }
        dst[3] = (sa + dst[3] as u32 * inv / 255).min(255) as u8;
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml(r#"Tom & "Jerry" <x>"#), "Tom &amp; &quot;Jerry&quot; &lt;x&gt;");
    }

    #[test]
    fn premultiplied_over_opaque() {
        let mut canvas = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        // 50% black, premultiplied.
        composite_premultiplied(&mut canvas, &[0, 0, 0, 128]);
        let p = canvas.get_pixel(0, 0);
        assert_eq!(p[3], 255);
        assert!(p[0] > 120 && p[0] < 135);
    }

    #[test]
    fn measurement_grows_with_size_or_fails_loudly() {
        let engine = SvgTextEngine::new(None, "sans-serif");
        if engine.face_count() == 0 {
            let err = engine.measure("Jane Doe", 12, FontWeight::Regular).unwrap_err();
            assert!(matches!(err, RenderError::CompositingFailed(_)));
            return;
        }
        let small = engine.measure("Jane Doe", 12, FontWeight::Regular).unwrap();
        let large = engine.measure("Jane Doe", 36, FontWeight::Regular).unwrap();
        assert!(small > 0.0);
        assert!(large > small);
    }

    #[test]
    fn unknown_family_falls_back_to_an_installed_face() {
        let engine = SvgTextEngine::new(None, "No Such Family 9000");
        if engine.face_count() == 0 {
            return;
        }
        assert!(engine.measure("Jane Doe", 20, FontWeight::Bold).unwrap() > 0.0);
    }

    #[test]
    fn paint_draws_pixels() {
        let engine = SvgTextEngine::new(None, "sans-serif");
        let white = image::Rgba([255, 255, 255, 255]);
        let mut canvas = RgbaImage::from_pixel(200, 60, white);
        let line = TextLine {
            text: "Jane Doe".into(),
            size: 24,
            weight: FontWeight::Bold,
            color: Color::BLACK,
            center_x: 100.0,
            baseline_y: 40.0,
        };
        let result = engine.paint(&mut canvas, std::slice::from_ref(&line));
        if engine.face_count() == 0 {
            assert!(matches!(result, Err(RenderError::CompositingFailed(_))));
            return;
        }
        result.unwrap();
        assert!(canvas.pixels().any(|p| *p != white));
    }
}
