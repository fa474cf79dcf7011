//! Card Compositor - branded raster card for a profile
//!
//! Layout, top to bottom: gradient background, code panel, details panel
//! with an avatar straddling its top edge, then auto-fitted text lines.
//! `layout` is pure; `compose` paints the plan.

use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::avatar::AvatarChain;
use crate::color::Color;
use crate::config::{CardLayout, FontRange, RenderConfig};
use crate::encoder::{render_matrix, Style};
use crate::error::{RenderError, RenderResult};
use crate::fit::{fit, FitConstraints, FontWeight};
use crate::profile::Profile;
use crate::raster::{encode_png, fill_circle, fill_linear_gradient, fill_rounded_rect, overlay, Rect};
use crate::text::{TextLine, TextPainter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Name,
    Secondary,
}

impl FieldClass {
    pub fn range(self, layout: &CardLayout) -> FontRange {
        match self {
            FieldClass::Name => layout.name_font,
            FieldClass::Secondary => layout.secondary_font,
        }
    }

    pub fn weight(self) -> FontWeight {
        match self {
            FieldClass::Name => FontWeight::Bold,
            FieldClass::Secondary => FontWeight::Regular,
        }
    }

    fn color(self, layout: &CardLayout) -> Color {
        match self {
            FieldClass::Name => layout.name_color,
            FieldClass::Secondary => layout.secondary_color,
        }
    }
}

/// Geometry and text for one card, before any pixels are touched.
#[derive(Debug, Clone)]
pub struct CardPlan {
    pub width: u32,
    pub height: u32,
    pub target_url: String,
    pub code_panel: Rect,
    pub code_origin: (u32, u32),
    pub details_panel: Rect,
    pub avatar_center: (f32, f32),
    pub avatar_diameter: u32,
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone)]
pub struct CompositeCard {
    pub width: u32,
    pub height: u32,
    pub target_url: String,
    pub avatar_source: &'static str,
    pub png: Vec<u8>,
}

pub struct CardCompositor {
    config: Arc<RenderConfig>,
    painter: Arc<dyn TextPainter>,
    avatars: AvatarChain,
}

impl CardCompositor {
    pub fn new(
        config: Arc<RenderConfig>,
        painter: Arc<dyn TextPainter>,
        avatars: AvatarChain,
    ) -> RenderResult<Self> {
        config.card.validate()?;
        Ok(Self { config, painter, avatars })
    }

    /// Fails when text cannot be measured; a card without its text is never laid out.
    pub fn layout(&self, profile: &Profile) -> RenderResult<CardPlan> {
        let l = &self.config.card;

        let panel = l.code_panel_size();
        let code_panel = Rect::new((l.width - panel) / 2, l.code_top, panel, panel);
        let code_origin = (code_panel.x + l.code_padding, code_panel.y + l.code_padding);

        let details_panel = Rect::new(l.details_margin, l.details_top, l.details_width(), l.details_height());
        let avatar_center = (l.width as f32 / 2.0, details_panel.y as f32);

        let fields = [
            (FieldClass::Name, Some(profile.label())),
            (FieldClass::Secondary, profile.title()),
            (FieldClass::Secondary, profile.email()),
            (FieldClass::Secondary, profile.organization()),
        ];

        let max_width = l.usable_text_width() as f32;
        let mut cursor = details_panel.y + l.avatar_outer_radius() + l.text_gap;
        let mut lines = Vec::new();
        for (class, text) in fields {
            let Some(text) = text else { continue };
            let range = class.range(l);
            let constraints = FitConstraints::new(range, max_width, class.weight());
            let size = fit(text, &constraints, self.painter.as_ref())?;
            let baseline = cursor + range.max_size;
            lines.push(TextLine {
                text: text.to_string(),
                size,
                weight: class.weight(),
                color: class.color(l),
                center_x: avatar_center.0,
                baseline_y: baseline as f32,
            });
            cursor = baseline + l.line_spacing;
        }

        Ok(CardPlan {
            width: l.width,
            height: l.height,
            target_url: profile.canonical_url(self.config.base()),
            code_panel,
            code_origin,
            details_panel,
            avatar_center,
            avatar_diameter: l.avatar_diameter,
            lines,
        })
    }

    /// Paint the card and return the canvas with the avatar source used.
    #[instrument(skip_all, fields(identifier = %profile.identifier))]
    pub fn render(&self, profile: &Profile) -> RenderResult<(RgbaImage, &'static str)> {
        let l = &self.config.card;
        let plan = self.layout(profile)?;

        // Encode first: a failed code must never yield a partial card.
        let code = render_matrix(&plan.target_url, &Style::plain(l.code_size))?;

        let mut canvas = RgbaImage::new(plan.width, plan.height);
        fill_linear_gradient(&mut canvas, l.gradient_start, l.gradient_end);

        fill_rounded_rect(&mut canvas, plan.code_panel, l.panel_radius, Color::WHITE);
        let code = DynamicImage::ImageRgb8(code).to_rgba8();
        overlay(&mut canvas, &code, plan.code_origin.0 as i64, plan.code_origin.1 as i64);

        fill_rounded_rect(&mut canvas, plan.details_panel, l.panel_radius, Color::WHITE);

        let (cx, cy) = plan.avatar_center;
        fill_circle(&mut canvas, cx, cy, l.avatar_outer_radius() as f32, Color::WHITE);
        let (avatar, source) = self.avatars.resolve(profile, plan.avatar_diameter);
        let half = plan.avatar_diameter as f32 / 2.0;
        overlay(&mut canvas, &avatar, (cx - half).round() as i64, (cy - half).round() as i64);

        self.painter.paint(&mut canvas, &plan.lines)?;

        debug!(lines = plan.lines.len(), avatar = source, "Card composed");
        Ok((canvas, source))
    }

    pub fn compose(&self, profile: &Profile) -> RenderResult<CompositeCard> {
        let (canvas, avatar_source) = self.render(profile)?;
        let (width, height) = canvas.dimensions();
        let png = encode_png(DynamicImage::ImageRgba8(canvas))
            .map_err(|e| RenderError::CompositingFailed(format!("png encode: {}", e)))?;
        Ok(CompositeCard {
            width,
            height,
            target_url: profile.canonical_url(self.config.base()),
            avatar_source,
            png,
        })
    }
}
