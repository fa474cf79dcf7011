//! Render Configuration - explicit, passed to every component
//!
//! Loaded from JSON with per-field defaults. Nothing here is looked up
//! globally; each component receives the config at construction.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::profile::Theme;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub palettes: ThemePalettes,
    #[serde(default)]
    pub card: CardLayout,
    #[serde(default)]
    pub pass: PassSettings,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub font_dir: Option<PathBuf>,
    #[serde(default = "default_photo_timeout")]
    pub photo_fetch_timeout_secs: u64,
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
}

fn default_base_url() -> String { "http://localhost:3000".to_string() }
fn default_photo_timeout() -> u64 { 5 }
fn default_max_photo_bytes() -> usize { 5 * 1024 * 1024 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            palettes: ThemePalettes::default(),
            card: CardLayout::default(),
            pass: PassSettings::default(),
            backup_dir: None,
            font_dir: None,
            photo_fetch_timeout_secs: default_photo_timeout(),
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

impl RenderConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> RenderResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: RenderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> RenderResult<()> {
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RenderError::InvalidConfig(format!(
                "base URL must be http(s): '{}'",
                self.base_url
            )));
        }
        self.card.validate()
    }

    /// Base URL without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

/// Colors for one theme: matrix-code modules, code background, avatar circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub dark: Color,
    pub light: Color,
    pub accent: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemePalettes {
    #[serde(default = "palette_default")]
    pub default: Palette,
    #[serde(default = "palette_dark")]
    pub dark: Palette,
    #[serde(default = "palette_blue")]
    pub blue: Palette,
    #[serde(default = "palette_green")]
    pub green: Palette,
    #[serde(default = "palette_purple")]
    pub purple: Palette,
}

fn palette_default() -> Palette {
    Palette { dark: Color::BLACK, light: Color::WHITE, accent: Color::rgb(0x66, 0x7e, 0xea) }
}
fn palette_dark() -> Palette {
    Palette { dark: Color::rgb(0x1f, 0x29, 0x37), light: Color::rgb(0xf9, 0xfa, 0xfb), accent: Color::rgb(0x37, 0x41, 0x51) }
}
fn palette_blue() -> Palette {
    Palette { dark: Color::rgb(0x1e, 0x40, 0xaf), light: Color::rgb(0xef, 0xf6, 0xff), accent: Color::rgb(0x3b, 0x82, 0xf6) }
}
fn palette_green() -> Palette {
    Palette { dark: Color::rgb(0x16, 0x65, 0x34), light: Color::rgb(0xf0, 0xfd, 0xf4), accent: Color::rgb(0x22, 0xc5, 0x5e) }
}
fn palette_purple() -> Palette {
    Palette { dark: Color::rgb(0x6b, 0x21, 0xa8), light: Color::rgb(0xfa, 0xf5, 0xff), accent: Color::rgb(0xa8, 0x55, 0xf7) }
}

impl Default for ThemePalettes {
    fn default() -> Self {
        Self {
            default: palette_default(),
            dark: palette_dark(),
            blue: palette_blue(),
            green: palette_green(),
            purple: palette_purple(),
        }
    }
}

impl ThemePalettes {
    pub fn get(&self, theme: Theme) -> &Palette {
        match theme {
            Theme::Default => &self.default,
            Theme::Dark => &self.dark,
            Theme::Blue => &self.blue,
            Theme::Green => &self.green,
            Theme::Purple => &self.purple,
        }
    }
}

/// Integer font-size range for one class of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontRange {
    pub min_size: u32,
    pub max_size: u32,
}

/// Geometry of the composite card. All values in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardLayout {
    pub width: u32,
    pub height: u32,
    pub gradient_start: Color,
    pub gradient_end: Color,
    pub code_size: u32,
    pub code_padding: u32,
    pub code_top: u32,
    pub panel_radius: u32,
    pub details_margin: u32,
    pub details_top: u32,
    pub details_bottom_margin: u32,
    pub details_padding: u32,
    pub avatar_diameter: u32,
    pub avatar_ring: u32,
    pub text_gap: u32,
    pub line_spacing: u32,
    pub name_font: FontRange,
    pub secondary_font: FontRange,
    pub name_color: Color,
    pub secondary_color: Color,
    pub font_family: String,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            width: 850,
            height: 750,
            gradient_start: Color::rgb(0x66, 0x7e, 0xea),
            gradient_end: Color::rgb(0x76, 0x4b, 0xa2),
            code_size: 300,
            code_padding: 20,
            code_top: 40,
            panel_radius: 20,
            details_margin: 50,
            details_top: 450,
            details_bottom_margin: 30,
            details_padding: 30,
            avatar_diameter: 120,
            avatar_ring: 4,
            text_gap: 16,
            line_spacing: 10,
            name_font: FontRange { min_size: 20, max_size: 40 },
            secondary_font: FontRange { min_size: 12, max_size: 22 },
            name_color: Color::rgb(0x1f, 0x29, 0x37),
            secondary_color: Color::rgb(0x6b, 0x72, 0x80),
            font_family: "sans-serif".to_string(),
        }
    }
}

impl CardLayout {
    /// Width and height of the white panel around the code.
    pub fn code_panel_size(&self) -> u32 {
        self.code_size + 2 * self.code_padding
    }

    pub fn code_panel_bottom(&self) -> u32 {
        self.code_top + self.code_panel_size()
    }

    pub fn details_width(&self) -> u32 {
        self.width.saturating_sub(2 * self.details_margin)
    }

    pub fn details_height(&self) -> u32 {
        self.height
            .saturating_sub(self.details_top)
            .saturating_sub(self.details_bottom_margin)
    }

    /// Horizontal room available to a line of text.
    pub fn usable_text_width(&self) -> u32 {
        self.details_width().saturating_sub(2 * self.details_padding)
    }

    /// Outer radius of the avatar including its ring.
    pub fn avatar_outer_radius(&self) -> u32 {
        self.avatar_diameter / 2 + self.avatar_ring
    }

    /// Vertical extent of the full text stack: name plus three secondary lines.
    pub fn max_text_stack_height(&self) -> u32 {
        let name = self.name_font.max_size + self.line_spacing;
        let secondary = self.secondary_font.max_size + self.line_spacing;
        name + 3 * secondary
    }

    pub fn validate(&self) -> RenderResult<()> {
        let fail = |msg: String| Err(RenderError::InvalidConfig(msg));

        for (label, range) in [("name", self.name_font), ("secondary", self.secondary_font)] {
            if range.min_size == 0 || range.min_size > range.max_size {
                return fail(format!(
                    "{} font range {}..={} is empty",
                    label, range.min_size, range.max_size
                ));
            }
        }
        if self.code_panel_size() > self.width {
            return fail("code panel wider than canvas".into());
        }
        if self.details_width() <= 2 * self.details_padding {
            return fail("details panel leaves no room for text".into());
        }
        let avatar_top = self.details_top.saturating_sub(self.avatar_outer_radius());
        if self.avatar_outer_radius() > self.details_top || avatar_top < self.code_panel_bottom() {
            return fail(format!(
                "avatar top {} overlaps code panel ending at {}",
                avatar_top,
                self.code_panel_bottom()
            ));
        }
        let needed = self.avatar_outer_radius() + self.text_gap + self.max_text_stack_height();
        if needed > self.details_height() {
            return fail(format!(
                "details panel height {} cannot hold avatar and text ({})",
                self.details_height(),
                needed
            ));
        }
        Ok(())
    }
}

/// Static metadata for pass descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSettings {
    #[serde(default = "default_pass_type")]
    pub pass_type_identifier: String,
    #[serde(default = "default_team")]
    pub team_identifier: String,
    #[serde(default = "default_org")]
    pub organization_name: String,
    #[serde(default = "default_pass_description")]
    pub description: String,
    #[serde(default = "default_pass_fg")]
    pub foreground_color: Color,
    #[serde(default = "default_pass_bg")]
    pub background_color: Color,
    #[serde(default = "default_pass_label")]
    pub label_color: Color,
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

fn default_pass_type() -> String { "pass.com.cardforge.card".to_string() }
fn default_team() -> String { "CARDFORGE".to_string() }
fn default_org() -> String { "CardForge".to_string() }
fn default_pass_description() -> String { "Digital Business Card".to_string() }
fn default_pass_fg() -> Color { Color::WHITE }
fn default_pass_bg() -> Color { Color::rgb(0x66, 0x7e, 0xea) }
fn default_pass_label() -> Color { Color::rgb(0xe0, 0xe7, 0xff) }
fn default_validity_days() -> i64 { 365 }

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            pass_type_identifier: default_pass_type(),
            team_identifier: default_team(),
            organization_name: default_org(),
            description: default_pass_description(),
            foreground_color: default_pass_fg(),
            background_color: default_pass_bg(),
            label_color: default_pass_label(),
            validity_days: default_validity_days(),
        }
    }
}
