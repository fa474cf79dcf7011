//! Link Encoder - canonical card URL to matrix-code bitmap
//!
//! Error correction is fixed at the medium tier and the quiet zone at two
//! modules. Output bitmaps are exactly `size x size` pixels.

use image::{DynamicImage, RgbImage};
use qrcode::{Color as Module, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

use crate::backup::{BackupKey, BackupStore};
use crate::color::Color;
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::profile::{Profile, Theme};
use crate::raster::encode_png;

pub const QUIET_ZONE_MODULES: u32 = 2;
pub const ERROR_CORRECTION: EcLevel = EcLevel::M;
pub const MIN_CUSTOM_SIZE: u32 = 100;
pub const MAX_CUSTOM_SIZE: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Standard,
    Small,
    Large,
    Branded,
    Trackable,
    Custom,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Small => "small",
            Variant::Large => "large",
            Variant::Branded => "branded",
            Variant::Trackable => "trackable",
            Variant::Custom => "custom",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Variant::Standard),
            "small" => Ok(Variant::Small),
            "large" => Ok(Variant::Large),
            "branded" => Ok(Variant::Branded),
            "trackable" => Ok(Variant::Trackable),
            "custom" => Ok(Variant::Custom),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

/// Pixel size and module colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub size: u32,
    pub dark: Color,
    pub light: Color,
}

impl Style {
    pub const fn plain(size: u32) -> Self {
        Self { size, dark: Color::BLACK, light: Color::WHITE }
    }

    fn validate(&self) -> RenderResult<()> {
        if !(MIN_CUSTOM_SIZE..=MAX_CUSTOM_SIZE).contains(&self.size) {
            return Err(RenderError::InvalidConfig(format!(
                "code size {} outside {}..={}",
                self.size, MIN_CUSTOM_SIZE, MAX_CUSTOM_SIZE
            )));
        }
        Ok(())
    }
}

/// A variant together with whatever the caller supplies for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Preset {
    Standard,
    Small,
    Large,
    Branded(Theme),
    Trackable { style: Style, params: Vec<(String, String)> },
    Custom(Style),
}

impl Preset {
    /// Trackable preset with the usual attribution parameters.
    pub fn trackable(style: Style, medium: &str) -> Self {
        Preset::Trackable {
            style,
            params: vec![
                ("utm_source".to_string(), "qr".to_string()),
                ("utm_medium".to_string(), medium.to_string()),
            ],
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            Preset::Standard => Variant::Standard,
            Preset::Small => Variant::Small,
            Preset::Large => Variant::Large,
            Preset::Branded(_) => Variant::Branded,
            Preset::Trackable { .. } => Variant::Trackable,
            Preset::Custom(_) => Variant::Custom,
        }
    }

    /// Custom renders are never written to the backup store.
    pub fn persists(&self) -> bool {
        !matches!(self, Preset::Custom(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedLink {
    pub variant: Variant,
    pub target_url: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

pub struct LinkEncoder {
    config: Arc<RenderConfig>,
    backup: Option<Arc<dyn BackupStore>>,
}

impl LinkEncoder {
    pub fn new(config: Arc<RenderConfig>) -> Self {
        Self { config, backup: None }
    }

    pub fn with_backup(mut self, store: Arc<dyn BackupStore>) -> Self {
        self.backup = Some(store);
        self
    }

    fn style_for(&self, preset: &Preset) -> RenderResult<Style> {
        let style = match preset {
            Preset::Standard => Style::plain(400),
            Preset::Small => Style::plain(200),
            Preset::Large => Style::plain(600),
            Preset::Branded(theme) => {
                let palette = self.config.palettes.get(*theme);
                Style { size: 400, dark: palette.dark, light: palette.light }
            }
            Preset::Trackable { style, .. } | Preset::Custom(style) => {
                style.validate()?;
                *style
            }
        };
        Ok(style)
    }

    /// Encode `target_url` as given (plus attribution parameters for
    /// trackable presets). Never touches the backup store.
    pub fn encode(&self, target_url: &str, preset: &Preset) -> RenderResult<EncodedLink> {
        let style = self.style_for(preset)?;
        let target_url = match preset {
            Preset::Trackable { params, .. } => with_query(target_url, params)?,
            _ => target_url.to_string(),
        };

        let image = render_matrix(&target_url, &style)?;
        let png = encode_png(DynamicImage::ImageRgb8(image))
            .map_err(|e| RenderError::EncodingFailed(format!("png encode: {}", e)))?;

        debug!(variant = %preset.variant(), bytes = png.len(), "Encoded link");
        Ok(EncodedLink {
            variant: preset.variant(),
            target_url,
            width: style.size,
            height: style.size,
            png,
        })
    }

    /// Encode the profile's canonical URL and opportunistically back it up.
    pub fn encode_for(&self, profile: &Profile, preset: &Preset) -> RenderResult<EncodedLink> {
        let url = profile.canonical_url(self.config.base());
        let link = self.encode(&url, preset)?;
        if preset.persists() {
            self.backup(&profile.identifier, &link);
        }
        Ok(link)
    }

    fn backup(&self, identifier: &str, link: &EncodedLink) {
        let Some(store) = &self.backup else {
            return;
        };
        let key = BackupKey::now(link.variant, identifier);
        if let Err(e) = store.put(&key, &link.png) {
            warn!(%key, error = %e, "Backup write failed; continuing");
        }
    }

    /// Standard, small, large, then branded when the theme is not default.
    /// The first entry is the primary artifact.
    pub fn generate_all(&self, profile: &Profile) -> RenderResult<Vec<EncodedLink>> {
        let mut presets = vec![Preset::Standard, Preset::Small, Preset::Large];
        if profile.theme != Theme::Default {
            presets.push(Preset::Branded(profile.theme));
        }
        presets
            .iter()
            .map(|preset| self.encode_for(profile, preset))
            .collect()
    }
}

/// Append form-encoded `params` to `target_url` without re-serializing it:
/// the canonical URL text survives byte for byte ahead of the query.
fn with_query(target_url: &str, params: &[(String, String)]) -> RenderResult<String> {
    Url::parse(target_url)
        .map_err(|e| RenderError::EncodingFailed(format!("target '{}' is not a URL: {}", target_url, e)))?;
    if params.is_empty() {
        return Ok(target_url.to_string());
    }

    let (base, fragment) = match target_url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target_url, None),
    };
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut out = format!("{}{}{}", base, separator, query);
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    Ok(out)
}

/// Rasterize `payload` into a `style.size` square bitmap.
pub fn render_matrix(payload: &str, style: &Style) -> RenderResult<RgbImage> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), ERROR_CORRECTION)
        .map_err(|e| RenderError::EncodingFailed(format!("{} ({} bytes)", e, payload.len())))?;

    let modules = code.width() as u32;
    let total = modules + 2 * QUIET_ZONE_MODULES;
    if style.size < total {
        return Err(RenderError::EncodingFailed(format!(
            "{}px cannot hold {} modules",
            style.size, total
        )));
    }

    let colors = code.to_colors();
    let dark = style.dark.to_rgb();
    let light = style.light.to_rgb();
    Ok(RgbImage::from_fn(style.size, style.size, |x, y| {
        let mx = (x as u64 * total as u64 / style.size as u64) as u32;
        let my = (y as u64 * total as u64 / style.size as u64) as u32;
        let inside = QUIET_ZONE_MODULES..QUIET_ZONE_MODULES + modules;
        if inside.contains(&mx) && inside.contains(&my) {
            let idx = ((my - QUIET_ZONE_MODULES) * modules + (mx - QUIET_ZONE_MODULES)) as usize;
            if colors[idx] == Module::Dark {
                return dark;
            }
        }
        light
    }))
}
