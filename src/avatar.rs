//! Avatar sources tried in order: embedded photo, photo URL, initials.
//!
//! A source answers `Ok(None)` when it does not apply to the profile and
//! `Err(AssetLoadFailed)` when it applies but cannot produce an image. Both
//! fall through to the next source. Initials always succeed.

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::color::Color;
use crate::config::{FontRange, RenderConfig};
use crate::error::{RenderError, RenderResult};
use crate::fit::{fit, FitConstraints, FontWeight};
use crate::profile::Profile;
use crate::raster::{fill_circle, mask_circle};
use crate::text::{TextLine, TextPainter};

pub trait AvatarSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn load(&self, profile: &Profile, diameter: u32) -> RenderResult<Option<RgbaImage>>;
}

/// Crop to a centered square, scale to `diameter`, clip to a circle.
pub fn circular(image: &DynamicImage, diameter: u32) -> RgbaImage {
    let mut square = image
        .resize_to_fill(diameter, diameter, FilterType::Lanczos3)
        .to_rgba8();
    mask_circle(&mut square);
    square
}

fn decode(bytes: &[u8], origin: &str) -> RenderResult<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| RenderError::AssetLoadFailed(format!("{}: {}", origin, e)))
}

/// Photo bytes carried on the profile.
pub struct EmbeddedPhoto;

impl AvatarSource for EmbeddedPhoto {
    fn name(&self) -> &'static str { "embedded" }

    fn load(&self, profile: &Profile, diameter: u32) -> RenderResult<Option<RgbaImage>> {
        let Some(bytes) = profile.photo() else {
            return Ok(None);
        };
        let image = decode(bytes, "embedded photo")?;
        Ok(Some(circular(&image, diameter)))
    }
}

/// Photo fetched from the profile's photo URL.
pub struct RemotePhoto {
    client: reqwest::blocking::Client,
    max_bytes: usize,
}

impl RemotePhoto {
    pub fn new(timeout: Duration, max_bytes: usize) -> RenderResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    pub fn from_config(config: &RenderConfig) -> RenderResult<Self> {
        Self::new(Duration::from_secs(config.photo_fetch_timeout_secs), config.max_photo_bytes)
    }

    fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
        let failed = |e: reqwest::Error| RenderError::AssetLoadFailed(format!("{}: {}", url, e));
        let response = self.client.get(url).send().map_err(failed)?;
        let response = response.error_for_status().map_err(failed)?;
        let declared = response.content_length();
        read_capped(response, declared, self.max_bytes, url)
    }
}

/// Read at most `max_bytes` from `body`. A declared length over the cap is
/// rejected before any byte is read.
fn read_capped<R: Read>(body: R, declared: Option<u64>, max_bytes: usize, origin: &str) -> RenderResult<Vec<u8>> {
    let too_large = |len: u64| {
        RenderError::AssetLoadFailed(format!("{}: {} bytes exceeds limit of {}", origin, len, max_bytes))
    };
    if let Some(len) = declared.filter(|&len| len > max_bytes as u64) {
        return Err(too_large(len));
    }
    let mut bytes = Vec::new();
    body.take(max_bytes as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| RenderError::AssetLoadFailed(format!("{}: {}", origin, e)))?;
    if bytes.len() > max_bytes {
        return Err(too_large(bytes.len() as u64));
    }
    Ok(bytes)
}

impl AvatarSource for RemotePhoto {
    fn name(&self) -> &'static str { "remote" }

    fn load(&self, profile: &Profile, diameter: u32) -> RenderResult<Option<RgbaImage>> {
        let Some(url) = profile.photo_url() else {
            return Ok(None);
        };
        let bytes = self.fetch(url)?;
        let image = decode(&bytes, url)?;
        Ok(Some(circular(&image, diameter)))
    }
}

/// Initials in white on the theme's accent circle.
pub struct InitialsAvatar {
    painter: Arc<dyn TextPainter>,
    config: Arc<RenderConfig>,
}

impl InitialsAvatar {
    pub fn new(painter: Arc<dyn TextPainter>, config: Arc<RenderConfig>) -> Self {
        Self { painter, config }
    }

    pub fn render(&self, profile: &Profile, diameter: u32) -> RgbaImage {
        let accent = self.config.palettes.get(profile.theme).accent;
        let mut image = RgbaImage::new(diameter, diameter);
        let r = diameter as f32 / 2.0;
        fill_circle(&mut image, r, r, r, accent);

        if let Err(e) = self.draw_initials(&mut image, &profile.initials()) {
            warn!(error = %e, "Initials text failed; using plain circle");
        }
        image
    }

    fn draw_initials(&self, image: &mut RgbaImage, initials: &str) -> RenderResult<()> {
        let diameter = image.width();
        let r = diameter as f32 / 2.0;
        let range = FontRange { min_size: (diameter / 6).max(1), max_size: (diameter * 2 / 5).max(1) };
        let constraints = FitConstraints::new(range, diameter as f32 * 0.7, FontWeight::Bold);
        let size = fit(initials, &constraints, self.painter.as_ref())?;
        let line = TextLine {
            text: initials.to_string(),
            size,
            weight: FontWeight::Bold,
            color: Color::WHITE,
            center_x: r,
            // Visually centered: baseline sits about a third of the size below center.
            baseline_y: r + size as f32 * 0.35,
        };
        self.painter.paint(image, std::slice::from_ref(&line))
    }
}

/// Ordered sources with an infallible initials fallback.
pub struct AvatarChain {
    sources: Vec<Box<dyn AvatarSource>>,
    fallback: InitialsAvatar,
}

impl AvatarChain {
    pub fn new(sources: Vec<Box<dyn AvatarSource>>, fallback: InitialsAvatar) -> Self {
        Self { sources, fallback }
    }

    /// Embedded bytes, then remote URL, then initials.
    pub fn standard(config: Arc<RenderConfig>, painter: Arc<dyn TextPainter>) -> RenderResult<Self> {
        let sources: Vec<Box<dyn AvatarSource>> = vec![
            Box::new(EmbeddedPhoto),
            Box::new(RemotePhoto::from_config(&config)?),
        ];
        Ok(Self::new(sources, InitialsAvatar::new(painter, config)))
    }

    /// The avatar image and the name of the source that produced it.
    pub fn resolve(&self, profile: &Profile, diameter: u32) -> (RgbaImage, &'static str) {
        for source in &self.sources {
            match source.load(profile, diameter) {
                Ok(Some(image)) => {
                    debug!(source = source.name(), identifier = %profile.identifier, "Avatar resolved");
                    return (image, source.name());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source = source.name(), identifier = %profile.identifier, error = %e, "Avatar source failed; falling through");
                }
            }
        }
        (self.fallback.render(profile, diameter), "initials")
    }
}
