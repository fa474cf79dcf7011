//! Card Service - single entry point for every artifact
//!
//! `render` ALWAYS validates the profile before running a renderer. No
//! bypass: an invalid identifier never reaches an encoder.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::avatar::AvatarChain;
use crate::backup::FsBackupStore;
use crate::card::CardCompositor;
use crate::config::RenderConfig;
use crate::encoder::{EncodedLink, LinkEncoder, Preset};
use crate::error::{RenderError, RenderResult};
use crate::pass::PassPackager;
use crate::profile::Profile;
use crate::text::{SvgTextEngine, TextPainter};
use crate::validation::{ValidationResult, Validator};
use crate::vcard::ContactEncoder;

pub const CONTENT_TYPE_PNG: &str = "image/png";
pub const CONTENT_TYPE_PASS: &str = "application/vnd.apple.pkpass";
pub const CONTENT_TYPE_VCARD: &str = "text/vcard";

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactRequest {
    Link(Preset),
    Card,
    Pass,
    Contact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Bytes plus the headers the HTTP boundary needs to stream them.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub content_type: &'static str,
    pub file_name: String,
    pub disposition: Disposition,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn content_disposition(&self) -> String {
        let kind = match self.disposition {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        format!("{}; filename=\"{}\"", kind, self.file_name)
    }
}

/// File-name stem from the display name: alphanumerics, `-` and `_` kept,
/// whitespace runs become `_`, everything else dropped.
pub fn file_stem(profile: &Profile) -> String {
    let mut stem = String::new();
    let mut pending_gap = false;
    for c in profile.display_name().unwrap_or("").chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            if pending_gap && !stem.is_empty() {
                stem.push('_');
            }
            pending_gap = false;
            stem.push(c);
        } else if c.is_whitespace() {
            pending_gap = true;
        }
    }
    if stem.is_empty() {
        profile.identifier.clone()
    } else {
        stem
    }
}

pub struct CardService {
    config: Arc<RenderConfig>,
    validator: Validator,
    encoder: LinkEncoder,
    compositor: CardCompositor,
    packager: PassPackager,
    contacts: ContactEncoder,
}

impl CardService {
    /// Production wiring: system fonts, full avatar chain, optional
    /// filesystem backup.
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let config = Arc::new(config);
        let painter: Arc<dyn TextPainter> = Arc::new(SvgTextEngine::new(
            config.font_dir.as_deref(),
            &config.card.font_family,
        ));
        let avatars = AvatarChain::standard(config.clone(), painter.clone())?;
        Self::with_parts(config, painter, avatars)
    }

    pub fn with_parts(
        config: Arc<RenderConfig>,
        painter: Arc<dyn TextPainter>,
        avatars: AvatarChain,
    ) -> RenderResult<Self> {
        config.validate()?;
        let mut encoder = LinkEncoder::new(config.clone());
        if let Some(dir) = &config.backup_dir {
            encoder = encoder.with_backup(Arc::new(FsBackupStore::new(dir.clone())));
        }
        Ok(Self {
            compositor: CardCompositor::new(config.clone(), painter, avatars)?,
            packager: PassPackager::new(config.clone()),
            contacts: ContactEncoder::new(config.clone()),
            validator: Validator::new(),
            encoder,
            config,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn validate(&self, profile: &Profile) -> ValidationResult {
        self.validator.validate(profile)
    }

    fn ensure_valid(&self, profile: &Profile) -> RenderResult<()> {
        let result = self.validate(profile);
        if result.valid {
            Ok(())
        } else {
            Err(RenderError::InvalidProfile(result.summary()))
        }
    }

    pub fn render(
        &self,
        profile: &Profile,
        request: &ArtifactRequest,
        disposition: Disposition,
    ) -> RenderResult<Artifact> {
        // MANDATORY: validation precedes every renderer.
        self.ensure_valid(profile)?;

        let stem = file_stem(profile);
        let (content_type, file_name, bytes) = match request {
            ArtifactRequest::Link(preset) => {
                let link = self.encoder.encode_for(profile, preset)?;
                (CONTENT_TYPE_PNG, format!("{}-{}-qr.png", stem, link.variant), link.png)
            }
            ArtifactRequest::Card => {
                let card = self.compositor.compose(profile)?;
                (CONTENT_TYPE_PNG, format!("{}-card.png", stem), card.png)
            }
            ArtifactRequest::Pass => {
                let pass = self.packager.build_pass(profile)?;
                (CONTENT_TYPE_PASS, format!("{}.pkpass", stem), pass.bytes)
            }
            ArtifactRequest::Contact => {
                let record = self.contacts.encode(profile);
                (CONTENT_TYPE_VCARD, format!("{}.vcf", stem), record.text.into_bytes())
            }
        };

        info!(identifier = %profile.identifier, content_type, bytes = bytes.len(), "Artifact rendered");
        Ok(Artifact { content_type, file_name, disposition, bytes })
    }

    pub fn generate_all(&self, profile: &Profile) -> RenderResult<Vec<EncodedLink>> {
        self.ensure_valid(profile)?;
        self.encoder.generate_all(profile)
    }

    pub fn encoder(&self) -> &LinkEncoder {
        &self.encoder
    }

    pub fn compositor(&self) -> &CardCompositor {
        &self.compositor
    }

    pub fn packager(&self) -> &PassPackager {
        &self.packager
    }

    pub fn contacts(&self) -> &ContactEncoder {
        &self.contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_sanitizes() {
        let mut p = Profile::new("jane-doe");
        p.display_name = Some("  Jane  O'Doe / CEO ".into());
        assert_eq!(file_stem(&p), "Jane_ODoe_CEO");
        p.display_name = None;
        assert_eq!(file_stem(&p), "jane-doe");
    }

    #[test]
    fn content_disposition_header() {
        let artifact = Artifact {
            content_type: CONTENT_TYPE_VCARD,
            file_name: "Jane.vcf".into(),
            disposition: Disposition::Attachment,
            bytes: vec![],
        };
        assert_eq!(artifact.content_disposition(), "attachment; filename=\"Jane.vcf\"");
    }
}
