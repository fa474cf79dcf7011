//! CardForge Core - Digital Identity Card Renderer
//!
//! Turns a profile projection into shareable artifacts:
//! 1. Encoded link images (matrix code of the canonical card URL)
//! 2. A composited branded card image
//! 3. An unsigned wallet-pass archive with an integrity manifest
//! 4. A portable contact record (vCard)
//!
//! Every renderer is synchronous and stateless. The only side effect is a
//! best-effort backup of encoded-link images.

pub mod avatar;
pub mod backup;
pub mod card;
pub mod color;
pub mod config;
pub mod encoder;
pub mod error;
pub mod fit;
pub mod hashing;
pub mod pass;
pub mod profile;
pub mod raster;
pub mod service;
pub mod text;
pub mod validation;
pub mod vcard;

pub use avatar::{AvatarChain, AvatarSource, EmbeddedPhoto, InitialsAvatar, RemotePhoto};
pub use backup::{BackupKey, BackupStore, FsBackupStore};
pub use card::{CardCompositor, CardPlan, CompositeCard, FieldClass};
pub use color::Color;
pub use config::{CardLayout, FontRange, Palette, PassSettings, RenderConfig};
pub use encoder::{EncodedLink, LinkEncoder, Preset, Style, Variant};
pub use error::{RenderError, RenderResult};
pub use fit::{fit, FitConstraints, FixedAdvance, FontWeight, TextMeasurer};
pub use hashing::{canonical_json, sha256_hex};
pub use pass::{verify_pass, PassArchive, PassDescriptor, PassPackager};
pub use profile::{Profile, SocialLinks, Theme};
pub use service::{Artifact, ArtifactRequest, CardService, Disposition};
pub use text::{SvgTextEngine, TextLine, TextPainter};
pub use validation::{ValidationResult, ValidationViolation, Validator, ViolationSeverity};
pub use vcard::{ContactEncoder, ContactRecord};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
