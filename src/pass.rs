//! Pass Packager - unsigned wallet-pass archive
//!
//! The archive holds `pass.json`, a fixed set of placeholder images and a
//! `manifest.json` mapping every other entry to its SHA-256 digest. There is
//! no signature entry, so device wallets will not install it.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::color::Color;
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::hashing::{canonical_json, digest_manifest, sha256_hex};
use crate::profile::Profile;
use crate::raster::{encode_png, fill_circle};

pub const DESCRIPTOR_ENTRY: &str = "pass.json";
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Placeholder assets: name, width, height.
const PLACEHOLDER_ASSETS: [(&str, u32, u32); 4] = [
    ("icon.png", 29, 29),
    ("icon@2x.png", 58, 58),
    ("logo.png", 160, 50),
    ("logo@2x.png", 320, 100),
];

const PLACEHOLDER_BACKGROUND: Color = Color::rgb(0x66, 0x7e, 0xea);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassField {
    pub key: String,
    pub label: String,
    pub value: String,
}

impl PassField {
    fn new(key: &str, label: &str, value: &str) -> Self {
        Self { key: key.to_string(), label: label.to_string(), value: value.to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroups {
    pub primary_fields: Vec<PassField>,
    pub secondary_fields: Vec<PassField>,
    pub auxiliary_fields: Vec<PassField>,
    pub back_fields: Vec<PassField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    pub format: String,
    pub message: String,
    pub message_encoding: String,
    pub alt_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassDescriptor {
    pub format_version: u32,
    pub pass_type_identifier: String,
    pub serial_number: String,
    pub team_identifier: String,
    pub organization_name: String,
    pub description: String,
    pub logo_text: String,
    pub foreground_color: String,
    pub background_color: String,
    pub label_color: String,
    pub generic: FieldGroups,
    pub barcodes: Vec<Barcode>,
    pub barcode: Barcode,
    pub expiration_date: String,
}

#[derive(Debug, Clone)]
pub struct PassArchive {
    pub descriptor: PassDescriptor,
    pub manifest: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
}

impl PassArchive {
    /// Write the archive to a scratch file. Removing it is the caller's job.
    pub fn write_to(&self, path: &Path) -> RenderResult<()> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }
}

pub struct PassPackager {
    config: Arc<RenderConfig>,
}

impl PassPackager {
    pub fn new(config: Arc<RenderConfig>) -> Self {
        Self { config }
    }

    pub fn descriptor(&self, profile: &Profile, now: DateTime<Utc>) -> PassDescriptor {
        let settings = &self.config.pass;
        let card_url = profile.canonical_url(self.config.base());

        let mut groups = FieldGroups::default();
        groups.primary_fields.push(PassField::new("name", "NAME", profile.label()));
        if let Some(title) = profile.title() {
            groups.secondary_fields.push(PassField::new("title", "TITLE", title));
        }
        if let Some(org) = profile.organization() {
            groups.secondary_fields.push(PassField::new("organization", "COMPANY", org));
        }
        if let Some(email) = profile.email() {
            groups.auxiliary_fields.push(PassField::new("email", "EMAIL", email));
        }
        if let Some(phone) = profile.phone().filter(|_| profile.show_phone) {
            groups.auxiliary_fields.push(PassField::new("phone", "PHONE", phone));
        }
        for (key, label, value) in [
            ("website", "Website", profile.website()),
            ("address", "Address", profile.address()),
            ("notes", "Notes", profile.notes()),
        ] {
            if let Some(value) = value {
                groups.back_fields.push(PassField::new(key, label, value));
            }
        }
        for (platform, url) in profile.social_links.iter() {
            groups.back_fields.push(PassField::new(platform, platform, url));
        }
        groups.back_fields.push(PassField::new("cardUrl", "Digital Card", &card_url));

        let barcode = Barcode {
            format: "PKBarcodeFormatQR".to_string(),
            message: card_url,
            message_encoding: "iso-8859-1".to_string(),
            alt_text: "Scan to view digital card".to_string(),
        };

        PassDescriptor {
            format_version: 1,
            pass_type_identifier: settings.pass_type_identifier.clone(),
            serial_number: Uuid::new_v4().to_string(),
            team_identifier: settings.team_identifier.clone(),
            organization_name: settings.organization_name.clone(),
            description: settings.description.clone(),
            logo_text: profile.label().to_string(),
            foreground_color: settings.foreground_color.css_rgb(),
            background_color: settings.background_color.css_rgb(),
            label_color: settings.label_color.css_rgb(),
            generic: groups,
            barcodes: vec![barcode.clone()],
            barcode,
            expiration_date: (now + Duration::days(settings.validity_days))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    #[instrument(skip_all, fields(identifier = %profile.identifier))]
    pub fn build_pass(&self, profile: &Profile) -> RenderResult<PassArchive> {
        self.build_pass_at(profile, Utc::now())
    }

    pub fn build_pass_at(&self, profile: &Profile, now: DateTime<Utc>) -> RenderResult<PassArchive> {
        let descriptor = self.descriptor(profile, now);
        let descriptor_bytes = canonical_json(&descriptor)
            .map_err(|e| RenderError::PackagingFailed(format!("descriptor: {}", e)))?
            .into_bytes();

        let mut entries: Vec<(String, Vec<u8>)> = vec![(DESCRIPTOR_ENTRY.to_string(), descriptor_bytes)];
        entries.extend(placeholder_assets()?);

        let manifest = digest_manifest(entries.iter().map(|(n, b)| (n.as_str(), b.as_slice())));
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| RenderError::PackagingFailed(format!("manifest: {}", e)))?;
        entries.push((MANIFEST_ENTRY.to_string(), manifest_bytes));

        let bytes = write_zip(&entries)?;
        debug!(entries = entries.len(), bytes = bytes.len(), "Pass packaged");
        Ok(PassArchive { descriptor, manifest, bytes })
    }
}

/// Solid brand-colored images standing in for real branding assets.
fn placeholder_assets() -> RenderResult<Vec<(String, Vec<u8>)>> {
    PLACEHOLDER_ASSETS
        .iter()
        .map(|&(name, w, h)| {
            let mut image = RgbaImage::from_pixel(w, h, PLACEHOLDER_BACKGROUND.to_rgba());
            let r = h as f32 * 0.3;
            fill_circle(&mut image, h as f32 / 2.0, h as f32 / 2.0, r, Color::WHITE);
            let png = encode_png(DynamicImage::ImageRgba8(image))
                .map_err(|e| RenderError::PackagingFailed(format!("{}: {}", name, e)))?;
            Ok((name.to_string(), png))
        })
        .collect()
}

fn write_zip(entries: &[(String, Vec<u8>)]) -> RenderResult<Vec<u8>> {
    let failed = |e: zip::result::ZipError| RenderError::PackagingFailed(e.to_string());
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options).map_err(failed)?;
        writer
            .write_all(bytes)
            .map_err(|e| RenderError::PackagingFailed(format!("{}: {}", name, e)))?;
    }
    Ok(writer.finish().map_err(failed)?.into_inner())
}

/// Re-open an archive and check the manifest against every entry.
///
/// Returns the manifest when its key set equals the set of non-manifest
/// entries and every recorded digest matches the entry's bytes.
pub fn verify_pass(bytes: &[u8]) -> RenderResult<BTreeMap<String, String>> {
    let failed = |msg: String| RenderError::PackagingFailed(msg);
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| failed(e.to_string()))?;

    let mut contents = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| failed(e.to_string()))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        contents.insert(file.name().to_string(), buf);
    }

    let manifest_bytes = contents
        .remove(MANIFEST_ENTRY)
        .ok_or_else(|| failed("archive has no manifest.json".into()))?;
    let manifest: BTreeMap<String, String> = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| failed(format!("manifest.json: {}", e)))?;

    let listed: BTreeSet<&String> = manifest.keys().collect();
    let present: BTreeSet<&String> = contents.keys().collect();
    if listed != present {
        return Err(failed(format!(
            "manifest lists {:?} but archive holds {:?}",
            listed, present
        )));
    }
    for (name, digest) in &manifest {
        if sha256_hex(&contents[name]) != *digest {
            return Err(failed(format!("digest mismatch for {}", name)));
        }
    }
    Ok(manifest)
}
