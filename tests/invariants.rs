//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use proptest::prelude::*;
use qrcode::{Color as Module, QrCode};

use cardforge_core::{
    encoder::{ERROR_CORRECTION, QUIET_ZONE_MODULES},
    fit, verify_pass, ArtifactRequest, AvatarChain, CardService, Disposition, EmbeddedPhoto,
    FitConstraints, FixedAdvance, FontRange, FontWeight, InitialsAvatar, Preset, Profile,
    RenderConfig, RenderError, RenderResult, TextLine, TextMeasurer, TextPainter, Theme, Variant,
};

/// Fixed-advance measurer that records every painted string.
#[derive(Default)]
struct RecordingPainter {
    painted: Mutex<Vec<String>>,
}

impl TextMeasurer for RecordingPainter {
    fn measure(&self, text: &str, size: u32, weight: FontWeight) -> RenderResult<f32> {
        FixedAdvance::default().measure(text, size, weight)
    }
}

impl TextPainter for RecordingPainter {
    fn paint(&self, _canvas: &mut RgbaImage, lines: &[TextLine]) -> RenderResult<()> {
        let mut painted = self.painted.lock().unwrap();
        painted.extend(lines.iter().map(|l| l.text.clone()));
        Ok(())
    }
}

fn create_service(base_url: &str) -> (CardService, Arc<RecordingPainter>) {
    let config = Arc::new(RenderConfig::default().with_base_url(base_url));
    let recorder = Arc::new(RecordingPainter::default());
    let painter: Arc<dyn TextPainter> = recorder.clone();
    let avatars = AvatarChain::new(
        vec![Box::new(EmbeddedPhoto)],
        InitialsAvatar::new(painter.clone(), config.clone()),
    );
    let service = CardService::with_parts(config, painter, avatars).unwrap();
    (service, recorder)
}

fn jane() -> Profile {
    let mut p = Profile::new("jane-doe");
    p.display_name = Some("Jane Doe".into());
    p.email = Some("jane@x.com".into());
    p
}

#[test]
fn invariant_standard_code_encodes_canonical_url() {
    let (service, _) = create_service("https://x.io");
    let link = service.encoder().encode_for(&jane(), &Preset::Standard).unwrap();
    assert_eq!(link.target_url, "https://x.io/card/jane-doe");

    let image = image::load_from_memory(&link.png).unwrap().to_luma8();
    assert_eq!(image.dimensions(), (400, 400));

    // Sample the center of every module and compare to a fresh encoding of
    // the canonical URL.
    let expected = QrCode::with_error_correction_level("https://x.io/card/jane-doe", ERROR_CORRECTION).unwrap();
    let modules = expected.width() as u32;
    let total = modules + 2 * QUIET_ZONE_MODULES;
    let colors = expected.to_colors();
    for my in 0..modules {
        for mx in 0..modules {
            let px = ((mx + QUIET_ZONE_MODULES) as f32 + 0.5) * 400.0 / total as f32;
            let py = ((my + QUIET_ZONE_MODULES) as f32 + 0.5) * 400.0 / total as f32;
            let dark = image.get_pixel(px as u32, py as u32)[0] < 128;
            let want = colors[(my * modules + mx) as usize] == Module::Dark;
            assert_eq!(dark, want, "module ({}, {})", mx, my);
        }
    }
}

#[test]
fn invariant_generate_all_variants_are_distinct() {
    let (service, _) = create_service("https://x.io");

    let plain = service.generate_all(&jane()).unwrap();
    let variants: Vec<_> = plain.iter().map(|l| l.variant).collect();
    assert_eq!(variants, vec![Variant::Standard, Variant::Small, Variant::Large]);

    let mut themed = jane();
    themed.theme = Theme::Blue;
    let links = service.generate_all(&themed).unwrap();
    assert_eq!(links.len(), 4);
    let unique: HashSet<_> = links.iter().map(|l| l.variant).collect();
    assert_eq!(unique.len(), links.len());
    assert!(links.iter().all(|l| l.target_url == "https://x.io/card/jane-doe"));
}

#[test]
fn invariant_render_calls_validate() {
    let (service, _) = create_service("https://x.io");
    let bad = Profile::new("has space/slash");

    for request in [
        ArtifactRequest::Link(Preset::Standard),
        ArtifactRequest::Card,
        ArtifactRequest::Pass,
        ArtifactRequest::Contact,
    ] {
        let err = service.render(&bad, &request, Disposition::Inline).unwrap_err();
        assert!(matches!(err, RenderError::InvalidProfile(_)));
        assert_eq!(err.status_code(), 400);
    }
    assert!(service.generate_all(&bad).is_err());
}

#[test]
fn invariant_pass_manifest_covers_every_entry() {
    let (service, _) = create_service("https://x.io");
    let archive = service.packager().build_pass(&jane()).unwrap();

    let verified = verify_pass(&archive.bytes).unwrap();
    assert_eq!(verified, archive.manifest);
    assert!(verified.contains_key("pass.json"));
    assert!(!verified.contains_key("manifest.json"));
    assert_eq!(archive.descriptor.barcode.message, "https://x.io/card/jane-doe");
}

#[test]
fn invariant_absent_fields_are_omitted() {
    let (service, _) = create_service("https://x.io");
    let mut profile = jane();
    profile.title = Some("".into());
    profile.theme = Theme::Blue;

    assert_eq!(service.generate_all(&profile).unwrap().len(), 4);

    let record = service.contacts().encode(&profile);
    assert!(!record.lines().any(|l| l.starts_with("TITLE")));
    assert!(!record.lines().any(|l| l.starts_with("ORG")));

    let plan = service.compositor().layout(&profile).unwrap();
    let texts: Vec<_> = plan.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["Jane Doe", "jane@x.com"]);

    // The email takes the row the title would have used.
    let mut titled = profile.clone();
    titled.title = Some("CTO".into());
    let full = service.compositor().layout(&titled).unwrap();
    assert_eq!(full.lines[1].text, "CTO");
    assert_eq!(plan.lines[1].baseline_y, full.lines[1].baseline_y);
    assert!(full.lines[2].baseline_y > plan.lines[1].baseline_y);
}

#[test]
fn invariant_card_text_is_drawn_or_render_fails() {
    let service = CardService::new(RenderConfig::default().with_base_url("https://x.io")).unwrap();
    let result = service.compositor().compose(&jane());

    let fonts = cardforge_core::SvgTextEngine::new(None, &service.config().card.font_family);
    if fonts.face_count() == 0 {
        assert!(matches!(result, Err(RenderError::CompositingFailed(_))));
        return;
    }

    let card = result.unwrap();
    let canvas = image::load_from_memory(&card.png).unwrap().to_rgba8();
    let plan = service.compositor().layout(&jane()).unwrap();
    let name = &plan.lines[0];
    let top = name.baseline_y as u32 - name.size;
    let bottom = name.baseline_y as u32 + name.size / 4;
    let panel = plan.details_panel;
    let white = image::Rgba([255, 255, 255, 255]);
    let inked = (top..bottom)
        .flat_map(|y| (panel.x + 30..panel.right() - 30).map(move |x| (x, y)))
        .filter(|&(x, y)| *canvas.get_pixel(x, y) != white)
        .count();
    assert!(inked > 0, "name row is blank");
}

#[test]
fn invariant_dot_segment_identifiers_are_rejected() {
    let (service, _) = create_service("https://x.io");
    for identifier in [".", "..", "..."] {
        let result = service.validate(&Profile::new(identifier));
        assert!(!result.valid, "{} accepted", identifier);
        let err = service
            .render(&Profile::new(identifier), &ArtifactRequest::Link(Preset::Standard), Disposition::Inline)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidProfile(_)));
    }
}

#[test]
fn invariant_corrupt_photo_falls_back_to_initials() {
    let (service, recorder) = create_service("https://x.io");
    let mut profile = jane();
    profile.photo = Some(b"definitely not an image".to_vec());

    let card = service.compositor().compose(&profile).unwrap();
    assert_eq!(card.avatar_source, "initials");
    assert_eq!((card.width, card.height), (850, 750));
    assert!(recorder.painted.lock().unwrap().iter().any(|t| t == "JD"));
}

#[test]
fn invariant_base_url_drives_every_link() {
    let profile = jane();
    for base in ["https://a.example", "https://b.example/"] {
        let (service, _) = create_service(base);
        let expected = format!("{}/card/jane-doe", base.trim_end_matches('/'));

        let link = service.encoder().encode_for(&profile, &Preset::Standard).unwrap();
        assert_eq!(link.target_url, expected);
        assert_eq!(service.compositor().layout(&profile).unwrap().target_url, expected);
        let pass = service.packager().build_pass(&profile).unwrap();
        assert_eq!(pass.descriptor.barcode.message, expected);
        let record = service.contacts().encode(&profile);
        assert!(record.lines().any(|l| l == format!("X-DIGITAL-CARD:{}", expected)));
    }
}

proptest! {
    #[test]
    fn invariant_fit_respects_bounds(
        text in "[A-Za-z ]{0,80}",
        min in 8u32..20,
        span in 0u32..30,
        max_width in 20f32..800.0,
    ) {
        let range = FontRange { min_size: min, max_size: min + span };
        let constraints = FitConstraints::new(range, max_width, FontWeight::Regular);
        let measurer = FixedAdvance::default();
        let size = fit(&text, &constraints, &measurer).unwrap();

        prop_assert!(size >= range.min_size && size <= range.max_size);
        let width = measurer.measure(&text, size, FontWeight::Regular).unwrap();
        prop_assert!(width <= max_width || size == range.min_size);
        prop_assert_eq!(fit(&text, &constraints, &measurer).unwrap(), size);
    }
}
