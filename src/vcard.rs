//! Contact Record Encoder - vCard 3.0 text
//!
//! Fixed field order, absent fields omitted as whole lines, CRLF line
//! endings, folding at 75 octets.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::profile::Profile;

const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub text: String,
}

impl ContactRecord {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split("\r\n").filter(|l| !l.is_empty())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

pub struct ContactEncoder {
    config: Arc<RenderConfig>,
    embed_photo: bool,
}

impl ContactEncoder {
    pub fn new(config: Arc<RenderConfig>) -> Self {
        Self { config, embed_photo: false }
    }

    /// Include the profile photo as an inline base64 `PHOTO` property.
    pub fn with_embedded_photo(mut self, embed: bool) -> Self {
        self.embed_photo = embed;
        self
    }

    pub fn encode(&self, profile: &Profile) -> ContactRecord {
        self.encode_at(profile, Utc::now())
    }

    pub fn encode_at(&self, profile: &Profile, now: DateTime<Utc>) -> ContactRecord {
        let card_url = profile.canonical_url(self.config.base());
        let mut out = VcardWriter::default();

        out.raw("BEGIN:VCARD");
        out.raw("VERSION:3.0");

        let name = profile.label();
        out.property("FN", &[name]);
        let (given, family) = split_name(name);
        out.property("N", &[family, given, "", "", ""]);

        if let Some(org) = profile.organization() {
            out.property("ORG", &[org]);
        }
        if let Some(title) = profile.title() {
            out.property("TITLE", &[title]);
        }
        if profile.show_phone {
            if let Some(phone) = profile.phone() {
                out.property("TEL;TYPE=WORK,VOICE", &[phone]);
            }
            if let Some(mobile) = profile.mobile() {
                out.property("TEL;TYPE=CELL", &[mobile]);
            }
        }
        if let Some(email) = profile.email() {
            out.property("EMAIL;TYPE=INTERNET", &[email]);
        }
        if let Some(website) = profile.website() {
            out.property("URL", &[website]);
        }
        if let Some(address) = profile.address() {
            out.property("ADR;TYPE=WORK", &["", "", address, "", "", "", ""]);
        }
        if let Some(notes) = profile.notes() {
            out.property("NOTE", &[notes]);
        }
        if self.embed_photo {
            if let Some(photo) = profile.photo() {
                let kind = photo_type(photo);
                out.raw(&format!("PHOTO;ENCODING=b;TYPE={}:{}", kind, STANDARD.encode(photo)));
            }
        }

        // Readers disagree on which extension they honor; emit both.
        out.property("X-DIGITAL-CARD", &[card_url.as_str()]);
        out.property("X-QR-URL", &[card_url.as_str()]);
        out.property("X-QRCODE", &[card_url.as_str()]);

        for (platform, url) in profile.social_links.iter() {
            out.property(&format!("X-SOCIALPROFILE;TYPE={}", platform), &[url]);
        }

        out.raw(&format!("REV:{}", now.format("%Y%m%dT%H%M%SZ")));
        out.raw("END:VCARD");
        ContactRecord { text: out.finish() }
    }
}

/// (given, family): the last word is the family name.
fn split_name(name: &str) -> (&str, &str) {
    let name = name.trim();
    match name.rsplit_once(char::is_whitespace) {
        Some((given, family)) => (given.trim(), family),
        None => ("", name),
    }
}

fn photo_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "PNG",
        Ok(image::ImageFormat::WebP) => "WEBP",
        _ => "JPEG",
    }
}

/// Escape a text value: backslash, comma, semicolon, newline.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Split a logical line into physical lines of at most 75 octets, never
/// inside a UTF-8 sequence. Continuations start with a single space.
pub fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if used + len > budget {
            out.push_str("\r\n ");
            // The leading space counts against the continuation line.
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(c);
        used += len;
    }
    out
}

#[derive(Default)]
struct VcardWriter {
    buf: String,
}

impl VcardWriter {
    fn raw(&mut self, line: &str) {
        self.buf.push_str(&fold_line(line));
        self.buf.push_str("\r\n");
    }

    /// Structured values are escaped per component and joined with `;`.
    fn property(&mut self, name: &str, components: &[&str]) {
        let value: Vec<String> = components.iter().map(|c| escape_value(c)).collect();
        self.raw(&format!("{}:{}", name, value.join(";")));
    }

    fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encoder() -> ContactEncoder {
        ContactEncoder::new(Arc::new(RenderConfig::default().with_base_url("https://x.io")))
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn full_record_in_order() {
        let mut p = Profile::new("jane-doe");
        p.display_name = Some("Jane Doe".into());
        p.organization = Some("Acme, Inc.".into());
        p.title = Some("CTO".into());
        p.phone = Some("+1 555 0100".into());
        p.email = Some("jane@x.com".into());
        p.social_links.github = Some("https://github.com/jane".into());

        let record = encoder().encode_at(&p, at());
        let lines: Vec<_> = record.lines().collect();
        assert_eq!(
            lines,
            vec![
                "BEGIN:VCARD",
                "VERSION:3.0",
                "FN:Jane Doe",
                "N:Doe;Jane;;;",
                "ORG:Acme\\, Inc.",
                "TITLE:CTO",
                "TEL;TYPE=WORK,VOICE:+1 555 0100",
                "EMAIL;TYPE=INTERNET:jane@x.com",
                "X-DIGITAL-CARD:https://x.io/card/jane-doe",
                "X-QR-URL:https://x.io/card/jane-doe",
                "X-QRCODE:https://x.io/card/jane-doe",
                "X-SOCIALPROFILE;TYPE=github:https://github.com/jane",
                "REV:20260301T093000Z",
                "END:VCARD",
            ]
        );
        assert!(record.text.ends_with("END:VCARD\r\n"));
    }

    #[test]
    fn hidden_phone_is_omitted() {
        let mut p = Profile::new("jane");
        p.phone = Some("123".into());
        p.mobile = Some("456".into());
        p.show_phone = false;
        let record = encoder().encode_at(&p, at());
        assert!(!record.lines().any(|l| l.starts_with("TEL")));
    }

    #[test]
    fn long_lines_fold_on_char_boundaries() {
        let line = format!("NOTE:{}", "é".repeat(60));
        let folded = fold_line(&line);
        for physical in folded.split("\r\n") {
            assert!(physical.len() <= MAX_LINE_OCTETS);
        }
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn escapes_structured_separators() {
        assert_eq!(escape_value("a;b,c\\d\ne"), "a\\;b\\,c\\\\d\\ne");
    }

    #[test]
    fn embedded_photo_is_opt_in() {
        let mut p = Profile::new("jane");
        p.photo = Some(vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert!(!encoder().encode_at(&p, at()).text.contains("PHOTO"));
        let record = encoder().with_embedded_photo(true).encode_at(&p, at());
        assert!(record.text.contains("PHOTO;ENCODING=b;TYPE=JPEG:/9j/4A=="));
    }
}
