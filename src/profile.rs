//! Profile Projection - the read-only view renderers consume
//!
//! Supplied by the surrounding application after access control. Blank
//! optional fields are treated as absent everywhere.

use serde::{Deserialize, Serialize};

use crate::hashing::{canonical_json, sha256_hex};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub identifier: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_true")]
    pub show_phone: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, with = "base64_bytes")]
    pub photo: Option<Vec<u8>>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

fn default_true() -> bool { true }

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Profile {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            show_phone: true,
            ..Default::default()
        }
    }

    /// Human-chosen slug when set, otherwise the opaque unique id.
    pub fn preferred_identifier(slug: Option<&str>, id: &str) -> String {
        match slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_string(),
            None => id.to_string(),
        }
    }

    /// `<base>/card/<identifier>`
    pub fn canonical_url(&self, base_url: &str) -> String {
        format!("{}/card/{}", base_url.trim().trim_end_matches('/'), self.identifier)
    }

    pub fn display_name(&self) -> Option<&str> { present(&self.display_name) }
    pub fn title(&self) -> Option<&str> { present(&self.title) }
    pub fn organization(&self) -> Option<&str> { present(&self.organization) }
    pub fn email(&self) -> Option<&str> { present(&self.email) }
    pub fn phone(&self) -> Option<&str> { present(&self.phone) }
    pub fn mobile(&self) -> Option<&str> { present(&self.mobile) }
    pub fn website(&self) -> Option<&str> { present(&self.website) }
    pub fn photo_url(&self) -> Option<&str> { present(&self.photo_url) }
    pub fn notes(&self) -> Option<&str> { present(&self.notes) }
    pub fn address(&self) -> Option<&str> { present(&self.address) }

    pub fn photo(&self) -> Option<&[u8]> {
        self.photo.as_deref().filter(|b| !b.is_empty())
    }

    /// Name to show on artifacts, falling back to the identifier.
    pub fn label(&self) -> &str {
        self.display_name().unwrap_or(&self.identifier)
    }

    /// Up to two uppercase initials from the display name.
    pub fn initials(&self) -> String {
        let from_name: String = self
            .display_name()
            .unwrap_or("")
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();
        if !from_name.is_empty() {
            return from_name;
        }
        self.identifier
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Stable digest of every rendered input, for memoization keys.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        Ok(sha256_hex(canonical_json(self)?.as_bytes()))
    }
}

/// Palette selector. Unknown tags deserialize to `Default`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Blue,
    Green,
    Purple,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Dark => "dark",
            Theme::Blue => "blue",
            Theme::Green => "green",
            Theme::Purple => "purple",
        }
    }
}

impl From<&str> for Theme {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Theme::Dark,
            "blue" => Theme::Blue,
            "green" => Theme::Green,
            "purple" => Theme::Purple,
            _ => Theme::Default,
        }
    }
}

impl From<String> for Theme {
    fn from(s: String) -> Self {
        Theme::from(s.as_str())
    }
}

impl From<Theme> for String {
    fn from(t: Theme) -> Self {
        t.as_str().to_string()
    }
}

/// Social profile URLs under a fixed set of platform keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub youtube: Option<String>,
}

impl SocialLinks {
    /// Present links in fixed platform order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("linkedin", &self.linkedin),
            ("twitter", &self.twitter),
            ("github", &self.github),
            ("instagram", &self.instagram),
            ("facebook", &self.facebook),
            ("youtube", &self.youtube),
        ]
        .into_iter()
        .filter_map(|(platform, url)| present(url).map(|u| (platform, u)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        match encoded.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => STANDARD
                .decode(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_absent() {
        let mut p = Profile::new("jane");
        p.title = Some("   ".into());
        p.email = Some("jane@x.com".into());
        assert_eq!(p.title(), None);
        assert_eq!(p.email(), Some("jane@x.com"));
    }

    #[test]
    fn unknown_theme_falls_back() {
        let p: Profile = serde_json::from_str(r#"{"identifier": "a", "theme": "neon"}"#).unwrap();
        assert_eq!(p.theme, Theme::Default);
        let p: Profile = serde_json::from_str(r#"{"identifier": "a", "theme": "Blue"}"#).unwrap();
        assert_eq!(p.theme, Theme::Blue);
    }

    #[test]
    fn initials_from_name_or_identifier() {
        let mut p = Profile::new("jane-doe");
        p.display_name = Some("jane van doe".into());
        assert_eq!(p.initials(), "JV");
        p.display_name = Some("Cher".into());
        assert_eq!(p.initials(), "C");
        p.display_name = None;
        assert_eq!(p.initials(), "J");
    }

    #[test]
    fn canonical_url_trims_trailing_slash() {
        let p = Profile::new("jane-doe");
        assert_eq!(p.canonical_url("https://x.io/"), "https://x.io/card/jane-doe");
    }

    #[test]
    fn preferred_identifier_prefers_slug() {
        assert_eq!(Profile::preferred_identifier(Some("jane"), "64f0c1"), "jane");
        assert_eq!(Profile::preferred_identifier(Some(" "), "64f0c1"), "64f0c1");
        assert_eq!(Profile::preferred_identifier(None, "64f0c1"), "64f0c1");
    }

    #[test]
    fn social_links_keep_platform_order() {
        let links = SocialLinks {
            github: Some("https://github.com/jane".into()),
            linkedin: Some("https://linkedin.com/in/jane".into()),
            twitter: Some("".into()),
            ..Default::default()
        };
        let platforms: Vec<_> = links.iter().map(|(p, _)| p).collect();
        assert_eq!(platforms, vec!["linkedin", "github"]);
    }

    #[test]
    fn photo_round_trips_as_base64() {
        let mut p = Profile::new("a");
        p.photo = Some(vec![1, 2, 3]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["photo"], "AQID");
        let back: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(back.photo(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn content_hash_tracks_fields() {
        let a = Profile::new("a");
        let mut b = Profile::new("a");
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        b.title = Some("CTO".into());
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }
}
