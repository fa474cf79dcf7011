//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: errors block rendering, warnings are recorded only.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::profile::Profile;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub field: String,
    pub severity: ViolationSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub identifier: String,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// `rule: message` pairs joined for error reporting.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ProfileRule {
    fn name(&self) -> &'static str;
    fn validate(&self, profile: &Profile) -> Vec<ValidationViolation>;

    fn violation(&self, field: &str, severity: ViolationSeverity, message: String) -> ValidationViolation {
        ValidationViolation {
            rule: self.name().to_string(),
            field: field.to_string(),
            severity,
            message,
        }
    }
}

// --- Concrete Rules ---

/// Identifier must be non-empty and usable verbatim as a URL path segment.
pub struct IdentifierRule;

impl IdentifierRule {
    /// Unreserved characters only, and never a dot segment: `<base>/card/..`
    /// would resolve to a different page.
    pub fn is_url_safe(identifier: &str) -> bool {
        !identifier.is_empty()
            && !identifier.chars().all(|c| c == '.')
            && identifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    }
}

impl ProfileRule for IdentifierRule {
    fn name(&self) -> &'static str { "identifier" }

    fn validate(&self, profile: &Profile) -> Vec<ValidationViolation> {
        if profile.identifier.is_empty() {
            return vec![self.violation("identifier", ViolationSeverity::Error, "identifier is empty".into())];
        }
        if !Self::is_url_safe(&profile.identifier) {
            return vec![self.violation(
                "identifier",
                ViolationSeverity::Error,
                format!("'{}' contains characters outside [A-Za-z0-9._~-]", profile.identifier),
            )];
        }
        vec![]
    }
}

pub struct EmailRule;

impl ProfileRule for EmailRule {
    fn name(&self) -> &'static str { "email" }

    fn validate(&self, profile: &Profile) -> Vec<ValidationViolation> {
        let Some(email) = profile.email() else {
            return vec![];
        };
        let well_formed = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
            }
            None => false,
        };
        if well_formed {
            vec![]
        } else {
            vec![self.violation("email", ViolationSeverity::Warning, format!("'{}' does not look like an address", email))]
        }
    }
}

/// Website and photo URL must parse as http(s) when present.
pub struct UrlRule;

impl UrlRule {
    fn check(&self, field: &str, value: Option<&str>, severity: ViolationSeverity) -> Option<ValidationViolation> {
        let value = value?;
        match Url::parse(value) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => None,
            Ok(url) => Some(self.violation(field, severity, format!("unsupported scheme '{}'", url.scheme()))),
            Err(e) => Some(self.violation(field, severity, format!("'{}' is not a URL: {}", value, e))),
        }
    }
}

impl ProfileRule for UrlRule {
    fn name(&self) -> &'static str { "url" }

    fn validate(&self, profile: &Profile) -> Vec<ValidationViolation> {
        // A bad photo URL only costs the photo; the avatar chain recovers.
        [
            self.check("website", profile.website(), ViolationSeverity::Warning),
            self.check("photoUrl", profile.photo_url(), ViolationSeverity::Warning),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ProfileRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(IdentifierRule),
                Box::new(EmailRule),
                Box::new(UrlRule),
            ],
        }
    }

    pub fn validate(&self, profile: &Profile) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(profile))
            .collect();

        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        ValidationResult {
            valid,
            identifier: profile.identifier.clone(),
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifier_blocks() {
        let result = Validator::new().validate(&Profile::new(""));
        assert!(!result.valid);
        assert!(result.summary().contains("identifier"));
    }

    #[test]
    fn identifier_must_be_url_safe() {
        assert!(IdentifierRule::is_url_safe("jane-doe_2.x~"));
        assert!(!IdentifierRule::is_url_safe("jane doe"));
        assert!(!IdentifierRule::is_url_safe("jane/doe"));
        assert!(!Validator::new().validate(&Profile::new("jäne")).valid);
    }

    #[test]
    fn dot_segments_are_not_identifiers() {
        for id in [".", "..", "...."] {
            assert!(!IdentifierRule::is_url_safe(id), "{}", id);
            assert!(!Validator::new().validate(&Profile::new(id)).valid);
        }
        assert!(IdentifierRule::is_url_safe(".jane"));
        assert!(IdentifierRule::is_url_safe("jane.doe"));
    }

    #[test]
    fn bad_contact_fields_only_warn() {
        let mut p = Profile::new("jane");
        p.email = Some("not-an-email".into());
        p.website = Some("ftp://example.com".into());
        let result = Validator::new().validate(&p);
        assert!(result.valid);
        assert_eq!(result.violations.len(), 2);
        assert!(!result.has_errors());
    }
}
