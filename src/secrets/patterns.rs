//! Secret pattern definitions and the built-in pattern set.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tier of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Probably noise.
    Low,
    /// Worth a look.
    Medium,
    /// Very likely a credential.
    High,
    /// A credential format with no plausible innocent reading.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A named regular expression with a severity.
///
/// Also the shape of `[[scan.patterns]]` entries in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPattern {
    /// Human-readable name reported with each match.
    pub name: String,
    /// Regular expression, matched case-insensitively per line.
    pub regex: String,
    /// Severity of a match.
    pub severity: Severity,
}

impl SecretPattern {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: &str, regex: &str, severity: Severity) -> Self {
        Self {
            name: name.to_string(),
            regex: regex.to_string(),
            severity,
        }
    }
}

/// `(name, regex, severity)` for every built-in pattern.
const DEFAULT_PATTERNS: &[(&str, &str, Severity)] = &[
    (
        "Private key block",
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP |ENCRYPTED )?PRIVATE KEY(?: BLOCK)?-----",
        Severity::Critical,
    ),
    ("AWS access key id", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", Severity::Critical),
    (
        "AWS secret access key",
        r#"aws_secret_access_key\s*[=:]\s*['"]?[A-Za-z0-9/+=]{40}"#,
        Severity::Critical,
    ),
    ("GitHub token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b", Severity::Critical),
    (
        "GitHub fine-grained token",
        r"\bgithub_pat_[A-Za-z0-9_]{22,}\b",
        Severity::Critical,
    ),
    ("Stripe live key", r"\b[sr]k_live_[0-9a-z]{10,}\b", Severity::Critical),
    ("npm token", r"\bnpm_[A-Za-z0-9]{36}\b", Severity::Critical),
    ("Slack token", r"\bxox[abprs]-[0-9A-Za-z-]{10,}", Severity::High),
    ("Google API key", r"\bAIza[0-9A-Za-z_-]{35}\b", Severity::High),
    (
        "JSON web token",
        r"\beyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}",
        Severity::High,
    ),
    (
        "Generic API key",
        r#"\b(?:api[_-]?key|apikey|access[_-]?key)\s*[=:]\s*['"]?[A-Za-z0-9_\-]{8,}"#,
        Severity::High,
    ),
    (
        "Credentials in URL",
        r"\b[a-z][a-z0-9+.-]*://[^\s:/@]+:[^\s:/@]+@[^\s/]+",
        Severity::High,
    ),
    (
        "Generic secret assignment",
        r#"\b(?:secret|token|passwd|password|pwd)\s*[=:]\s*['"]?[^\s'"]{8,}"#,
        Severity::Medium,
    ),
    (
        "Bearer token",
        r"\bbearer\s+[A-Za-z0-9\-._~+/]{20,}=*",
        Severity::Medium,
    ),
    (
        "Exported credential variable",
        r"\bexport\s+[A-Z0-9_]*(?:TOKEN|SECRET|PASSWORD|API_KEY)[A-Z0-9_]*=",
        Severity::Low,
    ),
];

/// The built-in pattern set.
#[must_use]
pub fn default_patterns() -> Vec<SecretPattern> {
    DEFAULT_PATTERNS
        .iter()
        .map(|(name, regex, severity)| SecretPattern::new(name, regex, *severity))
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_patterns_compile() {
        for p in default_patterns() {
            assert!(regex::Regex::new(&p.regex).is_ok(), "bad regex for {}", p.name);
        }
    }

    #[test]
    fn default_pattern_names_are_unique() {
        let patterns = default_patterns();
        let names: HashSet<&str> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), patterns.len());
    }

    #[test]
    fn severity_orders_by_tier() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn pattern_deserializes_from_toml() {
        let p: SecretPattern =
            toml::from_str("name = \"t\"\nregex = \"itk_[a-z]+\"\nseverity = \"high\"\n").unwrap();
        assert_eq!(p.severity, Severity::High);
        assert_eq!(p, SecretPattern::new("t", "itk_[a-z]+", Severity::High));
    }
}
