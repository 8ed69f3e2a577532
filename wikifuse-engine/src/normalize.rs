//! Text normalization and placeholder exclusion
//!
//! Shared by the similarity scorer, the merger and the detector so that every
//! comparison sees the same canonical text.

use crate::config::{FusionConfig, NormalizationFlags};
use crate::error::{FusionError, FusionResult};
use crate::types::is_blank;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*://").expect("scheme regex"));

const HONORIFICS: [&str; 7] = ["mr", "mrs", "ms", "dr", "prof", "sir", "madam"];

/// Normalizes text and recognizes placeholder values
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    flags: NormalizationFlags,
    exclusions: Vec<Regex>,
}

impl TextNormalizer {
    /// Compile the configured exclusion patterns
    ///
    /// Patterns match case-insensitively against the trimmed value and are
    /// anchored at its start.
    pub fn new(config: &FusionConfig) -> FusionResult<Self> {
        let exclusions = config
            .exclusion_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i)^(?:{})", pattern)).map_err(|source| {
                    FusionError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<FusionResult<Vec<_>>>()?;

        Ok(Self {
            flags: config.normalization.clone(),
            exclusions,
        })
    }

    /// Canonical comparison form of `text`
    pub fn normalize(&self, text: &str) -> String {
        let mut normalized = if self.flags.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        if self.flags.strip_punctuation {
            normalized = PUNCTUATION.replace_all(&normalized, "").into_owned();
        }

        if self.flags.collapse_whitespace {
            normalized = WHITESPACE.replace_all(&normalized, " ").trim().to_string();
        }

        if self.flags.strip_honorifics {
            normalized = normalized
                .split_whitespace()
                .filter(|word| {
                    let bare = word.trim_end_matches('.').to_lowercase();
                    !HONORIFICS.contains(&bare.as_str())
                })
                .collect::<Vec<_>>()
                .join(" ");
        }

        normalized
    }

    /// True when `text` is a placeholder such as "unknown" or "n/a"
    pub fn is_excluded(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.exclusions.iter().any(|re| re.is_match(trimmed))
    }

    /// Absent values: blank values and strings matching an exclusion pattern
    pub fn is_absent(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s.trim().is_empty() || self.is_excluded(s),
            other => is_blank(other),
        }
    }

    /// Normalized text, or `None` for placeholders and text that normalizes away
    pub fn clean(&self, text: &str) -> Option<String> {
        if self.is_excluded(text) {
            return None;
        }
        let normalized = self.normalize(text);
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }

    /// Canonical source identity
    ///
    /// Lowercases, drops scheme, `www.` and path. With `source_site_family`,
    /// dotted hosts reduce to their last two labels.
    pub fn normalize_source(&self, source: &str) -> Option<String> {
        if self.is_excluded(source) {
            return None;
        }

        let lowered = source.trim().to_lowercase();
        let without_scheme = SCHEME.replace(&lowered, "");
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(host);
        let host = host.split(':').next().unwrap_or_default();

        if host.is_empty() {
            return None;
        }

        if self.flags.source_site_family && host.contains('.') {
            let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
            if labels.len() > 2 {
                return Some(labels[labels.len() - 2..].join("."));
            }
        }

        Some(host.to_string())
    }
}
