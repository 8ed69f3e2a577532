//! Fusion configuration
//!
//! One immutable `FusionConfig` value is handed to every component at
//! construction time. Nothing in the engine reads global state or the
//! environment; the binary is the only place a config file is consulted.
//!
//! Every field has `#[serde(default)]`, so a partial TOML `[fusion]` table
//! overlays the built-in defaults:
//!
//! ```toml
//! [fusion]
//! similarity_threshold = 0.8
//!
//! [fusion.source_priorities]
//! "starwars.fandom.com" = 100
//! ```

use crate::detector::DetectionAlgorithm;
use crate::error::{FusionError, FusionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-dimension weights for record similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub name: f64,
    pub alternative_names: f64,
    pub description: f64,
    pub source: f64,
    pub categories: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 0.5,
            alternative_names: 0.2,
            description: 0.15,
            source: 0.1,
            categories: 0.05,
        }
    }
}

impl FieldWeights {
    fn all(&self) -> [(&'static str, f64); 5] {
        [
            ("name", self.name),
            ("alternative_names", self.alternative_names),
            ("description", self.description),
            ("source", self.source),
            ("categories", self.categories),
        ]
    }
}

/// Weights for the confidence blend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub source_priority: f64,
    pub completeness: f64,
    pub freshness: f64,
    pub quality: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            source_priority: 0.4,
            completeness: 0.3,
            freshness: 0.2,
            quality: 0.1,
        }
    }
}

/// Text normalization switches applied before any comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationFlags {
    pub lowercase: bool,
    pub strip_punctuation: bool,
    pub collapse_whitespace: bool,
    /// Drop mr/mrs/ms/dr/prof/sir/madam tokens
    pub strip_honorifics: bool,
    /// Compare sources by site family (`onepiece.fandom.com` → `fandom.com`)
    pub source_site_family: bool,
}

impl Default for NormalizationFlags {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            collapse_whitespace: true,
            strip_honorifics: true,
            source_site_family: true,
        }
    }
}

/// String similarity metric for name, alias and description comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMetric {
    /// Gestalt pattern matching: 2·matches / total length
    #[default]
    RatcliffObershelp,
    NormalizedLevenshtein,
    JaroWinkler,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum similarity for two records to count as the same entity
    pub similarity_threshold: f64,
    pub field_weights: FieldWeights,
    pub string_metric: StringMetric,
    /// Source name → authority ranking (higher wins)
    pub source_priorities: BTreeMap<String, i64>,
    /// Priority for sources missing from `source_priorities`
    pub default_source_priority: i64,
    /// Field name → merge strategy name
    pub merge_strategies: BTreeMap<String, String>,
    /// Regexes for placeholder values treated as absent
    pub exclusion_patterns: Vec<String>,
    pub normalization: NormalizationFlags,
    /// Fields a complete record must carry
    pub required_fields: Vec<String>,
    pub confidence_weights: ConfidenceWeights,
    /// Age after which a record's freshness reaches zero
    pub freshness_window_hours: f64,
    /// Cross-group merge threshold as a fraction of `similarity_threshold`
    pub group_merge_factor: f64,
    /// Detection algorithm used by batch fusion
    pub batch_algorithm: DetectionAlgorithm,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let source_priorities = [
            ("onepiece.fandom.com", 100),
            ("naruto.fandom.com", 95),
            ("manual_entry", 90),
            ("fandom.com", 80),
            ("api_data", 70),
            ("user_input", 60),
        ]
        .into_iter()
        .map(|(source, priority)| (source.to_string(), priority))
        .collect();

        let merge_strategies = [
            ("name", "highest_priority"),
            ("description", "longest_content"),
            ("stats", "most_complete"),
            ("images", "merge_all"),
            ("categories", "merge_unique"),
            ("relationships", "merge_unique"),
            ("abilities", "merge_unique"),
        ]
        .into_iter()
        .map(|(field, strategy)| (field.to_string(), strategy.to_string()))
        .collect();

        Self {
            similarity_threshold: 0.85,
            field_weights: FieldWeights::default(),
            string_metric: StringMetric::default(),
            source_priorities,
            default_source_priority: 50,
            merge_strategies,
            exclusion_patterns: [r"^\s*$", "^unknown$", "^n/a$", "^tbd$", "^none$", "^null$"]
                .into_iter()
                .map(String::from)
                .collect(),
            normalization: NormalizationFlags::default(),
            required_fields: vec!["name".to_string(), "source".to_string()],
            confidence_weights: ConfidenceWeights::default(),
            freshness_window_hours: 24.0 * 7.0,
            group_merge_factor: 0.9,
            batch_algorithm: DetectionAlgorithm::Fuzzy,
        }
    }
}

impl FusionConfig {
    /// Priority of a source; lookup is case-insensitive and whitespace-trimmed
    pub fn source_priority(&self, source: Option<&str>) -> i64 {
        let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.default_source_priority;
        };
        if let Some(priority) = self.source_priorities.get(source) {
            return *priority;
        }
        let lowered = source.to_lowercase();
        self.source_priorities
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == lowered)
            .map(|(_, priority)| *priority)
            .unwrap_or(self.default_source_priority)
    }

    /// Check ranges and weights
    ///
    /// Exclusion patterns are compiled (and reported) by `TextNormalizer::new`.
    pub fn validate(&self) -> FusionResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(FusionError::InvalidConfig(format!(
                "similarity_threshold must be within 0.0-1.0, got {}",
                self.similarity_threshold
            )));
        }

        for (field, weight) in self.field_weights.all() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(FusionError::InvalidConfig(format!(
                    "field weight for {} must be a non-negative number, got {}",
                    field, weight
                )));
            }
        }

        let cw = &self.confidence_weights;
        for (name, weight) in [
            ("source_priority", cw.source_priority),
            ("completeness", cw.completeness),
            ("freshness", cw.freshness),
            ("quality", cw.quality),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(FusionError::InvalidConfig(format!(
                    "confidence weight for {} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        if !self.freshness_window_hours.is_finite() || self.freshness_window_hours <= 0.0 {
            return Err(FusionError::InvalidConfig(format!(
                "freshness_window_hours must be positive, got {}",
                self.freshness_window_hours
            )));
        }

        if !self.group_merge_factor.is_finite() || self.group_merge_factor <= 0.0 {
            return Err(FusionError::InvalidConfig(format!(
                "group_merge_factor must be positive, got {}",
                self.group_merge_factor
            )));
        }

        Ok(())
    }
}
