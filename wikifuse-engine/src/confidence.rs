//! Fused record confidence
//!
//! **Components** (each clamped to [0, 1] before blending):
//! - Source authority: highest contributing source priority / 100
//! - Completeness: share of required fields present in the fused record
//! - Freshness: linear decay of the newest `scraped_at` over the freshness window
//! - Quality: share of public fields holding a present value
//!
//! The blend uses `confidence_weights` and is rounded to 3 decimals.

use crate::config::{ConfidenceWeights, FusionConfig};
use crate::error::FusionResult;
use crate::normalize::TextNormalizer;
use crate::types::{is_private_field, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wikifuse_common::time::{age_hours, parse_timestamp};

/// Freshness when no contributing record carries a parseable timestamp
pub const NEUTRAL_FRESHNESS: f64 = 1.0;

/// Confidence with its components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub source_score: f64,
    pub completeness_score: f64,
    pub freshness_score: f64,
    pub quality_score: f64,
    /// Weighted blend (0.0-1.0, 3 decimals)
    pub confidence: f64,
}

/// Scores how trustworthy a fused record is
#[derive(Debug, Clone)]
pub struct ConfidenceModel {
    config: FusionConfig,
    normalizer: TextNormalizer,
}

impl ConfidenceModel {
    pub fn new(config: &FusionConfig) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            normalizer: TextNormalizer::new(config)?,
        })
    }

    /// Assess `fused`, built from `sources`, as of `now`
    pub fn assess(&self, fused: &Record, sources: &[&Record], now: DateTime<Utc>) -> ConfidenceReport {
        let source_score = self.source_score(fused, sources);
        let completeness_score = self.completeness_score(fused);
        let freshness_score = self.freshness_score(sources, now);
        let quality_score = self.quality_score(fused);

        let ConfidenceWeights {
            source_priority,
            completeness,
            freshness,
            quality,
        } = self.config.confidence_weights;

        let blended = source_score * source_priority
            + completeness_score * completeness
            + freshness_score * freshness
            + quality_score * quality;

        ConfidenceReport {
            source_score,
            completeness_score,
            freshness_score,
            quality_score,
            confidence: round3(blended).clamp(0.0, 1.0),
        }
    }

    fn source_score(&self, fused: &Record, sources: &[&Record]) -> f64 {
        let best = sources
            .iter()
            .map(|r| self.config.source_priority(r.source().as_deref()))
            .max()
            .unwrap_or_else(|| self.config.source_priority(fused.source().as_deref()));
        (best as f64 / 100.0).clamp(0.0, 1.0)
    }

    /// Share of `required_fields` present in `record` (1.0 when none are required)
    pub fn completeness_score(&self, record: &Record) -> f64 {
        let required = &self.config.required_fields;
        if required.is_empty() {
            return 1.0;
        }
        let present = required
            .iter()
            .filter(|field| self.is_present(record, field))
            .count();
        present as f64 / required.len() as f64
    }

    /// Freshness of the newest parseable `scraped_at`
    pub fn freshness_score(&self, sources: &[&Record], now: DateTime<Utc>) -> f64 {
        let newest = sources
            .iter()
            .filter_map(|r| r.scraped_at())
            .filter_map(|raw| parse_timestamp(&raw))
            .max();

        match newest {
            Some(then) => {
                let age = age_hours(then, now);
                (1.0 - age / self.config.freshness_window_hours).clamp(0.0, 1.0)
            }
            None => NEUTRAL_FRESHNESS,
        }
    }

    fn quality_score(&self, record: &Record) -> f64 {
        let public: Vec<&String> = record.keys().filter(|k| !is_private_field(k)).collect();
        if public.is_empty() {
            return 0.0;
        }
        let filled = public.iter().filter(|field| self.is_present(record, field)).count();
        filled as f64 / public.len() as f64
    }

    fn is_present(&self, record: &Record, field: &str) -> bool {
        record
            .get(field)
            .map_or(false, |value| !self.normalizer.is_absent(value))
    }
}

/// Round to 3 decimals
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
