//! Duplicate group analysis
//!
//! **Group confidence factors:**
//! - Similarity consistency (0.4): 1 - variance of pairwise similarities
//! - Source diversity (0.3): 1 - distinct sources / members
//! - Data completeness (0.2): mean record quality
//! - Conflict level (0.1): 1 - min(1, conflicting fields / 10)
//!
//! A group whose confidence exceeds 0.8 is recommended for merging.

use crate::confidence::round3;
use crate::normalize::TextNormalizer;
use crate::similarity::SimilarityScorer;
use crate::types::{is_private_field, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

const SIMILARITY_CONSISTENCY_WEIGHT: f64 = 0.4;
const SOURCE_DIVERSITY_WEIGHT: f64 = 0.3;
const DATA_COMPLETENESS_WEIGHT: f64 = 0.2;
const CONFLICT_LEVEL_WEIGHT: f64 = 0.1;

const MERGE_RECOMMENDATION_THRESHOLD: f64 = 0.8;

/// Field weights for record quality
const QUALITY_WEIGHTS: [(&str, f64); 8] = [
    ("name", 0.3),
    ("description", 0.2),
    ("categories", 0.15),
    ("images", 0.1),
    ("stats", 0.1),
    ("relationships", 0.05),
    ("abilities", 0.05),
    ("source", 0.05),
];

/// One field whose members disagree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field: String,
    /// Every non-empty value, in member order
    pub values: Vec<Value>,
    pub count: usize,
    pub unique_count: usize,
}

/// Analysis attached to groups by the advanced algorithm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAnalysis {
    /// Group confidence (0.0-1.0, 3 decimals)
    pub confidence: f64,
    /// Record quality per member, in index order
    pub record_qualities: Vec<f64>,
    pub merge_recommended: bool,
    pub conflicts: Vec<FieldConflict>,
}

impl GroupAnalysis {
    pub fn analyze(records: &[&Record], scorer: &SimilarityScorer) -> Self {
        let normalizer = scorer.normalizer();
        let record_qualities: Vec<f64> = records
            .iter()
            .map(|r| record_quality(r, normalizer))
            .collect();
        let conflicts = find_conflicts(records);
        let confidence = group_confidence(records, &record_qualities, conflicts.len(), scorer);

        Self {
            confidence,
            record_qualities,
            merge_recommended: confidence > MERGE_RECOMMENDATION_THRESHOLD,
            conflicts,
        }
    }

    /// Analysis of two absorbed groups
    ///
    /// Confidence is the mean of both; qualities and conflicts are taken
    /// over all members of the combined group.
    pub fn combine(first: &GroupAnalysis, second: &GroupAnalysis, records: &[&Record]) -> Self {
        let confidence = round3((first.confidence + second.confidence) / 2.0);
        let record_qualities = first
            .record_qualities
            .iter()
            .chain(&second.record_qualities)
            .copied()
            .collect();

        Self {
            confidence,
            record_qualities,
            merge_recommended: confidence > MERGE_RECOMMENDATION_THRESHOLD,
            conflicts: find_conflicts(records),
        }
    }
}

fn group_confidence(
    records: &[&Record],
    qualities: &[f64],
    conflict_count: usize,
    scorer: &SimilarityScorer,
) -> f64 {
    if records.len() < 2 {
        return 1.0;
    }

    let mut similarities = Vec::new();
    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            similarities.push(scorer.score(a, b));
        }
    }
    let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
    let variance =
        similarities.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / similarities.len() as f64;
    let consistency = (1.0 - variance).max(0.0);

    let sources: BTreeSet<String> = records
        .iter()
        .map(|r| r.source().unwrap_or_default())
        .collect();
    let diversity = 1.0 - sources.len() as f64 / records.len() as f64;

    let completeness = qualities.iter().sum::<f64>() / qualities.len() as f64;
    let conflict_score = 1.0 - (conflict_count as f64 / 10.0).min(1.0);

    round3(
        consistency * SIMILARITY_CONSISTENCY_WEIGHT
            + diversity * SOURCE_DIVERSITY_WEIGHT
            + completeness * DATA_COMPLETENESS_WEIGHT
            + conflict_score * CONFLICT_LEVEL_WEIGHT,
    )
}

/// Per-field disagreements among public fields
pub fn find_conflicts(records: &[&Record]) -> Vec<FieldConflict> {
    if records.len() < 2 {
        return Vec::new();
    }

    let fields: BTreeSet<&String> = records
        .iter()
        .flat_map(|r| r.keys())
        .filter(|f| !is_private_field(f))
        .collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let values: Vec<Value> = records
                .iter()
                .filter_map(|r| r.get(field))
                .filter(|v| !v.is_null() && v.as_str() != Some(""))
                .cloned()
                .collect();
            let unique: BTreeSet<String> = values.iter().map(Value::to_string).collect();
            (unique.len() > 1).then(|| FieldConflict {
                field: field.clone(),
                count: values.len(),
                unique_count: unique.len(),
                values,
            })
        })
        .collect()
}

/// Weighted field richness in [0, 1]
///
/// Strings score by length (100 characters saturate), collections by size
/// (5 entries saturate). Placeholders score zero.
pub fn record_quality(record: &Record, normalizer: &TextNormalizer) -> f64 {
    let mut score = 0.0;
    let mut total_weight = 0.0;

    for (field, weight) in QUALITY_WEIGHTS {
        let quality = match record.get(field) {
            None | Some(Value::Null) => 0.0,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || normalizer.is_excluded(trimmed) {
                    0.0
                } else {
                    (trimmed.chars().count() as f64 / 100.0).min(1.0)
                }
            }
            Some(Value::Array(items)) => (items.len() as f64 / 5.0).min(1.0),
            Some(Value::Object(map)) => (map.len() as f64 / 5.0).min(1.0),
            Some(Value::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Some(Value::Number(_)) => 1.0,
        };
        score += quality * weight;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        score / total_weight
    } else {
        0.0
    }
}
