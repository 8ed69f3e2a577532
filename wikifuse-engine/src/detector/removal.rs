//! Duplicate removal
//!
//! Collapses each hybrid-detected group to a single record. Output keeps
//! batch order; a group's surviving record sits at the position of the
//! member it came from (or the group's earliest member, for `Merge`).

use super::{record_quality, DetectionAlgorithm, DetectionStatistics, DuplicateDetector};
use crate::error::FusionError;
use crate::types::{MergeMetadata, Record, MERGE_METADATA_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Fields whose lists are unioned by the merge strategy
const UNION_FIELDS: [&str; 2] = ["categories", "images"];

/// What to keep from each duplicate group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStrategy {
    KeepFirst,
    KeepLast,
    /// Member with the highest record quality; ties keep the earliest
    #[default]
    KeepBest,
    /// Best member enriched with the others' fields
    Merge,
}

impl RemovalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepFirst => "keep_first",
            Self::KeepLast => "keep_last",
            Self::KeepBest => "keep_best",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for RemovalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemovalStrategy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "keep_first" => Ok(Self::KeepFirst),
            "keep_last" => Ok(Self::KeepLast),
            "keep_best" => Ok(Self::KeepBest),
            "merge" => Ok(Self::Merge),
            other => Err(FusionError::InvalidConfig(format!(
                "unknown removal strategy: {}",
                other
            ))),
        }
    }
}

/// Deduplicated batch plus the detection statistics behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovalOutcome {
    pub records: Vec<Record>,
    pub statistics: DetectionStatistics,
}

impl DuplicateDetector {
    /// Collapse duplicate groups using hybrid detection
    pub fn remove_duplicates(&self, records: &[Record], strategy: RemovalStrategy) -> RemovalOutcome {
        let report = self.find_duplicates(records, DetectionAlgorithm::Hybrid);

        // Position of the surviving record → replacement; other members dropped
        let mut replacements: HashMap<usize, Record> = HashMap::new();
        let mut dropped = vec![false; records.len()];

        for group in &report.groups {
            let Some((&first, _)) = group.indices.split_first() else {
                continue;
            };

            let (position, survivor) = match strategy {
                RemovalStrategy::KeepFirst => (first, records[first].clone()),
                RemovalStrategy::KeepLast => {
                    let last = group.indices.last().copied().unwrap_or(first);
                    (last, records[last].clone())
                }
                RemovalStrategy::KeepBest => {
                    let best = self.best_member(records, &group.indices);
                    (best, records[best].clone())
                }
                RemovalStrategy::Merge => {
                    let earliest = group.indices.iter().copied().min().unwrap_or(first);
                    (earliest, self.merge_members(records, &group.indices))
                }
            };

            debug!(
                strategy = %strategy,
                kept = position,
                members = group.indices.len(),
                "Collapsed duplicate group"
            );

            for &i in &group.indices {
                dropped[i] = true;
            }
            dropped[position] = false;
            replacements.insert(position, survivor);
        }

        let deduplicated: Vec<Record> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !dropped[*i])
            .map(|(i, record)| replacements.remove(&i).unwrap_or_else(|| record.clone()))
            .collect();

        info!(
            strategy = %strategy,
            before = records.len(),
            after = deduplicated.len(),
            "Duplicate removal complete"
        );

        RemovalOutcome {
            records: deduplicated,
            statistics: report.statistics,
        }
    }

    fn best_member(&self, records: &[Record], indices: &[usize]) -> usize {
        let normalizer = self.scorer.normalizer();
        let mut best = indices[0];
        let mut best_quality = record_quality(&records[best], normalizer);
        for &i in &indices[1..] {
            let quality = record_quality(&records[i], normalizer);
            if quality > best_quality {
                best = i;
                best_quality = quality;
            }
        }
        best
    }

    /// Best-quality member as base; other members fill its gaps
    fn merge_members(&self, records: &[Record], indices: &[usize]) -> Record {
        let base_index = self.best_member(records, indices);
        let normalizer = self.scorer.normalizer();
        let mut merged = records[base_index].clone();

        for &i in indices.iter().filter(|&&i| i != base_index) {
            for (field, value) in records[i].iter() {
                let fill = merged.get(field).map_or(true, |v| normalizer.is_absent(v));
                if fill {
                    merged.insert(field.clone(), value.clone());
                    continue;
                }

                if !UNION_FIELDS.contains(&field.as_str()) {
                    continue;
                }
                let (Some(Value::Array(existing)), Value::Array(incoming)) = (merged.get(field), value)
                else {
                    continue;
                };
                let mut items = existing.clone();
                for item in incoming {
                    if !items.contains(item) {
                        items.push(item.clone());
                    }
                }
                merged.insert(field.clone(), Value::Array(items));
            }
        }

        let metadata = MergeMetadata {
            merged_at: self.clock.now(),
            source_count: indices.len(),
            merge_sources: indices
                .iter()
                .map(|&i| records[i].source().unwrap_or_else(|| "unknown".to_string()))
                .collect(),
        };
        merged.insert(MERGE_METADATA_FIELD, metadata.to_value());
        merged
    }
}
