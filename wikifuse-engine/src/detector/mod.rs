//! Duplicate detection
//!
//! Partitions a batch into groups of records believed to describe the same
//! entity. Four algorithms are available:
//!
//! - **exact**: identical content hash over normalized identity fields
//! - **fuzzy**: greedy single pass, each candidate compared to the group seed
//! - **hybrid**: exact first, fuzzy over the records exact left ungrouped
//! - **advanced**: hybrid plus group analysis and a cross-group merge pass
//!
//! Fuzzy grouping is not transitive: with A~B, B~C and A≁C the outcome
//! depends on which record seeds the group. This differs from
//! `FusionCoordinator::fuse`, which compares against the evolving merged
//! record.

mod analysis;
mod removal;
mod statistics;

pub use analysis::{find_conflicts, record_quality, FieldConflict, GroupAnalysis};
pub use removal::{RemovalOutcome, RemovalStrategy};
pub use statistics::DetectionStatistics;

use crate::config::FusionConfig;
use crate::error::{FusionError, FusionResult};
use crate::similarity::SimilarityScorer;
use crate::types::Record;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use wikifuse_common::time::{Clock, SystemClock};

/// Description prefix length folded into the exact-match hash
const HASH_DESCRIPTION_PREFIX: usize = 100;
/// Descriptions at or below this length are left out of the hash
const HASH_DESCRIPTION_MIN: usize = 50;

/// Duplicate detection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionAlgorithm {
    Exact,
    Fuzzy,
    Hybrid,
    Advanced,
}

impl DetectionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Hybrid => "hybrid",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for DetectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionAlgorithm {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "hybrid" => Ok(Self::Hybrid),
            "advanced" => Ok(Self::Advanced),
            _ => Err(FusionError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// How a group was formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Exact,
    Fuzzy,
    Merged,
}

/// Batch indices believed to denote one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub kind: GroupKind,
    /// Positions in the original batch
    pub indices: Vec<usize>,
    /// Aggregate similarity in [0, 1]
    pub similarity: f64,
    /// Content hash shared by the members of an exact group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// The two groups a merged group combines
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subgroups: Vec<DuplicateGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<GroupAnalysis>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn members<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        self.indices.iter().filter_map(|&i| records.get(i)).collect()
    }
}

/// Groups, statistics and the algorithm that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub algorithm: DetectionAlgorithm,
    pub groups: Vec<DuplicateGroup>,
    pub statistics: DetectionStatistics,
}

/// Finds duplicate groups within a batch
pub struct DuplicateDetector {
    config: FusionConfig,
    scorer: SimilarityScorer,
    clock: Arc<dyn Clock>,
}

impl DuplicateDetector {
    pub fn new(config: &FusionConfig) -> FusionResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &FusionConfig, clock: Arc<dyn Clock>) -> FusionResult<Self> {
        Ok(Self {
            config: config.clone(),
            scorer: SimilarityScorer::new(config)?,
            clock,
        })
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Partition `records` into duplicate groups
    pub fn find_duplicates(
        &self,
        records: &[Record],
        algorithm: DetectionAlgorithm,
    ) -> DetectionReport {
        let started = self.clock.now();

        let groups = match algorithm {
            DetectionAlgorithm::Exact => self.exact_groups(records, &all_indices(records)),
            DetectionAlgorithm::Fuzzy => self.fuzzy_groups(records, &all_indices(records)),
            DetectionAlgorithm::Hybrid => self.hybrid_groups(records),
            DetectionAlgorithm::Advanced => self.advanced_groups(records),
        };

        let elapsed = (self.clock.now() - started)
            .num_microseconds()
            .unwrap_or(0) as f64
            / 1_000_000.0;
        let statistics = DetectionStatistics::from_groups(records.len(), &groups, elapsed);

        info!(
            algorithm = %algorithm,
            total = statistics.total_records,
            groups = statistics.duplicate_groups,
            duplicates = statistics.duplicate_records,
            "Duplicate detection complete"
        );

        DetectionReport {
            algorithm,
            groups,
            statistics,
        }
    }

    /// Content hash over normalized identity fields
    ///
    /// Returns `None` when the record has nothing hashable.
    pub fn record_hash(&self, record: &Record) -> Option<String> {
        let normalizer = self.scorer.normalizer();
        let mut parts: Vec<String> = ["name", "source", "url"]
            .into_iter()
            .filter_map(|field| {
                let value = record.text(field)?;
                normalizer
                    .clean(&value)
                    .map(|clean| format!("{}:{}", field, clean))
            })
            .collect();

        if let Some(description) = record
            .text("description")
            .and_then(|d| normalizer.clean(&d))
        {
            if description.chars().count() > HASH_DESCRIPTION_MIN {
                let prefix: String = description.chars().take(HASH_DESCRIPTION_PREFIX).collect();
                parts.push(format!("description:{}", prefix));
            }
        }

        if parts.is_empty() {
            return None;
        }

        parts.sort();
        let digest = Sha256::digest(parts.join("|").as_bytes());
        Some(format!("{:x}", digest))
    }

    fn exact_groups(&self, records: &[Record], candidates: &[usize]) -> Vec<DuplicateGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut by_hash: HashMap<String, Vec<usize>> = HashMap::new();

        for &i in candidates {
            let Some(hash) = self.record_hash(&records[i]) else {
                continue;
            };
            by_hash
                .entry(hash.clone())
                .or_insert_with(|| {
                    order.push(hash);
                    Vec::new()
                })
                .push(i);
        }

        order
            .into_iter()
            .filter_map(|hash| {
                let indices = by_hash.remove(&hash)?;
                (indices.len() > 1).then(|| {
                    debug!(hash = %hash, members = indices.len(), "Exact duplicate group");
                    DuplicateGroup {
                        kind: GroupKind::Exact,
                        indices,
                        similarity: 1.0,
                        hash: Some(hash),
                        subgroups: Vec::new(),
                        analysis: None,
                    }
                })
            })
            .collect()
    }

    fn fuzzy_groups(&self, records: &[Record], candidates: &[usize]) -> Vec<DuplicateGroup> {
        let threshold = self.config.similarity_threshold;
        let mut assigned = vec![false; candidates.len()];
        let mut groups = Vec::new();

        for (pos, &seed) in candidates.iter().enumerate() {
            if assigned[pos] {
                continue;
            }

            let mut members = vec![seed];
            let mut member_positions = Vec::new();
            for (other_pos, &j) in candidates.iter().enumerate().skip(pos + 1) {
                if assigned[other_pos] {
                    continue;
                }
                if self.scorer.score(&records[seed], &records[j]) >= threshold {
                    members.push(j);
                    member_positions.push(other_pos);
                }
            }

            if members.len() < 2 {
                continue;
            }

            assigned[pos] = true;
            for other_pos in member_positions {
                assigned[other_pos] = true;
            }

            let refs: Vec<&Record> = members.iter().map(|&i| &records[i]).collect();
            let similarity = self.scorer.group_similarity(&refs);
            debug!(seed, members = members.len(), similarity, "Fuzzy duplicate group");

            groups.push(DuplicateGroup {
                kind: GroupKind::Fuzzy,
                indices: members,
                similarity,
                hash: None,
                subgroups: Vec::new(),
                analysis: None,
            });
        }

        groups
    }

    fn hybrid_groups(&self, records: &[Record]) -> Vec<DuplicateGroup> {
        let mut groups = self.exact_groups(records, &all_indices(records));

        let mut grouped = vec![false; records.len()];
        for group in &groups {
            for &i in &group.indices {
                grouped[i] = true;
            }
        }
        let remaining: Vec<usize> = (0..records.len()).filter(|&i| !grouped[i]).collect();

        groups.extend(self.fuzzy_groups(records, &remaining));
        groups
    }

    fn advanced_groups(&self, records: &[Record]) -> Vec<DuplicateGroup> {
        let groups: Vec<DuplicateGroup> = self
            .hybrid_groups(records)
            .into_iter()
            .map(|mut group| {
                group.analysis = Some(GroupAnalysis::analyze(&group.members(records), &self.scorer));
                group
            })
            .collect();

        self.merge_related_groups(records, groups)
    }

    /// Greedy cross-group merge
    ///
    /// Each unprocessed group absorbs every later unprocessed group whose
    /// closest member pair reaches `threshold × group_merge_factor`.
    fn merge_related_groups(
        &self,
        records: &[Record],
        groups: Vec<DuplicateGroup>,
    ) -> Vec<DuplicateGroup> {
        if groups.len() < 2 {
            return groups;
        }

        let cutoff = self.config.similarity_threshold * self.config.group_merge_factor;
        let mut processed = vec![false; groups.len()];
        let mut merged_groups = Vec::with_capacity(groups.len());

        for i in 0..groups.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;

            let anchor = &groups[i];
            let mut current = anchor.clone();
            for j in i + 1..groups.len() {
                if processed[j] {
                    continue;
                }
                if self.max_cross_similarity(records, anchor, &groups[j]) >= cutoff {
                    processed[j] = true;
                    current = self.combine_groups(records, current, groups[j].clone());
                }
            }

            merged_groups.push(current);
        }

        merged_groups
    }

    fn max_cross_similarity(
        &self,
        records: &[Record],
        a: &DuplicateGroup,
        b: &DuplicateGroup,
    ) -> f64 {
        let (left, right) = (a.members(records), b.members(records));
        left.iter()
            .flat_map(|x| right.iter().map(move |y| (x, y)))
            .map(|(x, y)| self.scorer.score(x, y))
            .fold(0.0, f64::max)
    }

    fn combine_groups(
        &self,
        records: &[Record],
        first: DuplicateGroup,
        second: DuplicateGroup,
    ) -> DuplicateGroup {
        let indices: Vec<usize> = first
            .indices
            .iter()
            .chain(&second.indices)
            .copied()
            .collect();
        let members: Vec<&Record> = indices.iter().filter_map(|&i| records.get(i)).collect();

        let analysis = match (&first.analysis, &second.analysis) {
            (Some(a), Some(b)) => Some(GroupAnalysis::combine(a, b, &members)),
            _ => None,
        };

        debug!(
            first = ?first.indices,
            second = ?second.indices,
            "Merging related duplicate groups"
        );

        DuplicateGroup {
            kind: GroupKind::Merged,
            similarity: (first.similarity + second.similarity) / 2.0,
            indices,
            hash: None,
            analysis,
            subgroups: vec![first, second],
        }
    }
}

fn all_indices(records: &[Record]) -> Vec<usize> {
    (0..records.len()).collect()
}
