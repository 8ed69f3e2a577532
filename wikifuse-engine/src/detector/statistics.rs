//! Duplicate detection statistics
//!
//! Computed once from the final group list; nothing is counted while
//! detection runs.

use super::{DuplicateGroup, GroupKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// **Detection Statistics**
///
/// Display: "N records, G duplicate groups (D records), U unique"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStatistics {
    /// Records in the batch
    pub total_records: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Records belonging to any group
    pub duplicate_records: usize,
    /// Distinct entities: total - duplicates + groups
    pub unique_records: usize,
    /// duplicate_records / total_records (0 for an empty batch)
    pub deduplication_rate: f64,
    /// Group count per kind
    pub group_kinds: BTreeMap<GroupKind, usize>,
    pub processing_time_seconds: f64,
    /// duplicate_records / duplicate_groups (0 without groups)
    pub average_group_size: f64,
}

impl DetectionStatistics {
    pub fn from_groups(
        total_records: usize,
        groups: &[DuplicateGroup],
        processing_time_seconds: f64,
    ) -> Self {
        let duplicate_records: usize = groups.iter().map(|g| g.indices.len()).sum();
        let mut group_kinds = BTreeMap::new();
        for group in groups {
            *group_kinds.entry(group.kind).or_insert(0) += 1;
        }

        Self {
            total_records,
            duplicate_groups: groups.len(),
            duplicate_records,
            unique_records: (total_records + groups.len()).saturating_sub(duplicate_records),
            deduplication_rate: if total_records > 0 {
                duplicate_records as f64 / total_records as f64
            } else {
                0.0
            },
            group_kinds,
            processing_time_seconds,
            average_group_size: if groups.is_empty() {
                0.0
            } else {
                duplicate_records as f64 / groups.len() as f64
            },
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} records, {} duplicate groups ({} records), {} unique",
            self.total_records, self.duplicate_groups, self.duplicate_records, self.unique_records
        )
    }
}
