//! Fusion orchestration
//!
//! **Single group (`fuse`):**
//! 1. Rank records by source priority, completeness and freshness
//! 2. Seed the accumulator with the top-ranked record
//! 3. Merge each remaining record whose similarity to the accumulator meets
//!    the threshold; list the others as skipped
//! 4. Attach `_fusion_metadata` with provenance and confidence
//!
//! **Batch (`batch_fuse`):** detect groups, fuse each group, then wrap every
//! ungrouped record as a singleton.

use crate::confidence::ConfidenceModel;
use crate::config::FusionConfig;
use crate::detector::DuplicateDetector;
use crate::error::FusionResult;
use crate::merger::FieldMerger;
use crate::types::{FusedRecord, FusionMetadata, Record, SourceRef, FUSION_METADATA_FIELD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wikifuse_common::time::{age_hours, parse_timestamp, Clock, SystemClock};

/// Length of the hex fusion id
const FUSION_ID_LEN: usize = 12;

/// Turns batches of raw records into fused records
pub struct FusionCoordinator {
    config: FusionConfig,
    detector: DuplicateDetector,
    merger: FieldMerger,
    confidence: ConfidenceModel,
    clock: Arc<dyn Clock>,
}

/// One input prepared for fusion
struct Contribution<'a> {
    record: Record,
    original: &'a Record,
    provenance: Vec<SourceRef>,
}

impl FusionCoordinator {
    pub fn new(config: FusionConfig) -> FusionResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: FusionConfig, clock: Arc<dyn Clock>) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            detector: DuplicateDetector::with_clock(&config, Arc::clone(&clock))?,
            merger: FieldMerger::new(&config)?,
            confidence: ConfidenceModel::new(&config)?,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    /// Fuse records believed to describe one entity
    ///
    /// Returns `None` for an empty slice. Merge warnings (unknown strategy
    /// names) are logged and also listed in `_fusion_metadata.warnings`.
    pub fn fuse(&self, records: &[Record]) -> Option<FusedRecord> {
        let refs: Vec<&Record> = records.iter().collect();
        self.fuse_refs(&refs)
    }

    /// Fuse every duplicate group and pass singletons through
    ///
    /// Group outputs come first (in group order), then ungrouped records in
    /// batch order.
    pub fn batch_fuse(&self, records: &[Record]) -> Vec<FusedRecord> {
        if records.is_empty() {
            return Vec::new();
        }

        info!(records = records.len(), "Starting batch fusion");

        let report = self
            .detector
            .find_duplicates(records, self.config.batch_algorithm);

        let mut grouped = vec![false; records.len()];
        let mut fused = Vec::with_capacity(records.len());

        for group in &report.groups {
            let members: Vec<&Record> = group
                .indices
                .iter()
                .filter(|&&i| i < records.len() && !grouped[i])
                .map(|&i| &records[i])
                .collect();
            for &i in &group.indices {
                if let Some(flag) = grouped.get_mut(i) {
                    *flag = true;
                }
            }
            debug!(indices = ?group.indices, kind = ?group.kind, "Fusing duplicate group");
            fused.extend(self.fuse_refs(&members));
        }

        for (i, record) in records.iter().enumerate() {
            if !grouped[i] {
                fused.extend(self.fuse_refs(&[record]));
            }
        }

        info!(
            records = records.len(),
            fused = fused.len(),
            groups = report.groups.len(),
            "Batch fusion complete"
        );

        fused
    }

    /// Ranking used to pick the accumulator seed
    ///
    /// `source_priority + 0.5 × completeness% + 0.2 × freshness%`, where
    /// freshness% loses one point per day of age (100 when undated).
    pub fn priority_score(&self, record: &Record, now: DateTime<Utc>) -> f64 {
        let priority = self.config.source_priority(record.source().as_deref()) as f64;
        let completeness = self.confidence.completeness_score(record) * 100.0;
        let freshness = record
            .scraped_at()
            .and_then(|raw| parse_timestamp(&raw))
            .map(|then| (100.0 - age_hours(then, now) / 24.0).max(0.0))
            .unwrap_or(100.0);

        priority + completeness * 0.5 + freshness * 0.2
    }

    fn fuse_refs(&self, records: &[&Record]) -> Option<FusedRecord> {
        if records.is_empty() {
            return None;
        }

        let now = self.clock.now();
        let contributions: Vec<Contribution<'_>> = records.iter().map(|r| prepare(r)).collect();

        let mut order: Vec<usize> = (0..contributions.len()).collect();
        if order.len() > 1 {
            let scores: Vec<f64> = contributions
                .iter()
                .map(|c| self.priority_score(&c.record, now))
                .collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        }

        let seed = &contributions[order[0]];
        let mut accumulator = seed.record.clone();
        let mut members: Vec<&Record> = vec![&seed.record];
        let mut sources = seed.provenance.clone();
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();

        for &i in &order[1..] {
            let candidate = &contributions[i];
            let similarity = self.detector.scorer().score(&accumulator, &candidate.record);

            if similarity >= self.config.similarity_threshold {
                let outcome = self.merger.merge(&accumulator, &candidate.record);
                for warning in outcome.warnings {
                    if !warnings.contains(&warning) {
                        warnings.push(warning);
                    }
                }
                accumulator = outcome.record;
                members.push(&candidate.record);
                sources.extend(candidate.provenance.iter().cloned());
            } else {
                let name = candidate.original.name().unwrap_or_default();
                warn!(
                    name = %name,
                    source = %candidate.provenance.first().map_or("unknown", |s| s.source.as_str()),
                    similarity,
                    threshold = self.config.similarity_threshold,
                    "Group member below similarity threshold, skipped"
                );
                skipped.extend(candidate.provenance.iter().cloned());
            }
        }

        let report = self.confidence.assess(&accumulator, &members, now);
        let metadata = FusionMetadata {
            fusion_id: fusion_id(&accumulator, now),
            fused_at: now,
            source_count: sources.len(),
            confidence: report.confidence,
            sources,
            skipped,
            warnings,
        };

        debug!(
            fusion_id = %metadata.fusion_id,
            source_count = metadata.source_count,
            confidence = metadata.confidence,
            "Fused record"
        );

        Some(FusedRecord {
            fields: accumulator,
            metadata,
        })
    }
}

/// Strip prior fusion metadata, keeping its provenance
fn prepare(original: &Record) -> Contribution<'_> {
    let provenance =
        FusionMetadata::sources_of(original).unwrap_or_else(|| vec![original.source_ref()]);
    let mut record = original.clone();
    record.remove(FUSION_METADATA_FIELD);
    Contribution {
        record,
        original,
        provenance,
    }
}

/// First 12 hex chars of SHA-256 over `name:source:date`
fn fusion_id(record: &Record, now: DateTime<Utc>) -> String {
    let content = format!(
        "{}:{}:{}",
        record.name().unwrap_or_default(),
        record.source().unwrap_or_default(),
        now.format("%Y-%m-%d")
    );
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    digest[..FUSION_ID_LEN].to_string()
}
