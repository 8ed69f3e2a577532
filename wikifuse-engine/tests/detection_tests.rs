// Duplicate Detection Integration Tests
//
// Covers the grouping policies of DuplicateDetector and how they differ from
// the accumulator policy used when fusing a group.

mod helpers;

use helpers::{coordinator, record, test_now};
use serde_json::json;
use std::sync::Arc;
use wikifuse_common::FixedClock;
use wikifuse_engine::{
    DetectionAlgorithm, DuplicateDetector, FusionConfig, GroupKind, Record, RemovalStrategy,
};

fn detector(config: FusionConfig) -> DuplicateDetector {
    DuplicateDetector::with_clock(&config, Arc::new(FixedClock(test_now()))).unwrap()
}

/// A~B and B~C at 0.9, A~C at 0.8 (name-only records)
fn chain() -> (Record, Record, Record) {
    (
        record(json!({"name": "Abcdefghijklmnopqrst"})),
        record(json!({"name": "AbcdefghijklmnopqrXY"})),
        record(json!({"name": "ZWcdefghijklmnopqrXY"})),
    )
}

#[test]
fn test_chain_similarities() {
    let d = detector(FusionConfig::default());
    let (a, b, c) = chain();
    assert!((d.scorer().score(&a, &b) - 0.9).abs() < 1e-12);
    assert!((d.scorer().score(&b, &c) - 0.9).abs() < 1e-12);
    assert!((d.scorer().score(&a, &c) - 0.8).abs() < 1e-12);
}

#[test]
fn test_fuzzy_grouping_depends_on_seed_only() {
    let d = detector(FusionConfig::default());
    let (a, b, c) = chain();

    // A seeds: B joins, C is too far from A
    let report = d.find_duplicates(&[a.clone(), b.clone(), c.clone()], DetectionAlgorithm::Fuzzy);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].indices, vec![0, 1]);
    assert_eq!(report.statistics.unique_records, 2);

    // B seeds: both A and C are close to B
    let report = d.find_duplicates(&[b, a, c], DetectionAlgorithm::Fuzzy);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].indices, vec![0, 1, 2]);
    assert_eq!(report.statistics.unique_records, 1);
}

#[test]
fn test_accumulator_policy_is_separate_from_seed_policy() {
    // The group B seeded is fused against the evolving accumulator; members
    // still have to pass the threshold against it
    let c = coordinator(FusionConfig::default());
    let (a, b, cc) = chain();
    let fused = c.fuse(&[b, a, cc]).unwrap();
    assert_eq!(
        fused.metadata.source_count + fused.metadata.skipped.len(),
        3
    );
}

#[test]
fn test_group_similarity_is_mean_pairwise() {
    let d = detector(FusionConfig::default());
    let (a, b, c) = chain();
    let report = d.find_duplicates(&[b, a, c], DetectionAlgorithm::Fuzzy);
    let expected = (0.9 + 0.9 + 0.8) / 3.0;
    assert!((report.groups[0].similarity - expected).abs() < 1e-9);
}

#[test]
fn test_exact_group_similarity_is_one() {
    let d = detector(FusionConfig::default());
    let batch = vec![
        record(json!({"name": "Portgas D. Ace", "source": "onepiece.fandom.com", "url": "https://op/ace"})),
        record(json!({"name": "portgas d ace", "source": "ONEPIECE.FANDOM.COM", "url": "https://op/ace"})),
    ];
    let report = d.find_duplicates(&batch, DetectionAlgorithm::Exact);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].kind, GroupKind::Exact);
    assert_eq!(report.groups[0].similarity, 1.0);
}

#[test]
fn test_unknown_algorithm_name_rejected() {
    let err = "smart".parse::<DetectionAlgorithm>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown algorithm: smart (expected exact, fuzzy, hybrid or advanced)"
    );
}

#[test]
fn test_advanced_merges_related_groups() {
    // Two exact groups whose members are 0.8 similar: below the 0.85
    // threshold, above 0.85 * 0.9
    let d = detector(FusionConfig::default());
    let (a, _, c) = chain();
    let batch = vec![a.clone(), c.clone(), a, c];

    let hybrid = d.find_duplicates(&batch, DetectionAlgorithm::Hybrid);
    assert_eq!(hybrid.groups.len(), 2);

    let advanced = d.find_duplicates(&batch, DetectionAlgorithm::Advanced);
    assert_eq!(advanced.groups.len(), 1);
    let merged = &advanced.groups[0];
    assert_eq!(merged.kind, GroupKind::Merged);
    assert_eq!(merged.indices, vec![0, 2, 1, 3]);
    assert_eq!(merged.subgroups.len(), 2);
    assert_eq!(merged.similarity, 1.0);

    let analysis = merged.analysis.as_ref().unwrap();
    assert_eq!(analysis.record_qualities.len(), 4);
    assert_eq!(analysis.conflicts.len(), 1);
    assert_eq!(analysis.conflicts[0].field, "name");
    assert_eq!(advanced.statistics.group_kinds.get(&GroupKind::Merged), Some(&1));
}

#[test]
fn test_group_merge_factor_is_configurable() {
    let config = FusionConfig {
        group_merge_factor: 1.0,
        ..Default::default()
    };
    let d = detector(config);
    let (a, _, c) = chain();
    let batch = vec![a.clone(), c.clone(), a, c];

    let advanced = d.find_duplicates(&batch, DetectionAlgorithm::Advanced);
    assert_eq!(advanced.groups.len(), 2);
    assert!(advanced.groups.iter().all(|g| g.analysis.is_some()));
}

#[test]
fn test_processing_time_uses_injected_clock() {
    let d = detector(FusionConfig::default());
    let (a, b, c) = chain();
    let report = d.find_duplicates(&[a, b, c], DetectionAlgorithm::Advanced);
    assert_eq!(report.statistics.processing_time_seconds, 0.0);
}

#[test]
fn test_report_serializes_kinds_lowercase() {
    let d = detector(FusionConfig::default());
    let (a, b, _) = chain();
    let report = d.find_duplicates(&[a, b], DetectionAlgorithm::Hybrid);
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["algorithm"], "hybrid");
    assert_eq!(value["groups"][0]["kind"], "fuzzy");
    assert!(value["groups"][0].get("hash").is_none());
    assert_eq!(value["statistics"]["group_kinds"]["fuzzy"], 1);
}

#[test]
fn test_remove_duplicates_preserves_batch_order() {
    let d = detector(FusionConfig::default());
    let batch = vec![
        record(json!({"name": "Shanks", "source": "fandom.com"})),
        record(json!({"name": "Buggy", "source": "fandom.com"})),
        record(json!({"name": "Shanks", "source": "fandom.com", "epithet": "Red-Haired"})),
        record(json!({"name": "Mihawk", "source": "fandom.com"})),
    ];

    let outcome = d.remove_duplicates(&batch, RemovalStrategy::Merge);
    let names: Vec<String> = outcome.records.iter().filter_map(Record::name).collect();
    assert_eq!(names, vec!["Shanks", "Buggy", "Mihawk"]);
    assert_eq!(outcome.records[0].str_field("epithet"), Some("Red-Haired"));
    assert!(outcome.records[0].contains_key("_merge_metadata"));
    assert_eq!(outcome.statistics.duplicate_groups, 1);
}
