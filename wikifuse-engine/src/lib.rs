//! # wikifuse Engine
//!
//! Record linkage and fusion for entity records scraped from several wikis.
//!
//! **Components:**
//! - `SimilarityScorer`: weighted multi-field similarity between two records
//! - `FieldMerger`: per-field conflict resolution under named strategies
//! - `DuplicateDetector`: exact, fuzzy, hybrid and advanced grouping
//! - `ConfidenceModel`: trust score for fused output
//! - `FusionCoordinator`: turns a batch into fused records
//!
//! All components are built from one immutable `FusionConfig`, hold no
//! mutable state and are `Send + Sync`.
//!
//! ```no_run
//! use wikifuse_engine::{FusionConfig, FusionCoordinator, Record};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = FusionCoordinator::new(FusionConfig::default())?;
//! let records: Vec<Record> = serde_json::from_str(r#"[{"name": "Nami"}]"#)?;
//! let fused = coordinator.batch_fuse(&records);
//! println!("{}", serde_json::to_string_pretty(&fused)?);
//! # Ok(())
//! # }
//! ```

pub mod confidence;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod merger;
pub mod normalize;
pub mod settings;
pub mod similarity;
pub mod types;

pub use confidence::{ConfidenceModel, ConfidenceReport};
pub use config::{FusionConfig, StringMetric};
pub use coordinator::FusionCoordinator;
pub use detector::{
    DetectionAlgorithm, DetectionReport, DetectionStatistics, DuplicateDetector, DuplicateGroup,
    GroupKind, RemovalOutcome, RemovalStrategy,
};
pub use error::{FusionError, FusionResult};
pub use merger::{FieldMerger, MergeOutcome, MergeStrategy, MergeWarning};
pub use normalize::TextNormalizer;
pub use settings::Settings;
pub use similarity::{SimilarityBreakdown, SimilarityScorer};
pub use types::{FusedRecord, FusionMetadata, Record, SourceRef};
