//! Field-level record merging
//!
//! Each field resolves its conflict with the strategy configured for its
//! name. Absent values (null, blank, empty collections, placeholders) never
//! win over present ones, whatever the strategy.

use crate::config::FusionConfig;
use crate::error::FusionResult;
use crate::normalize::TextNormalizer;
use crate::types::{text_len, Record};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Conflict resolution policy for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Value from the record whose source ranks higher; ties keep record1
    HighestPriority,
    /// Longer value by text length; ties keep record1
    LongestContent,
    /// Shallow union of mappings, record1's non-null entries first
    MostComplete,
    MergeAll,
    MergeUnique,
    /// First non-null value, record1 preferred
    Default,
}

impl MergeStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "highest_priority" => Some(Self::HighestPriority),
            "longest_content" => Some(Self::LongestContent),
            "most_complete" => Some(Self::MostComplete),
            "merge_all" => Some(Self::MergeAll),
            "merge_unique" => Some(Self::MergeUnique),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighestPriority => "highest_priority",
            Self::LongestContent => "longest_content",
            Self::MostComplete => "most_complete",
            Self::MergeAll => "merge_all",
            Self::MergeUnique => "merge_unique",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal problem found while merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeWarning {
    /// Configured strategy name not recognized; `default` was used instead
    UnknownStrategy { field: String, strategy: String },
}

/// Merged record plus any warnings raised while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: Record,
    pub warnings: Vec<MergeWarning>,
}

/// Merges two records field by field
#[derive(Debug, Clone)]
pub struct FieldMerger {
    strategies: BTreeMap<String, String>,
    config: FusionConfig,
    normalizer: TextNormalizer,
}

impl FieldMerger {
    pub fn new(config: &FusionConfig) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            strategies: config.merge_strategies.clone(),
            config: config.clone(),
            normalizer: TextNormalizer::new(config)?,
        })
    }

    /// Strategy applied to `field`, with the unrecognized name if any
    fn strategy_for(&self, field: &str) -> (MergeStrategy, Option<&str>) {
        match self.strategies.get(field) {
            None => (MergeStrategy::Default, None),
            Some(name) => match MergeStrategy::from_name(name) {
                Some(strategy) => (strategy, None),
                None => (MergeStrategy::Default, Some(name.as_str())),
            },
        }
    }

    /// Merge `record2` into `record1`
    ///
    /// The result carries the union of both key sets; fields only in
    /// `record2` are copied verbatim.
    pub fn merge(&self, record1: &Record, record2: &Record) -> MergeOutcome {
        let fields: BTreeSet<&String> = record1.keys().chain(record2.keys()).collect();
        let mut merged = Map::new();
        let mut warnings = Vec::new();

        for field in fields {
            let (strategy, unknown) = self.strategy_for(field);
            if let Some(name) = unknown {
                warn!(field = %field, strategy = %name, "Unknown merge strategy, using default");
                warnings.push(MergeWarning::UnknownStrategy {
                    field: field.clone(),
                    strategy: name.to_string(),
                });
            }

            let value = self.merge_field(
                strategy,
                record1.get(field),
                record2.get(field),
                record1,
                record2,
            );
            if let Some(value) = value {
                merged.insert(field.clone(), value);
            }
        }

        MergeOutcome {
            record: Record::from(merged),
            warnings,
        }
    }

    /// Merge a single pair of values under `strategy`
    pub fn merge_field<'a>(
        &self,
        strategy: MergeStrategy,
        value1: Option<&'a Value>,
        value2: Option<&'a Value>,
        record1: &Record,
        record2: &Record,
    ) -> Option<Value> {
        let normalizer = &self.normalizer;
        let present = |v: Option<&'a Value>| v.filter(|v| !normalizer.is_absent(v));

        let (v1, v2) = match (present(value1), present(value2)) {
            (Some(v1), Some(v2)) => (v1, v2),
            (Some(v), None) | (None, Some(v)) => return Some(v.clone()),
            (None, None) => return first_non_null(value1, value2),
        };

        let value = match strategy {
            MergeStrategy::HighestPriority => {
                let p1 = self.config.source_priority(record1.source().as_deref());
                let p2 = self.config.source_priority(record2.source().as_deref());
                if p2 > p1 {
                    v2.clone()
                } else {
                    v1.clone()
                }
            }
            MergeStrategy::LongestContent => {
                if text_len(v2) > text_len(v1) {
                    v2.clone()
                } else {
                    v1.clone()
                }
            }
            MergeStrategy::MostComplete => match (v1, v2) {
                (Value::Object(m1), Value::Object(m2)) => {
                    let mut combined = m2.clone();
                    for (key, value) in m1 {
                        if !value.is_null() || !combined.contains_key(key) {
                            combined.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Object(combined)
                }
                _ => v1.clone(),
            },
            MergeStrategy::MergeAll | MergeStrategy::MergeUnique => union(v1, v2),
            MergeStrategy::Default => v1.clone(),
        };

        Some(value)
    }
}

fn first_non_null(value1: Option<&Value>, value2: Option<&Value>) -> Option<Value> {
    value1
        .filter(|v| !v.is_null())
        .or(value2.filter(|v| !v.is_null()))
        .or(value1)
        .or(value2)
        .cloned()
}

/// Order-preserving union without duplicates
fn union(v1: &Value, v2: &Value) -> Value {
    fn push_unique(items: &mut Vec<Value>, value: &Value) {
        if !items.contains(value) {
            items.push(value.clone());
        }
    }

    match (v1, v2) {
        (Value::Array(a), Value::Array(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            for value in a.iter().chain(b) {
                push_unique(&mut items, value);
            }
            Value::Array(items)
        }
        (Value::Array(list), scalar) | (scalar, Value::Array(list)) => {
            let mut items = Vec::with_capacity(list.len() + 1);
            for value in list {
                push_unique(&mut items, value);
            }
            push_unique(&mut items, scalar);
            Value::Array(items)
        }
        (a, b) if a == b => a.clone(),
        (a, b) => Value::Array(vec![a.clone(), b.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merger() -> FieldMerger {
        FieldMerger::new(&FusionConfig::default()).unwrap()
    }

    fn record(value: Value) -> Record {
        Record::from_value(value)
    }

    #[test]
    fn test_longest_content_prefers_longer() {
        let m = merger();
        let a = record(json!({"description": "Hi"}));
        let b = record(json!({"description": "Hello there"}));
        let merged = m.merge(&a, &b).record;
        assert_eq!(merged.str_field("description"), Some("Hello there"));

        // Tie keeps record1
        let c = record(json!({"description": "Yo"}));
        assert_eq!(m.merge(&a, &c).record.str_field("description"), Some("Hi"));
    }

    #[test]
    fn test_merge_unique_is_set_union() {
        let m = merger();
        let a = record(json!({"categories": ["Action", "Drama"]}));
        let b = record(json!({"categories": ["Drama", "Comedy"]}));
        let merged = m.merge(&a, &b).record;
        assert_eq!(merged.get("categories"), Some(&json!(["Action", "Drama", "Comedy"])));
    }

    #[test]
    fn test_union_with_scalars() {
        assert_eq!(union(&json!(["a", "b"]), &json!("c")), json!(["a", "b", "c"]));
        assert_eq!(union(&json!("a"), &json!(["a", "b"])), json!(["a", "b"]));
        assert_eq!(union(&json!("a"), &json!("b")), json!(["a", "b"]));
        assert_eq!(union(&json!("a"), &json!("a")), json!("a"));
    }

    #[test]
    fn test_highest_priority_uses_source_ranking() {
        let m = merger();
        let low = record(json!({"name": "Monkey D Luffy", "source": "fandom.com"}));
        let high = record(json!({"name": "Monkey D. Luffy", "source": "onepiece.fandom.com"}));
        assert_eq!(m.merge(&low, &high).record.str_field("name"), Some("Monkey D. Luffy"));
        assert_eq!(m.merge(&high, &low).record.str_field("name"), Some("Monkey D. Luffy"));
    }

    #[test]
    fn test_present_value_beats_placeholder() {
        let m = merger();
        let a = record(json!({"name": "unknown", "source": "onepiece.fandom.com"}));
        let b = record(json!({"name": "Nami", "source": "user_input"}));
        assert_eq!(m.merge(&a, &b).record.str_field("name"), Some("Nami"));
    }

    #[test]
    fn test_most_complete_shallow_merges_mappings() {
        let m = merger();
        let a = record(json!({"stats": {"height": "174 cm", "age": null}}));
        let b = record(json!({"stats": {"age": 19, "height": "170 cm", "bounty": 66000000}}));
        let merged = m.merge(&a, &b).record;
        assert_eq!(
            merged.get("stats"),
            Some(&json!({"height": "174 cm", "age": 19, "bounty": 66000000}))
        );
    }

    #[test]
    fn test_unconfigured_fields_round_trip() {
        let m = merger();
        let a = record(json!({"name": "Usopp", "crew": "Straw Hats", "extra": null}));
        let b = record(json!({"name": "Usopp", "weapon": "Kabuto", "extra": 3}));
        let merged = m.merge(&a, &b);
        assert!(merged.warnings.is_empty());
        assert_eq!(merged.record.str_field("crew"), Some("Straw Hats"));
        assert_eq!(merged.record.str_field("weapon"), Some("Kabuto"));
        assert_eq!(merged.record.get("extra"), Some(&json!(3)));
    }

    #[test]
    fn test_unknown_strategy_falls_back_with_warning() {
        let mut config = FusionConfig::default();
        config
            .merge_strategies
            .insert("epithet".to_string(), "loudest_wins".to_string());
        let m = FieldMerger::new(&config).unwrap();

        let a = record(json!({"epithet": "Pirate Hunter"}));
        let b = record(json!({"epithet": "Demon of the East"}));
        let outcome = m.merge(&a, &b);

        assert_eq!(outcome.record.str_field("epithet"), Some("Pirate Hunter"));
        assert_eq!(
            outcome.warnings,
            vec![MergeWarning::UnknownStrategy {
                field: "epithet".to_string(),
                strategy: "loudest_wins".to_string(),
            }]
        );
    }

    #[test]
    fn test_strategy_names() {
        for name in [
            "highest_priority",
            "longest_content",
            "most_complete",
            "merge_all",
            "merge_unique",
            "default",
        ] {
            let strategy = MergeStrategy::from_name(name).unwrap();
            assert_eq!(strategy.as_str(), name);
        }
        assert_eq!(MergeStrategy::from_name("Merge_Unique"), Some(MergeStrategy::MergeUnique));
        assert_eq!(MergeStrategy::from_name("bogus"), None);
    }
}
