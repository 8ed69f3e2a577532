//! Core record types
//!
//! A `Record` is one source's unmerged view of an entity: an open mapping of
//! field name to JSON value. Nothing about its shape is guaranteed, so every
//! accessor here returns `Option` and never panics on unexpected types.
//!
//! Fields whose names start with `_` are private by convention (fusion and
//! merge metadata); scoring code skips them and export layers drop them.

use crate::merger::MergeWarning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Field carrying fusion provenance on fused output
pub const FUSION_METADATA_FIELD: &str = "_fusion_metadata";

/// Field carrying provenance on records merged by duplicate removal
pub const MERGE_METADATA_FIELD: &str = "_merge_metadata";

/// Conventional fields holding alternative names (string or list)
pub const ALIAS_FIELDS: [&str; 5] = [
    "alternative_names",
    "aliases",
    "aka",
    "other_names",
    "japanese_name",
];

/// Returns true for `_`-prefixed private field names
pub fn is_private_field(field: &str) -> bool {
    field.starts_with('_')
}

/// Raw scraped record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from an arbitrary JSON value
    ///
    /// Non-object values yield an empty record rather than an error.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    pub fn keys(&self) -> serde_json::map::Keys<'_> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Field as a borrowed string, only when it is a JSON string
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Scalar field coerced to text
    ///
    /// Strings are returned as-is, numbers and booleans are rendered.
    /// Null, lists and mappings have no scalar text.
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(scalar_text)
    }

    /// Field coerced to a list of strings
    ///
    /// A list keeps its scalar items, a scalar becomes a one-item list.
    pub fn text_list(&self, field: &str) -> Vec<String> {
        match self.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(other) => scalar_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn name(&self) -> Option<String> {
        self.text("name")
    }

    pub fn source(&self) -> Option<String> {
        self.text("source")
    }

    pub fn url(&self) -> Option<String> {
        self.text("url")
    }

    pub fn scraped_at(&self) -> Option<String> {
        self.text("scraped_at")
    }

    /// Provenance entry describing this record
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            source: self.source().unwrap_or_else(|| "unknown".to_string()),
            scraped_at: self.scraped_at(),
            url: self.url(),
        }
    }

    /// Number of public (non `_`-prefixed) fields
    pub fn public_len(&self) -> usize {
        self.keys().filter(|k| !is_private_field(k)).count()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Render a scalar JSON value as text
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Length of a value coerced to text, in characters
///
/// Strings count their characters; anything else counts the characters of
/// its compact JSON rendering, so `[1, 2]` has length 5.
pub fn text_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        other => other.to_string().chars().count(),
    }
}

/// Structurally empty: null, blank string, empty list or empty mapping
///
/// Placeholder strings ("unknown", "n/a") are handled by
/// `TextNormalizer::is_absent`, which also consults exclusion patterns.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) | Value::Bool(_) => false,
    }
}

/// Provenance of one contributing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub scraped_at: Option<String>,
    pub url: Option<String>,
}

impl SourceRef {
    fn to_value(&self) -> Value {
        json!({
            "source": self.source,
            "scraped_at": self.scraped_at,
            "url": self.url,
        })
    }
}

/// `_fusion_metadata` attached to every fused record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionMetadata {
    /// Short content hash of name, source and fusion date
    pub fusion_id: String,
    pub fused_at: DateTime<Utc>,
    pub source_count: usize,
    /// Confidence score (0.0-1.0, 3 decimals)
    pub confidence: f64,
    pub sources: Vec<SourceRef>,
    /// Group members that failed the similarity check against the accumulator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SourceRef>,
    /// Merge problems met while fusing, one entry per distinct warning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MergeWarning>,
}

impl FusionMetadata {
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "fusion_id": self.fusion_id,
            "fused_at": self.fused_at.to_rfc3339(),
            "source_count": self.source_count,
            "confidence": self.confidence,
            "sources": self.sources.iter().map(SourceRef::to_value).collect::<Vec<_>>(),
        });
        if !self.skipped.is_empty() {
            value["skipped"] = Value::Array(self.skipped.iter().map(SourceRef::to_value).collect());
        }
        if !self.warnings.is_empty() {
            value["warnings"] = json!(self.warnings);
        }
        value
    }

    /// Recover provenance entries from a record that was already fused
    pub fn sources_of(record: &Record) -> Option<Vec<SourceRef>> {
        let sources = record.get(FUSION_METADATA_FIELD)?.get("sources")?.as_array()?;
        let refs: Vec<SourceRef> = sources
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();
        if refs.is_empty() {
            None
        } else {
            Some(refs)
        }
    }
}

/// Canonical merged record plus fusion metadata
///
/// Serializes as one flat mapping: the record's fields plus a
/// `_fusion_metadata` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecord {
    #[serde(flatten)]
    pub fields: Record,
    #[serde(rename = "_fusion_metadata")]
    pub metadata: FusionMetadata,
}

impl FusedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Flatten into a plain record carrying `_fusion_metadata`
    ///
    /// Used to feed shard outputs back into another fusion pass.
    pub fn into_record(self) -> Record {
        let mut record = self.fields;
        record.insert(FUSION_METADATA_FIELD, self.metadata.to_value());
        record
    }
}

/// `_merge_metadata` attached by duplicate removal with the merge strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeMetadata {
    pub merged_at: DateTime<Utc>,
    pub source_count: usize,
    pub merge_sources: Vec<String>,
}

impl MergeMetadata {
    pub fn to_value(&self) -> Value {
        json!({
            "merged_at": self.merged_at.to_rfc3339(),
            "source_count": self.source_count,
            "merge_sources": self.merge_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_value_non_object_is_empty() {
        assert!(Record::from_value(json!([1, 2, 3])).is_empty());
        assert!(Record::from_value(json!("name")).is_empty());
    }

    #[test]
    fn test_text_coercion() {
        let record = Record::from_value(json!({
            "name": "Zoro",
            "bounty": 320000000,
            "alive": true,
            "stats": {"power": 9},
            "nothing": null,
        }));
        assert_eq!(record.text("name").as_deref(), Some("Zoro"));
        assert_eq!(record.text("bounty").as_deref(), Some("320000000"));
        assert_eq!(record.text("alive").as_deref(), Some("true"));
        assert_eq!(record.text("stats"), None);
        assert_eq!(record.text("nothing"), None);
        assert_eq!(record.text("missing"), None);
    }

    #[test]
    fn test_text_list_accepts_scalar_or_list() {
        let record = Record::from_value(json!({
            "aliases": ["Pirate Hunter", null, 3],
            "aka": "Zoro-san",
        }));
        assert_eq!(record.text_list("aliases"), vec!["Pirate Hunter", "3"]);
        assert_eq!(record.text_list("aka"), vec!["Zoro-san"]);
        assert!(record.text_list("missing").is_empty());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!("x")));
    }

    #[test]
    fn test_text_len_coerces_non_strings() {
        assert_eq!(text_len(&json!("héllo")), 5);
        assert_eq!(text_len(&json!([1, 2])), 5);
        assert_eq!(text_len(&Value::Null), 0);
    }

    #[test]
    fn test_source_ref_defaults_unknown_source() {
        let record = Record::from_value(json!({"name": "Nami"}));
        let src = record.source_ref();
        assert_eq!(src.source, "unknown");
        assert_eq!(src.url, None);
    }

    #[test]
    fn test_fused_record_serializes_flat() {
        let fused = FusedRecord {
            fields: Record::from_value(json!({"name": "Nami"})),
            metadata: FusionMetadata {
                fusion_id: "abc".into(),
                fused_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                source_count: 1,
                confidence: 0.5,
                sources: vec![],
                skipped: vec![],
                warnings: vec![],
            },
        };
        let value = serde_json::to_value(&fused).unwrap();
        assert_eq!(value["name"], "Nami");
        assert_eq!(value["_fusion_metadata"]["fusion_id"], "abc");
        assert!(value["_fusion_metadata"].get("skipped").is_none());

        let back: FusedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, fused);
    }

    #[test]
    fn test_sources_recovered_from_fused_record() {
        let fused = FusedRecord {
            fields: Record::from_value(json!({"name": "Nami"})),
            metadata: FusionMetadata {
                fusion_id: "abc".into(),
                fused_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                source_count: 2,
                confidence: 0.5,
                sources: vec![
                    SourceRef { source: "a".into(), scraped_at: None, url: None },
                    SourceRef { source: "b".into(), scraped_at: None, url: Some("u".into()) },
                ],
                skipped: vec![],
                warnings: vec![],
            },
        };
        let record = fused.into_record();
        let sources = FusionMetadata::sources_of(&record).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].url.as_deref(), Some("u"));
        assert!(FusionMetadata::sources_of(&Record::new()).is_none());
    }
}
