//! Record similarity scoring
//!
//! **Algorithm:**
//! 1. Name ratio between normalized names (always counted)
//! 2. Alias ratio: (max pairwise + mean pairwise) / 2 over alias sets
//! 3. Description ratio over the first 200 normalized characters (both
//!    descriptions longer than 20 characters)
//! 4. Source family equality
//! 5. Category Jaccard index
//!
//! Dimensions 2-5 only count when both records carry data for them; the
//! result is the weighted sum divided by the weights of counted dimensions.
//!
//! Every string comparison orders its operands canonically first, so
//! `score(a, b)` and `score(b, a)` are bit-for-bit equal.

use crate::config::{FieldWeights, FusionConfig, StringMetric};
use crate::error::FusionResult;
use crate::normalize::TextNormalizer;
use crate::types::{Record, ALIAS_FIELDS};
use serde::Serialize;
use std::collections::BTreeSet;

const DESCRIPTION_PREFIX_CHARS: usize = 200;
const DESCRIPTION_MIN_CHARS: usize = 20;

/// Per-dimension similarity for one record pair
///
/// `None` marks a dimension that did not count toward the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityBreakdown {
    pub name: f64,
    pub alternative_names: Option<f64>,
    pub description: Option<f64>,
    pub source: Option<f64>,
    pub categories: Option<f64>,
    pub total: f64,
}

/// Weighted multi-field similarity between two records
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: FieldWeights,
    metric: StringMetric,
    normalizer: TextNormalizer,
}

impl SimilarityScorer {
    pub fn new(config: &FusionConfig) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.field_weights.clone(),
            metric: config.string_metric,
            normalizer: TextNormalizer::new(config)?,
        })
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Similarity in [0, 1]
    pub fn score(&self, a: &Record, b: &Record) -> f64 {
        self.breakdown(a, b).total
    }

    /// Similarity with each dimension reported separately
    pub fn breakdown(&self, a: &Record, b: &Record) -> SimilarityBreakdown {
        let name = self.name_similarity(a, b);
        let alternative_names = self.alias_similarity(a, b);
        let description = self.description_similarity(a, b);
        let source = self.source_similarity(a, b);
        let categories = self.category_similarity(a, b);

        let mut weighted = name * self.weights.name;
        let mut total_weight = self.weights.name;
        for (similarity, weight) in [
            (alternative_names, self.weights.alternative_names),
            (description, self.weights.description),
            (source, self.weights.source),
            (categories, self.weights.categories),
        ] {
            if let Some(similarity) = similarity {
                weighted += similarity * weight;
                total_weight += weight;
            }
        }

        let total = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SimilarityBreakdown {
            name,
            alternative_names,
            description,
            source,
            categories,
            total,
        }
    }

    /// Mean pairwise similarity of the given records (1.0 for fewer than two)
    pub fn group_similarity(&self, records: &[&Record]) -> f64 {
        if records.len() < 2 {
            return 1.0;
        }
        let mut sum = 0.0;
        let mut pairs = 0usize;
        for (i, a) in records.iter().enumerate() {
            for b in &records[i + 1..] {
                sum += self.score(a, b);
                pairs += 1;
            }
        }
        sum / pairs as f64
    }

    /// String ratio under the configured metric
    pub fn text_ratio(&self, a: &str, b: &str) -> f64 {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        match self.metric {
            StringMetric::RatcliffObershelp => ratcliff_obershelp(a, b),
            StringMetric::NormalizedLevenshtein => strsim::normalized_levenshtein(a, b),
            StringMetric::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }

    fn name_similarity(&self, a: &Record, b: &Record) -> f64 {
        let clean = |r: &Record| r.name().and_then(|n| self.normalizer.clean(&n));
        match (clean(a), clean(b)) {
            (Some(x), Some(y)) => self.text_ratio(&x, &y),
            _ => 0.0,
        }
    }

    fn aliases(&self, record: &Record) -> BTreeSet<String> {
        ALIAS_FIELDS
            .iter()
            .flat_map(|field| record.text_list(field))
            .filter_map(|alias| self.normalizer.clean(&alias))
            .collect()
    }

    fn alias_similarity(&self, a: &Record, b: &Record) -> Option<f64> {
        let (x, y) = (self.aliases(a), self.aliases(b));
        if x.is_empty() || y.is_empty() {
            return None;
        }
        if x == y {
            return Some(1.0);
        }
        let (x, y) = if x <= y { (x, y) } else { (y, x) };

        let mut max = 0.0f64;
        let mut sum = 0.0;
        for left in &x {
            for right in &y {
                let ratio = self.text_ratio(left, right);
                max = max.max(ratio);
                sum += ratio;
            }
        }
        let mean = sum / (x.len() * y.len()) as f64;
        Some((max + mean) / 2.0)
    }

    fn description_similarity(&self, a: &Record, b: &Record) -> Option<f64> {
        let clean = |r: &Record| r.text("description").and_then(|d| self.normalizer.clean(&d));
        let (x, y) = (clean(a)?, clean(b)?);
        // Too short to say anything about identity
        if x.chars().count() <= DESCRIPTION_MIN_CHARS || y.chars().count() <= DESCRIPTION_MIN_CHARS
        {
            return None;
        }
        let x: String = x.chars().take(DESCRIPTION_PREFIX_CHARS).collect();
        let y: String = y.chars().take(DESCRIPTION_PREFIX_CHARS).collect();
        Some(self.text_ratio(&x, &y))
    }

    fn source_similarity(&self, a: &Record, b: &Record) -> Option<f64> {
        let family = |r: &Record| r.source().and_then(|s| self.normalizer.normalize_source(&s));
        let (x, y) = (family(a)?, family(b)?);
        Some(if x == y { 1.0 } else { 0.0 })
    }

    fn category_similarity(&self, a: &Record, b: &Record) -> Option<f64> {
        let categories = |r: &Record| -> BTreeSet<String> {
            r.text_list("categories")
                .iter()
                .filter_map(|c| self.normalizer.clean(c))
                .collect()
        };
        let (x, y) = (categories(a), categories(b));
        if x.is_empty() || y.is_empty() {
            return None;
        }
        let intersection = x.intersection(&y).count();
        let union = x.union(&y).count();
        Some(intersection as f64 / union as f64)
    }
}

/// Ratcliff/Obershelp "gestalt" ratio: 2·M / T
///
/// M counts characters in recursively found longest common blocks, T is the
/// combined length. Two empty strings score 1.0.
pub fn ratcliff_obershelp(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block within `a[alo..ahi]` and `b[blo..bhi]`
///
/// Ties resolve to the block starting earliest in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = if a[i] == b[j] { prev[j - blo] + 1 } else { 0 };
            curr[j - blo + 1] = k;
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}
