//! Domain types shared by the retrieval orchestrator and fusion math.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

pub type HitId = String;

/// Exact-match filter: field name -> scalar value, AND-combined.
/// BTreeMap keeps query bodies deterministic for a given filter set.
pub type Filter = BTreeMap<String, ScalarValue>;

pub const DEFAULT_TOP_K: usize = 12;
pub const DEFAULT_RRF_C: f64 = 60.0;

/// A single document returned by the search backend.
///
/// `id` is the backend document id and the identity used during fusion and
/// dedup. `source` carries the projected stored fields (`chunk_id`,
/// `label_id`, `section`, `text`, `openfda`, ...); the dense vector field is
/// never included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: HitId,
    #[serde(rename = "_score", default)]
    pub score: f64,
    #[serde(rename = "_source", default)]
    pub source: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HashMap<String, Vec<String>>>,
}

impl Hit {
    /// String-valued source field, if present.
    pub fn source_str(&self, field: &str) -> Option<&str> {
        self.source.get(field).and_then(Value::as_str)
    }
}

/// Filter values are a closed scalar sum; anything else is rejected before a
/// body is built rather than forwarded opaquely to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl ScalarValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self { Self::String(s.to_string()) }
}
impl From<String> for ScalarValue {
    fn from(s: String) -> Self { Self::String(s) }
}
impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self { Self::Bool(b) }
}
impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self { Self::Number(n) }
}
impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self { Self::Number(n as f64) }
}

/// Which stored fields a search body asks the backend to return.
/// The dense vector field is excluded in both variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    AllFields,
    Fields(Vec<String>),
}

impl SourceSelection {
    /// The fixed allowlist used when the caller does not choose.
    pub fn default_fields() -> Self {
        Self::Fields(
            ["chunk_id", "label_id", "section", "text", "openfda"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    }
}

impl Default for SourceSelection {
    fn default() -> Self { Self::default_fields() }
}

/// One way of forming a search body. `Auto` tries all four in declaration
/// order; a pinned variant is tried alone and its failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Auto,
    AnnQuery,
    AnnTopLevel,
    Scored,
    Lexical,
}

impl Strategy {
    /// Fallback order attempted under `Auto`.
    pub const FALLBACK_ORDER: [Strategy; 4] =
        [Self::AnnQuery, Self::AnnTopLevel, Self::Scored, Self::Lexical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::AnnQuery => "ann_query",
            Self::AnnTopLevel => "ann_toplevel",
            Self::Scored => "scored",
            Self::Lexical => "lexical",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "ann_query" => Ok(Self::AnnQuery),
            "ann_toplevel" => Ok(Self::AnnTopLevel),
            "scored" => Ok(Self::Scored),
            "lexical" => Ok(Self::Lexical),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Options for the single-strategy (fallback) retrieval path.
///
/// `None` fields resolve against [`crate::config::RetrievalConfig`] or the
/// derived defaults: `cap` = `top_k`, `num_candidates` = max(500, top_k*50).
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub index: Option<String>,
    pub top_k: Option<usize>,
    pub cap: Option<usize>,
    pub num_candidates: Option<usize>,
    pub filter: Filter,
    pub source: SourceSelection,
    pub highlight: bool,
    pub strategy: Option<Strategy>,
    /// Precomputed query vector; skips the embedding call when non-empty.
    pub query_vector: Option<Vec<f32>>,
    /// Keep at most this many hits per label group; `None` disables.
    pub max_per_label: Option<usize>,
}

/// Options for the hybrid (parallel lexical + ANN) path.
///
/// `text_k`/`ann_k` default to max(200, top_k*10); `window` defaults to
/// max(text_k, ann_k).
#[derive(Debug, Clone, Default)]
pub struct HybridOptions {
    pub base: RetrieveOptions,
    pub text_k: Option<usize>,
    pub ann_k: Option<usize>,
    pub rrf_c: Option<f64>,
    pub window: Option<usize>,
}

/// Result of the fallback path: capped hits plus the strategy that produced
/// them (the requested strategy when every attempt failed).
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<Hit>,
    pub strategy: Strategy,
}

/// Provenance for a hybrid call. `embedded` is false when the caller supplied
/// the query vector.
#[derive(Debug, Clone, Serialize)]
pub struct HybridInfo {
    pub text_count: usize,
    pub ann_count: usize,
    pub embedded: bool,
}

impl HybridInfo {
    pub fn strategy(&self) -> &'static str { "hybrid" }
}

/// Result of the hybrid path: the raw RRF-fused pool (no per-label dedup;
/// downstream selectors dedupe when citing).
#[derive(Debug, Clone)]
pub struct HybridRetrieval {
    pub hits: Vec<Hit>,
    pub info: HybridInfo,
}
