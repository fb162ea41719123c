pub mod evidence;
pub mod fingerprint;
pub mod orchestrator;
pub mod pipeline;
pub mod scoring;

use corpus::types::ClinicalPhase;
use serde::{Deserialize, Serialize};

use scoring::{ConfidenceTier, EvidenceBundle, ScoreExplanation};

pub use orchestrator::{CallerContext, DrugDetails, EngineStats, QueryEngine};
pub use pipeline::{run_search, SearchOutcome};

/// Hard ceiling on page size; anything above is a validation error.
pub const MAX_LIMIT: usize = 200;
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    Hero,
    Corpus,
    ExternalOnly,
}

/// One ranked drug→cancer opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub drug_id: String,
    pub drug_name: String,
    pub cancer_type: String,
    pub confidence: f64,
    pub tier: ConfidenceTier,
    pub explanation: ScoreExplanation,
    pub evidence: EvidenceBundle,
    pub origin: MatchOrigin,
    /// Whether the match came from the first non-empty search strategy.
    pub primary: bool,
    pub demo_priority: Option<u32>,
    pub original_indication: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub oncology_only: bool,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    #[serde(default)]
    pub phase_in: Option<Vec<ClinicalPhase>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub want_live_evidence: bool,
    #[serde(default)]
    pub persist: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            pagination: Pagination::default(),
            want_live_evidence: false,
            persist: false,
        }
    }
}

/// A subsystem that could not contribute to this response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedSource {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub matches: Vec<ScoredMatch>,
    pub execution_time_ms: u64,
    pub data_sources: Vec<String>,
    pub degraded: Vec<DegradedSource>,
    pub cache_hit: bool,
    pub artifact_id: Option<String>,
}
