use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::cache::{keys, CacheClient};
use common::error::AppError;
use common::rate_limit::{RateLimitTier, RateLimiter};
use common::storage::types::{AnalysisArtifact, ArtifactKind};
use common::storage::AnalysisStore;
use common::utils::config::AppConfig;
use corpus::loader::{Corpus, CorpusCounts};
use corpus::types::{Drug, HeroCase};
use corpus::CorpusIndex;
use fetchers::LiveEvidenceClients;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::fingerprint::{fingerprint, normalize_query};
use crate::pipeline::run_search;
use crate::{DegradedSource, SearchRequest, SearchResponse, MAX_LIMIT};

/// Who is asking, for admission and artifact attribution.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub identity: String,
    pub tier: RateLimitTier,
    pub subject: Option<String>,
    pub session_id: Option<String>,
}

impl CallerContext {
    pub fn anonymous(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            tier: RateLimitTier::Basic,
            subject: None,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugDetails {
    pub drug: Option<Drug>,
    pub hero_case: Option<HeroCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeroAggregates {
    pub total: usize,
    pub average_confidence: f64,
    pub by_evidence_level: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub corpus: CorpusCounts,
    pub heroes: HeroAggregates,
    pub sources: BTreeMap<String, usize>,
}

/// Front door of the engine: admission, cache, pipeline, persistence.
/// Corpus and indexes are published once at construction and read-only
/// afterwards.
pub struct QueryEngine {
    corpus: Arc<Corpus>,
    index: Arc<CorpusIndex>,
    cache: CacheClient,
    limiter: RateLimiter,
    store: Arc<AnalysisStore>,
    live: Option<Arc<LiveEvidenceClients>>,
    search_ttl: u64,
    drug_ttl: u64,
    live_deadline: Duration,
}

impl QueryEngine {
    pub fn new(
        corpus: Arc<Corpus>,
        cache: CacheClient,
        store: Arc<AnalysisStore>,
        live: Option<Arc<LiveEvidenceClients>>,
        config: &AppConfig,
    ) -> Self {
        let index = Arc::new(CorpusIndex::build(&corpus));
        let limiter = RateLimiter::new(cache.clone(), config);
        Self {
            corpus,
            index,
            cache,
            limiter,
            store,
            live,
            search_ttl: config.cache_ttl_search_results,
            drug_ttl: config.cache_ttl_drug_details,
            live_deadline: Duration::from_secs(config.live_evidence_deadline_seconds),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn validate(&self, request: &SearchRequest, normalized: &str) -> Result<(), AppError> {
        if normalized.is_empty() {
            return Err(AppError::Validation("q: query must not be empty".to_string()));
        }
        if request.pagination.limit > MAX_LIMIT {
            return Err(AppError::Validation(format!(
                "limit: must be at most {MAX_LIMIT}"
            )));
        }
        if let Some(min_confidence) = request.filters.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                return Err(AppError::Validation(
                    "min_confidence: must be within [0, 1]".to_string(),
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(identity = %caller.identity, query = %request.query))]
    pub async fn search(
        &self,
        request: SearchRequest,
        caller: &CallerContext,
    ) -> Result<SearchResponse, AppError> {
        let started = Instant::now();
        let normalized = normalize_query(&request.query);
        self.validate(&request, &normalized)?;

        self.limiter.admit(&caller.identity, caller.tier).await?;

        let fingerprint = fingerprint(
            &normalized,
            &request.filters,
            &request.pagination,
            request.want_live_evidence,
        );
        let cache_key = keys::search_results(&fingerprint);

        if let Some(mut cached) = self.cache.get_json::<SearchResponse>(&cache_key).await {
            cached.cache_hit = true;
            cached.artifact_id = None;
            cached.execution_time_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        let outcome = run_search(
            &self.corpus,
            &self.index,
            self.live.as_deref(),
            self.live_deadline,
            &request,
        )
        .await?;

        let mut degraded = outcome.degraded;
        if !self.cache.is_connected() {
            degraded.push(DegradedSource {
                source: "cache".to_string(),
                reason: "not connected".to_string(),
            });
        }

        let mut response = SearchResponse {
            query: request.query.clone(),
            total_results: outcome.total_results,
            matches: outcome.matches,
            execution_time_ms: started.elapsed().as_millis() as u64,
            data_sources: outcome.data_sources,
            degraded,
            cache_hit: false,
            artifact_id: None,
        };

        self.cache
            .set_json(&cache_key, &response, Some(self.search_ttl))
            .await;

        if request.persist {
            let top_confidence = response.matches.first().map(|m| m.confidence);
            let mut artifact = AnalysisArtifact::new(
                ArtifactKind::Search,
                json!({
                    "query": request.query,
                    "filters": request.filters,
                    "pagination": request.pagination,
                    "want_live_evidence": request.want_live_evidence,
                }),
                json!({
                    "total_results": response.total_results,
                    "returned": response.matches.len(),
                    "data_sources": response.data_sources,
                }),
            );
            if let Some(confidence) = top_confidence {
                artifact = artifact.with_confidence(confidence);
            }
            if let Some(subject) = &caller.subject {
                artifact = artifact.with_subject(subject.clone());
            }
            if let Some(session_id) = &caller.session_id {
                artifact = artifact.with_session(session_id.clone());
            }
            response.artifact_id = Some(self.store.insert(artifact).await);
        }

        info!(
            total = response.total_results,
            returned = response.matches.len(),
            elapsed_ms = response.execution_time_ms,
            "search completed"
        );
        Ok(response)
    }

    /// Hero-case and corpus-level fields for one drug.
    pub async fn drug_details(&self, name: &str) -> Result<DrugDetails, AppError> {
        let drug_id = Drug::id_for(name);
        if drug_id.is_empty() {
            return Err(AppError::Validation("name: must not be empty".to_string()));
        }

        let cache_key = keys::drug(&drug_id);
        if let Some(cached) = self.cache.get_json::<DrugDetails>(&cache_key).await {
            return Ok(cached);
        }

        let drug = self
            .index
            .position_by_name(&drug_id)
            .and_then(|position| self.corpus.drugs.get(position))
            .cloned();
        let hero_case = self
            .corpus
            .hero_cases
            .iter()
            .find(|hero| hero.drug_id == drug_id)
            .cloned();

        if drug.is_none() && hero_case.is_none() {
            return Err(AppError::NotFound(format!("drug {name}")));
        }

        let details = DrugDetails { drug, hero_case };
        self.cache
            .set_json(&cache_key, &details, Some(self.drug_ttl))
            .await;
        Ok(details)
    }

    /// Drugs whose exact mechanism string contains the query.
    pub fn drugs_by_mechanism(&self, mechanism_query: &str) -> Vec<Drug> {
        let query = normalize_query(mechanism_query);
        if query.is_empty() {
            return Vec::new();
        }
        let mut results = Vec::new();
        for mechanism in self.index.mechanisms() {
            if mechanism.to_lowercase().contains(&query) {
                for &position in self.index.positions_for_mechanism(mechanism) {
                    if let Some(drug) = self.corpus.drugs.get(position) {
                        results.push(drug.clone());
                    }
                }
            }
        }
        results
    }

    pub fn stats(&self) -> EngineStats {
        let heroes = &self.corpus.hero_cases;
        let average_confidence = if heroes.is_empty() {
            0.0
        } else {
            heroes.iter().map(|h| h.confidence_score).sum::<f64>() / heroes.len() as f64
        };
        let mut by_evidence_level: BTreeMap<String, usize> = BTreeMap::new();
        for hero in heroes {
            let label = serde_json::to_value(hero.evidence_level)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            *by_evidence_level.entry(label).or_default() += 1;
        }

        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        for drug in &self.corpus.drugs {
            *sources.entry(drug.source.as_str().to_string()).or_default() += 1;
        }

        EngineStats {
            corpus: self.corpus.counts(),
            heroes: HeroAggregates {
                total: heroes.len(),
                average_confidence,
                by_evidence_level,
            },
            sources,
        }
    }
}
