mod stages;
mod strategies;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::error::AppError;
use corpus::loader::Corpus;
use corpus::CorpusIndex;
use fetchers::LiveEvidenceClients;
use tracing::instrument;

use crate::fingerprint::normalize_query;
use crate::{DegradedSource, ScoredMatch, SearchRequest};

pub use stages::PipelineContext;
pub use strategies::{CorpusOnlyDriver, LiveEvidenceDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    CollectCandidates,
    HeroMatch,
    Score,
    LiveEvidence,
    Rank,
    Paginate,
}

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError>;
}

pub type BoxedStage = Box<dyn PipelineStage>;

pub trait StrategyDriver: Send + Sync {
    fn stages(&self) -> Vec<BoxedStage>;
}

#[derive(Debug, Default, Clone)]
pub struct PipelineStageTimings {
    timings: Vec<(StageKind, Duration)>,
}

impl PipelineStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn stage_ms(&self, kind: StageKind) -> u128 {
        self.timings
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, d)| d.as_millis())
            .unwrap_or(0)
    }

    pub fn into_vec(self) -> Vec<(StageKind, Duration)> {
        self.timings
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    /// The requested page, already ranked.
    pub matches: Vec<ScoredMatch>,
    /// Result count before pagination.
    pub total_results: usize,
    pub data_sources: Vec<String>,
    pub degraded: Vec<DegradedSource>,
    pub stage_timings: PipelineStageTimings,
}

/// Runs the staged search over the published corpus. Validation of the
/// query and pagination bounds happens in the orchestrator; this layer
/// assumes a well-formed request.
#[instrument(skip_all, fields(query = %request.query))]
pub async fn run_search(
    corpus: &Corpus,
    index: &CorpusIndex,
    live_clients: Option<&LiveEvidenceClients>,
    live_deadline: Duration,
    request: &SearchRequest,
) -> Result<SearchOutcome, AppError> {
    let normalized = normalize_query(&request.query);
    let driver: Box<dyn StrategyDriver> = if request.want_live_evidence && live_clients.is_some() {
        Box::new(LiveEvidenceDriver)
    } else {
        Box::new(CorpusOnlyDriver)
    };

    let mut ctx = PipelineContext::new(
        corpus,
        index,
        live_clients,
        live_deadline,
        request,
        normalized,
    );
    for stage in driver.stages() {
        let start = Instant::now();
        stage.execute(&mut ctx).await?;
        ctx.record_stage_duration(stage.kind(), start.elapsed());
    }

    Ok(ctx.into_outcome())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ConfidenceTier;
    use crate::{MatchOrigin, Pagination, SearchFilters};
    use corpus::types::{ClinicalPhase, Drug, EvidenceLevel, HeroCase, SourceKind};

    fn drug(
        name: &str,
        phase: &str,
        mechanism: &str,
        targets: &[&str],
        disease_area: &str,
        indication: &str,
    ) -> Drug {
        Drug {
            drug_id: Drug::id_for(name),
            name: name.to_string(),
            clinical_phase: ClinicalPhase::from_label(phase),
            phase_label: phase.to_string(),
            mechanism: mechanism.to_string(),
            targets: targets.iter().map(|t| t.to_uppercase()).collect(),
            disease_area: disease_area.to_string(),
            indication: indication.to_string(),
            source: SourceKind::BroadHub,
            oncology: false,
        }
    }

    fn hero(
        name: &str,
        original: &str,
        cancers: &[&str],
        confidence: f64,
        trials: u32,
        citations: u32,
        mechanism: &str,
        pathways: &[&str],
        priority: u32,
    ) -> HeroCase {
        HeroCase {
            drug_id: Drug::id_for(name),
            drug_name: name.to_string(),
            original_indication: original.to_string(),
            repurposed_cancers: cancers.iter().map(|c| (*c).to_string()).collect(),
            confidence_score: confidence,
            trial_count: trials,
            citation_count: citations,
            mechanism: mechanism.to_string(),
            pathways: pathways.iter().map(|p| (*p).to_string()).collect(),
            evidence_level: EvidenceLevel::VeryHigh,
            demo_priority: Some(priority),
        }
    }

    fn fixture() -> Corpus {
        Corpus {
            drugs: vec![
                drug(
                    "Metformin",
                    "Approved",
                    "AMPK activation, mTOR inhibition",
                    &["PRKAA1", "MTOR"],
                    "endocrinology",
                    "type 2 diabetes",
                ),
                drug(
                    "Imatinib",
                    "Approved",
                    "BCR-ABL kinase inhibitor",
                    &["ABL1", "KIT"],
                    "oncology",
                    "chronic myeloid leukemia",
                ),
                drug(
                    "Dasatinib",
                    "Approved",
                    "BCR-ABL kinase inhibitor",
                    &["ABL1", "SRC"],
                    "oncology",
                    "leukemia",
                ),
                drug(
                    "Aspirin",
                    "Approved",
                    "COX inhibitor",
                    &["PTGS1", "PTGS2"],
                    "cardiology",
                    "colorectal cancer",
                ),
                drug(
                    "Volasertib",
                    "Phase 2",
                    "PLK1 inhibitor",
                    &["PLK1"],
                    "oncology",
                    "acute myeloid leukemia",
                ),
                drug(
                    "Salsalate",
                    "Approved",
                    "aspirin-like COX inhibitor",
                    &["PTGS2"],
                    "rheumatology",
                    "osteoarthritis",
                ),
            ],
            hero_cases: vec![
                hero(
                    "Aspirin",
                    "Pain Relief, Cardiovascular Protection",
                    &["Colorectal Cancer"],
                    0.92,
                    89,
                    320,
                    "COX-2 inhibition",
                    &["COX-2/prostaglandin pathway", "Inflammation", "Platelet aggregation"],
                    1,
                ),
                hero(
                    "Metformin",
                    "Type 2 Diabetes",
                    &["Breast Cancer", "Colorectal Cancer"],
                    0.87,
                    156,
                    450,
                    "AMPK activation, mTOR inhibition",
                    &["AMPK signaling", "mTOR pathway", "Insulin/IGF-1 axis"],
                    1,
                ),
            ],
        }
    }

    async fn search(corpus: &Corpus, index: &CorpusIndex, request: &SearchRequest) -> SearchOutcome {
        run_search(corpus, index, None, Duration::from_secs(10), request)
            .await
            .expect("search should not fail")
    }

    #[tokio::test]
    async fn hero_case_dominates_the_ranking() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let outcome = search(&corpus, &index, &SearchRequest::new("aspirin")).await;

        let first = &outcome.matches[0];
        assert_eq!(first.drug_name, "Aspirin");
        assert_eq!(first.cancer_type, "Colorectal Cancer");
        assert_eq!(first.origin, MatchOrigin::Hero);
        assert!(first.confidence >= 0.90);
        assert_eq!(first.tier, ConfidenceTier::VeryHigh);
        assert_eq!(
            first.original_indication.as_deref(),
            Some("Pain Relief, Cardiovascular Protection")
        );

        // Every hero result precedes every non-hero result.
        let first_corpus = outcome
            .matches
            .iter()
            .position(|m| m.origin == MatchOrigin::Corpus);
        let last_hero = outcome
            .matches
            .iter()
            .rposition(|m| m.origin == MatchOrigin::Hero);
        if let (Some(corpus_pos), Some(hero_pos)) = (first_corpus, last_hero) {
            assert!(hero_pos < corpus_pos);
        }
        assert_eq!(outcome.data_sources, vec!["hero_cases", "curated_corpus"]);
    }

    #[tokio::test]
    async fn hero_overrides_the_corpus_match_for_the_same_pair() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let outcome = search(&corpus, &index, &SearchRequest::new("aspirin")).await;

        // The corpus Aspirin record also resolves to colorectal cancer;
        // only the hero entry survives for that (drug, cancer) pair.
        let aspirin_colorectal: Vec<_> = outcome
            .matches
            .iter()
            .filter(|m| {
                m.drug_id == "aspirin" && m.cancer_type.eq_ignore_ascii_case("colorectal cancer")
            })
            .collect();
        assert_eq!(aspirin_colorectal.len(), 1);
        assert_eq!(aspirin_colorectal[0].origin, MatchOrigin::Hero);
    }

    #[tokio::test]
    async fn secondary_strategy_hits_rank_behind_primary_ones() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let outcome = search(&corpus, &index, &SearchRequest::new("aspirin")).await;

        // "Salsalate" only matches through its mechanism text, after the
        // name strategies already produced results.
        let salsalate = outcome
            .matches
            .iter()
            .find(|m| m.drug_id == "salsalate")
            .expect("mechanism match should be present");
        assert!(!salsalate.primary);
        let salsalate_pos = outcome
            .matches
            .iter()
            .position(|m| m.drug_id == "salsalate")
            .unwrap();
        for (position, scored) in outcome.matches.iter().enumerate() {
            if scored.primary {
                assert!(position < salsalate_pos);
            }
        }
    }

    #[tokio::test]
    async fn mechanism_and_target_queries_find_drugs() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);

        let outcome = search(&corpus, &index, &SearchRequest::new("bcr-abl")).await;
        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.drug_id.as_str()).collect();
        assert!(ids.contains(&"imatinib"));
        assert!(ids.contains(&"dasatinib"));

        let outcome = search(&corpus, &index, &SearchRequest::new("PLK1")).await;
        assert!(outcome.matches.iter().any(|m| m.drug_id == "volasertib"));
    }

    #[tokio::test]
    async fn disease_queries_reach_indication_fields() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let outcome = search(&corpus, &index, &SearchRequest::new("leukemia")).await;

        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.drug_id.as_str()).collect();
        assert!(ids.contains(&"imatinib"));
        assert!(ids.contains(&"dasatinib"));
        assert!(ids.contains(&"volasertib"));
    }

    #[tokio::test]
    async fn filters_restrict_results() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);

        // Oncology-only drops the rheumatology mechanism match.
        let mut request = SearchRequest::new("inhibitor");
        request.filters.oncology_only = true;
        let outcome = search(&corpus, &index, &request).await;
        assert!(!outcome.matches.iter().any(|m| m.drug_id == "salsalate"));
        assert!(outcome.matches.iter().any(|m| m.drug_id == "imatinib"));

        // Phase filter keeps only the Phase 2 compound.
        let mut request = SearchRequest::new("leukemia");
        request.filters.phase_in = Some(vec![ClinicalPhase::Phase2]);
        let outcome = search(&corpus, &index, &request).await;
        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.drug_id.as_str()).collect();
        assert_eq!(ids, vec!["volasertib"]);

        // A perfect-confidence floor excludes everything in the fixture.
        let mut request = SearchRequest::new("aspirin");
        request.filters.min_confidence = Some(1.0);
        let outcome = search(&corpus, &index, &request).await;
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.total_results, 0);
    }

    #[tokio::test]
    async fn pagination_windows_the_ranked_list() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);

        let mut request = SearchRequest::new("metformin");
        request.pagination = Pagination { offset: 0, limit: 2 };
        let full = search(&corpus, &index, &SearchRequest::new("metformin")).await;
        let page = search(&corpus, &index, &request).await;

        assert_eq!(page.total_results, full.total_results);
        assert_eq!(page.matches.len(), 2);

        let mut request = SearchRequest::new("metformin");
        request.pagination = Pagination { offset: 0, limit: 0 };
        let empty = search(&corpus, &index, &request).await;
        assert!(empty.matches.is_empty());
        assert_eq!(empty.total_results, full.total_results);

        let mut request = SearchRequest::new("metformin");
        request.pagination = Pagination { offset: 1000, limit: 2 };
        let beyond = search(&corpus, &index, &request).await;
        assert!(beyond.matches.is_empty());
    }

    #[tokio::test]
    async fn repeated_searches_are_stable() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let request = SearchRequest::new("inhibitor");

        let first = search(&corpus, &index, &request).await;
        let second = search(&corpus, &index, &request).await;
        assert_eq!(
            serde_json::to_string(&first.matches).unwrap(),
            serde_json::to_string(&second.matches).unwrap()
        );
        assert_eq!(first.total_results, second.total_results);
    }

    #[tokio::test]
    async fn hero_matches_by_cancer_mechanism_and_pathway() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);

        // Cancer-type query.
        let outcome = search(&corpus, &index, &SearchRequest::new("breast")).await;
        assert!(outcome
            .matches
            .iter()
            .any(|m| m.origin == MatchOrigin::Hero && m.drug_id == "metformin"));

        // Pathway query.
        let outcome = search(&corpus, &index, &SearchRequest::new("ampk signaling")).await;
        assert!(outcome
            .matches
            .iter()
            .any(|m| m.origin == MatchOrigin::Hero && m.drug_id == "metformin"));

        // Hero ordering follows curated confidence.
        let outcome = search(&corpus, &index, &SearchRequest::new("colorectal")).await;
        let heroes: Vec<&str> = outcome
            .matches
            .iter()
            .filter(|m| m.origin == MatchOrigin::Hero)
            .map(|m| m.drug_id.as_str())
            .collect();
        assert_eq!(heroes[0], "aspirin");
    }

    #[tokio::test]
    async fn live_request_without_clients_reports_degradation() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        let mut request = SearchRequest::new("metformin");
        request.want_live_evidence = true;

        let outcome = search(&corpus, &index, &request).await;
        assert!(outcome
            .degraded
            .iter()
            .any(|d| d.source == "live_evidence"));
        // The corpus results still come back.
        assert!(!outcome.matches.is_empty());
    }

    #[tokio::test]
    async fn token_fallback_matches_reordered_words() {
        let corpus = fixture();
        let index = CorpusIndex::build(&corpus);
        // No field contains the literal substring, but both tokens index
        // to the same drugs.
        let outcome = search(&corpus, &index, &SearchRequest::new("inhibitor kinase")).await;
        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.drug_id.as_str()).collect();
        assert!(ids.contains(&"imatinib"));
        assert!(ids.contains(&"dasatinib"));
    }
}
