use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use common::error::AppError;
use corpus::index::tokenize;
use corpus::loader::Corpus;
use corpus::types::{ClinicalPhase, Drug};
use corpus::CorpusIndex;
use fetchers::{FetchOutcome, LiveEvidenceClients};
use tracing::{debug, warn};

use crate::evidence::{
    apply_live_evidence, bundle_from_drug, bundle_from_hero, LiveEvidence,
};
use crate::scoring::{self, ConfidenceTier, EvidenceBundle, ScoreExplanation};
use crate::{
    DegradedSource, MatchOrigin, Pagination, ScoredMatch, SearchFilters, SearchRequest,
};

use super::{PipelineStage, PipelineStageTimings, SearchOutcome, StageKind};

/// Disease-area and indication keywords that mark a drug as
/// oncology-relevant.
const ONCOLOGY_KEYWORDS: &[&str] = &[
    "cancer",
    "tumor",
    "oncology",
    "carcinoma",
    "leukemia",
    "lymphoma",
    "melanoma",
    "sarcoma",
    "glioma",
    "myeloma",
    "blastoma",
    "neoplasm",
    "malignant",
    "metastatic",
];

pub struct PipelineContext<'a> {
    pub corpus: &'a Corpus,
    pub index: &'a CorpusIndex,
    pub live_clients: Option<&'a LiveEvidenceClients>,
    pub live_deadline: Duration,
    /// Normalized query; the raw form stays in `request`.
    pub query: String,
    pub filters: SearchFilters,
    pub pagination: Pagination,
    /// Corpus drug positions with their primary/secondary tier.
    pub corpus_candidates: Vec<(usize, bool)>,
    /// Hero case indices, curated-confidence order.
    pub hero_candidates: Vec<usize>,
    pub matches: Vec<ScoredMatch>,
    pub page: Vec<ScoredMatch>,
    pub total_results: usize,
    pub data_sources: Vec<String>,
    pub degraded: Vec<DegradedSource>,
    stage_timings: PipelineStageTimings,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        corpus: &'a Corpus,
        index: &'a CorpusIndex,
        live_clients: Option<&'a LiveEvidenceClients>,
        live_deadline: Duration,
        request: &SearchRequest,
        normalized_query: String,
    ) -> Self {
        let mut degraded = Vec::new();
        if request.want_live_evidence && live_clients.is_none() {
            degraded.push(DegradedSource {
                source: "live_evidence".to_string(),
                reason: "external clients not configured".to_string(),
            });
        }
        Self {
            corpus,
            index,
            live_clients,
            live_deadline,
            query: normalized_query,
            filters: request.filters.clone(),
            pagination: request.pagination,
            corpus_candidates: Vec::new(),
            hero_candidates: Vec::new(),
            matches: Vec::new(),
            page: Vec::new(),
            total_results: 0,
            data_sources: Vec::new(),
            degraded,
            stage_timings: PipelineStageTimings::default(),
        }
    }

    pub fn record_stage_duration(&mut self, kind: StageKind, duration: Duration) {
        self.stage_timings.record(kind, duration);
    }

    fn add_data_source(&mut self, source: &str) {
        if !self.data_sources.iter().any(|s| s == source) {
            self.data_sources.push(source.to_string());
        }
    }

    fn drug_for_match(&self, scored: &ScoredMatch) -> Option<&'a Drug> {
        let position = self.index.position_by_name(&scored.drug_id)?;
        self.corpus.drugs.get(position)
    }

    pub fn into_outcome(self) -> SearchOutcome {
        SearchOutcome {
            matches: self.page,
            total_results: self.total_results,
            data_sources: self.data_sources,
            degraded: self.degraded,
            stage_timings: self.stage_timings,
        }
    }
}

/// Runs the corpus strategies in order. The first strategy that yields
/// anything marks its hits as the primary tier; everything later is
/// secondary.
pub struct CollectCandidatesStage;

#[async_trait]
impl PipelineStage for CollectCandidatesStage {
    fn kind(&self) -> StageKind {
        StageKind::CollectCandidates
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let query = ctx.query.clone();
        if query.is_empty() {
            return Ok(());
        }

        let mut seen: HashSet<usize> = HashSet::new();
        let mut candidates: Vec<(usize, bool)> = Vec::new();
        let mut primary_taken = false;

        let mut absorb = |positions: Vec<usize>,
                          seen: &mut HashSet<usize>,
                          candidates: &mut Vec<(usize, bool)>| {
            let mut added = false;
            let primary = !primary_taken;
            for position in positions {
                if seen.insert(position) {
                    candidates.push((position, primary));
                    added = true;
                }
            }
            if added && primary {
                primary_taken = true;
            }
        };

        // 1. Exact name.
        let exact: Vec<usize> = ctx.index.position_by_name(&query).into_iter().collect();
        absorb(exact, &mut seen, &mut candidates);

        // 2. Name substring.
        let by_name: Vec<usize> = ctx
            .corpus
            .drugs
            .iter()
            .enumerate()
            .filter(|(_, drug)| drug.drug_id.contains(&query))
            .map(|(position, _)| position)
            .collect();
        absorb(by_name, &mut seen, &mut candidates);

        // 3. Mechanism substring.
        let mut by_mechanism = Vec::new();
        for mechanism in ctx.index.mechanisms() {
            if mechanism.to_lowercase().contains(&query) {
                by_mechanism.extend_from_slice(ctx.index.positions_for_mechanism(mechanism));
            }
        }
        absorb(by_mechanism, &mut seen, &mut candidates);

        // 4. Target substring, uppercased.
        let query_upper = query.to_uppercase();
        let mut by_target = Vec::new();
        for target in ctx.index.targets() {
            if target.contains(&query_upper) {
                by_target.extend_from_slice(ctx.index.positions_for_target(target));
            }
        }
        absorb(by_target, &mut seen, &mut candidates);

        // 5. Disease area / indication substring.
        let by_disease: Vec<usize> = ctx
            .corpus
            .drugs
            .iter()
            .enumerate()
            .filter(|(_, drug)| {
                drug.disease_area.to_lowercase().contains(&query)
                    || drug.indication.to_lowercase().contains(&query)
            })
            .map(|(position, _)| position)
            .collect();
        absorb(by_disease, &mut seen, &mut candidates);

        // Token fallback for multi-word queries whose words appear out of
        // order ("inhibitor kinase"): every token must hit the inverted
        // index.
        if candidates.is_empty() {
            let tokens: Vec<String> = tokenize(&query).collect();
            if tokens.len() > 1 {
                let mut intersection: Option<Vec<usize>> = None;
                for token in &tokens {
                    let positions: HashSet<usize> =
                        ctx.index.positions_for_token(token).iter().copied().collect();
                    intersection = Some(match intersection {
                        None => {
                            let mut initial: Vec<usize> =
                                positions.into_iter().collect();
                            initial.sort_unstable();
                            initial
                        }
                        Some(current) => current
                            .into_iter()
                            .filter(|position| positions.contains(position))
                            .collect(),
                    });
                }
                absorb(
                    intersection.unwrap_or_default(),
                    &mut seen,
                    &mut candidates,
                );
            }
        }

        debug!(
            query = %query,
            candidates = candidates.len(),
            "corpus candidates collected"
        );
        ctx.corpus_candidates = candidates;
        Ok(())
    }
}

/// Scans the hero cases with their own match rule and orders hits by
/// curated confidence, stable on ties.
pub struct HeroMatchStage;

#[async_trait]
impl PipelineStage for HeroMatchStage {
    fn kind(&self) -> StageKind {
        StageKind::HeroMatch
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let query = &ctx.query;
        if query.is_empty() {
            return Ok(());
        }

        let mut hits: Vec<usize> = ctx
            .corpus
            .hero_cases
            .iter()
            .enumerate()
            .filter(|(_, hero)| {
                hero.drug_name.to_lowercase().contains(query)
                    || hero
                        .repurposed_cancers
                        .iter()
                        .any(|cancer| cancer.to_lowercase().contains(query))
                    || hero.mechanism.to_lowercase().contains(query)
                    || hero
                        .pathways
                        .iter()
                        .any(|pathway| pathway.to_lowercase().contains(query))
            })
            .map(|(position, _)| position)
            .collect();

        hits.sort_by(|a, b| {
            ctx.corpus.hero_cases[*b]
                .confidence_score
                .total_cmp(&ctx.corpus.hero_cases[*a].confidence_score)
        });

        ctx.hero_candidates = hits;
        Ok(())
    }
}

/// Explanation for a hero match: the factor breakdown comes from the
/// hero's own bundle, the headline score stays curated.
fn hero_explanation(bundle: &EvidenceBundle, curated: f64) -> ScoreExplanation {
    let mut explanation = scoring::explain(bundle);
    explanation.overall_score = (curated * 100.0).round() / 100.0;
    explanation.tier = ConfidenceTier::from_score(curated);
    explanation
}

fn corpus_cancer_type(drug: &Drug) -> String {
    if !drug.indication.is_empty() {
        drug.indication.clone()
    } else if !drug.disease_area.is_empty() {
        drug.disease_area.clone()
    } else {
        "unspecified".to_string()
    }
}

/// Synthesizes evidence bundles and turns candidates into scored
/// matches, heroes first.
pub struct ScoreStage;

#[async_trait]
impl PipelineStage for ScoreStage {
    fn kind(&self) -> StageKind {
        StageKind::Score
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        if !ctx.hero_candidates.is_empty() {
            ctx.add_data_source("hero_cases");
        }
        if !ctx.corpus_candidates.is_empty() {
            ctx.add_data_source("curated_corpus");
        }

        let mut matches = Vec::new();

        for &hero_idx in &ctx.hero_candidates {
            let hero = &ctx.corpus.hero_cases[hero_idx];
            let bundle = bundle_from_hero(hero);
            let explanation = hero_explanation(&bundle, hero.confidence_score);
            for cancer in &hero.repurposed_cancers {
                matches.push(ScoredMatch {
                    drug_id: hero.drug_id.clone(),
                    drug_name: hero.drug_name.clone(),
                    cancer_type: cancer.clone(),
                    confidence: hero.confidence_score,
                    tier: ConfidenceTier::from_score(hero.confidence_score),
                    explanation: explanation.clone(),
                    evidence: bundle.clone(),
                    origin: MatchOrigin::Hero,
                    primary: true,
                    demo_priority: hero.demo_priority,
                    original_indication: Some(hero.original_indication.clone()),
                });
            }
        }

        for &(position, primary) in &ctx.corpus_candidates {
            let drug = &ctx.corpus.drugs[position];
            let bundle = bundle_from_drug(drug);
            let confidence = scoring::confidence(&bundle);
            matches.push(ScoredMatch {
                drug_id: drug.drug_id.clone(),
                drug_name: drug.name.clone(),
                cancer_type: corpus_cancer_type(drug),
                confidence,
                tier: ConfidenceTier::from_score(confidence),
                explanation: scoring::explain(&bundle),
                evidence: bundle,
                origin: MatchOrigin::Corpus,
                primary,
                demo_priority: None,
                original_indication: None,
            });
        }

        ctx.matches = matches;
        Ok(())
    }
}

/// Fans out to the external providers under the shared deadline and
/// folds contributions into matching bundles, then re-scores.
pub struct LiveEvidenceStage;

#[async_trait]
impl PipelineStage for LiveEvidenceStage {
    fn kind(&self) -> StageKind {
        StageKind::LiveEvidence
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let Some(clients) = ctx.live_clients else {
            return Ok(());
        };
        if ctx.matches.is_empty() {
            return Ok(());
        }

        let query = ctx.query.clone();
        let pubmed_query = format!("{query} AND cancer");
        let fan_out = async {
            tokio::join!(
                clients.pubmed.search_papers(&pubmed_query, 20),
                clients.clinicaltrials.search_trials(&query, None, 25),
                clients.drugbank.search_drugs(&query, 5),
            )
        };

        let mut live = LiveEvidence::default();
        match tokio::time::timeout(ctx.live_deadline, fan_out).await {
            Ok((papers, trials, drug_records)) => {
                match papers {
                    FetchOutcome::Ok(records) => {
                        if !records.is_empty() {
                            ctx.add_data_source("PubMed");
                        }
                        live.papers = records;
                    }
                    FetchOutcome::Degraded { reason } => ctx.degraded.push(DegradedSource {
                        source: "pubmed".to_string(),
                        reason,
                    }),
                }
                match trials {
                    FetchOutcome::Ok(records) => {
                        if !records.is_empty() {
                            ctx.add_data_source("ClinicalTrials.gov");
                        }
                        live.trials = records;
                    }
                    FetchOutcome::Degraded { reason } => ctx.degraded.push(DegradedSource {
                        source: "clinicaltrials".to_string(),
                        reason,
                    }),
                }
                match drug_records {
                    Ok(FetchOutcome::Ok(records)) => {
                        if !records.is_empty() {
                            ctx.add_data_source("DrugBank");
                        }
                        live.drugs = records;
                    }
                    Ok(FetchOutcome::Degraded { reason }) => ctx.degraded.push(DegradedSource {
                        source: "drugbank".to_string(),
                        reason,
                    }),
                    // Missing credentials surface as the provider being
                    // unavailable, never as a global failure.
                    Err(e) => ctx.degraded.push(DegradedSource {
                        source: "drugbank".to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
            Err(_) => {
                warn!(deadline_ms = ctx.live_deadline.as_millis() as u64, "live evidence deadline exceeded");
                ctx.degraded.push(DegradedSource {
                    source: "live_evidence".to_string(),
                    reason: "shared deadline exceeded".to_string(),
                });
                return Ok(());
            }
        }

        if live.is_empty() {
            return Ok(());
        }

        for scored in &mut ctx.matches {
            if !apply_live_evidence(&mut scored.evidence, &scored.drug_name, &live) {
                continue;
            }
            match scored.origin {
                MatchOrigin::Hero => {
                    // The curated score still wins; only the breakdown
                    // reflects the enriched bundle.
                    scored.explanation = hero_explanation(&scored.evidence, scored.confidence);
                }
                MatchOrigin::Corpus | MatchOrigin::ExternalOnly => {
                    scored.confidence = scoring::confidence(&scored.evidence);
                    scored.tier = ConfidenceTier::from_score(scored.confidence);
                    scored.explanation = scoring::explain(&scored.evidence);
                }
            }
        }
        Ok(())
    }
}

fn is_oncology_text(text: &str) -> bool {
    let text = text.to_lowercase();
    ONCOLOGY_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Filters, ranks, and deduplicates the assembled matches.
pub struct RankStage;

#[async_trait]
impl PipelineStage for RankStage {
    fn kind(&self) -> StageKind {
        StageKind::Rank
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let filters = ctx.filters.clone();
        let mut matches = std::mem::take(&mut ctx.matches);

        matches.retain(|scored| {
            if filters.oncology_only {
                let oncology = match scored.origin {
                    MatchOrigin::Hero => true,
                    _ => ctx.drug_for_match(scored).is_some_and(|drug| {
                        is_oncology_text(&drug.disease_area)
                            || is_oncology_text(&drug.indication)
                    }),
                };
                if !oncology {
                    return false;
                }
            }
            if let Some(min_confidence) = filters.min_confidence {
                if scored.confidence < min_confidence {
                    return false;
                }
            }
            if let Some(phases) = &filters.phase_in {
                let phase = ctx
                    .drug_for_match(scored)
                    .map(|drug| drug.clinical_phase)
                    .unwrap_or_else(|| ClinicalPhase::from_label(&scored.evidence.phase));
                // Heroes without a corpus record carry no phase enum and
                // are not filtered out.
                if !(scored.origin == MatchOrigin::Hero
                    && ctx.drug_for_match(scored).is_none())
                    && !phases.contains(&phase)
                {
                    return false;
                }
            }
            true
        });

        matches.sort_by(|a, b| {
            b.primary
                .cmp(&a.primary)
                .then_with(|| {
                    (b.origin == MatchOrigin::Hero).cmp(&(a.origin == MatchOrigin::Hero))
                })
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| {
                    a.demo_priority
                        .unwrap_or(u32::MAX)
                        .cmp(&b.demo_priority.unwrap_or(u32::MAX))
                })
                .then_with(|| a.drug_id.cmp(&b.drug_id))
        });

        // One entry per (drug, cancer) pair; after sorting, the retained
        // entry is the highest-ranked one, so a hero always overrides the
        // corpus match for its pair.
        let mut seen_pairs = HashSet::new();
        matches.retain(|scored| {
            seen_pairs.insert((scored.drug_id.clone(), scored.cancer_type.to_lowercase()))
        });

        ctx.total_results = matches.len();
        ctx.matches = matches;
        Ok(())
    }
}

/// Applies the validated offset/limit window.
pub struct PaginateStage;

#[async_trait]
impl PipelineStage for PaginateStage {
    fn kind(&self) -> StageKind {
        StageKind::Paginate
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), AppError> {
        let offset = ctx.pagination.offset.min(ctx.matches.len());
        let end = offset
            .saturating_add(ctx.pagination.limit)
            .min(ctx.matches.len());
        ctx.page = ctx.matches[offset..end].to_vec();
        Ok(())
    }
}
