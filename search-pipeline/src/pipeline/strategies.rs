use super::stages::{
    CollectCandidatesStage, HeroMatchStage, LiveEvidenceStage, PaginateStage, RankStage,
    ScoreStage,
};
use super::{BoxedStage, StrategyDriver};

/// In-memory search over the curated corpus and hero cases only.
pub struct CorpusOnlyDriver;

impl StrategyDriver for CorpusOnlyDriver {
    fn stages(&self) -> Vec<BoxedStage> {
        vec![
            Box::new(CollectCandidatesStage),
            Box::new(HeroMatchStage),
            Box::new(ScoreStage),
            Box::new(RankStage),
            Box::new(PaginateStage),
        ]
    }
}

/// Corpus search enriched with the bounded external fan-out before
/// ranking.
pub struct LiveEvidenceDriver;

impl StrategyDriver for LiveEvidenceDriver {
    fn stages(&self) -> Vec<BoxedStage> {
        vec![
            Box::new(CollectCandidatesStage),
            Box::new(HeroMatchStage),
            Box::new(ScoreStage),
            Box::new(LiveEvidenceStage),
            Box::new(RankStage),
            Box::new(PaginateStage),
        ]
    }
}
