//! Rule-based confidence scoring. No model inference, just weighted
//! heuristics over the evidence signals; the same bundle always produces
//! the same output.

use serde::{Deserialize, Serialize};

pub const PHASE_WEIGHT: f64 = 0.40;
pub const TRIAL_WEIGHT: f64 = 0.20;
pub const CITATION_WEIGHT: f64 = 0.15;
pub const SOURCE_WEIGHT: f64 = 0.15;
pub const MECHANISM_WEIGHT: f64 = 0.10;

/// The structured signal set fed to the scorer. Assembled by one adapter
/// per source (corpus record, hero case, live evidence) in
/// [`crate::evidence`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceBundle {
    pub phase: String,
    pub trial_count: u32,
    pub citation_count: u32,
    pub sources: Vec<String>,
    pub pathways: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ConfidenceTier {
    /// Lower-inclusive thresholds.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::VeryHigh
        } else if score >= 0.70 {
            Self::High
        } else if score >= 0.55 {
            Self::Moderate
        } else if score >= 0.40 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring match against the phase label, most
/// advanced stage first, so "Phase 3/Prevention Studies" counts as
/// Phase 3.
pub fn score_phase(phase: &str) -> f64 {
    let phase = phase.to_lowercase();
    if phase.contains("approved") {
        1.0
    } else if phase.contains("phase 3") {
        0.85
    } else if phase.contains("phase 2") {
        0.65
    } else if phase.contains("phase 1") {
        0.45
    } else if phase.contains("preclinical") {
        0.25
    } else {
        0.10
    }
}

pub fn score_trial_count(count: u32) -> f64 {
    match count {
        100.. => 1.0,
        50.. => 0.85,
        20.. => 0.70,
        10.. => 0.55,
        5.. => 0.40,
        1.. => 0.25,
        0 => 0.0,
    }
}

pub fn score_citations(count: u32) -> f64 {
    match count {
        300.. => 1.0,
        150.. => 0.85,
        75.. => 0.70,
        30.. => 0.55,
        10.. => 0.40,
        1.. => 0.25,
        0 => 0.0,
    }
}

fn source_credibility(source: &str) -> f64 {
    let source = source.to_lowercase();
    if source.contains("repodb") {
        0.95
    } else if source.contains("fda") {
        1.0
    } else if source.contains("clinicaltrials") {
        0.90
    } else if source.contains("redo") {
        0.85
    } else if source.contains("broad") {
        0.80
    } else if source.contains("pubmed") {
        0.75
    } else {
        0.50
    }
}

/// Average of the three most credible sources; no sources means no
/// signal.
pub fn score_sources(sources: &[String]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let mut credibilities: Vec<f64> = sources.iter().map(|s| source_credibility(s)).collect();
    credibilities.sort_by(|a, b| b.total_cmp(a));
    let top = &credibilities[..credibilities.len().min(3)];
    top.iter().sum::<f64>() / top.len() as f64
}

/// More characterized pathways read as a better understood mechanism.
pub fn score_mechanism(pathways: &[String]) -> f64 {
    match pathways.len() {
        4.. => 1.0,
        3 => 0.85,
        2 => 0.70,
        1 => 0.55,
        0 => 0.30,
    }
}

pub fn confidence(bundle: &EvidenceBundle) -> f64 {
    let total = score_phase(&bundle.phase) * PHASE_WEIGHT
        + score_trial_count(bundle.trial_count) * TRIAL_WEIGHT
        + score_citations(bundle.citation_count) * CITATION_WEIGHT
        + score_sources(&bundle.sources) * SOURCE_WEIGHT
        + score_mechanism(&bundle.pathways) * MECHANISM_WEIGHT;
    total.clamp(0.0, 1.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FactorScore {
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl FactorScore {
    fn new(score: f64, weight: f64) -> Self {
        Self {
            score: round2(score),
            weight,
            contribution: round2(score * weight),
        }
    }
}

/// Per-factor breakdown of a confidence score, rounded to two decimals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreExplanation {
    pub overall_score: f64,
    pub tier: ConfidenceTier,
    pub clinical_phase: FactorScore,
    pub trial_count: FactorScore,
    pub citations: FactorScore,
    pub data_sources: FactorScore,
    pub mechanism: FactorScore,
}

pub fn explain(bundle: &EvidenceBundle) -> ScoreExplanation {
    let overall = confidence(bundle);
    ScoreExplanation {
        overall_score: round2(overall),
        tier: ConfidenceTier::from_score(overall),
        clinical_phase: FactorScore::new(score_phase(&bundle.phase), PHASE_WEIGHT),
        trial_count: FactorScore::new(score_trial_count(bundle.trial_count), TRIAL_WEIGHT),
        citations: FactorScore::new(score_citations(bundle.citation_count), CITATION_WEIGHT),
        data_sources: FactorScore::new(score_sources(&bundle.sources), SOURCE_WEIGHT),
        mechanism: FactorScore::new(score_mechanism(&bundle.pathways), MECHANISM_WEIGHT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(
        phase: &str,
        trials: u32,
        citations: u32,
        sources: &[&str],
        pathways: &[&str],
    ) -> EvidenceBundle {
        EvidenceBundle {
            phase: phase.to_string(),
            trial_count: trials,
            citation_count: citations,
            sources: sources.iter().map(|s| (*s).to_string()).collect(),
            pathways: pathways.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn approved_drug_with_no_other_evidence_scores_0_43() {
        let bundle = bundle("Approved", 0, 0, &[], &[]);
        let score = confidence(&bundle);
        assert!((score - 0.43).abs() < 1e-9, "got {score}");
        assert_eq!(ConfidenceTier::from_score(score), ConfidenceTier::Low);
    }

    #[test]
    fn phase_two_with_multi_source_evidence() {
        let bundle = bundle(
            "Phase 2",
            20,
            30,
            &["repoDB", "ClinicalTrials.gov", "ReDO_DB"],
            &["A", "B", "C"],
        );
        assert!((score_phase(&bundle.phase) - 0.65).abs() < 1e-9);
        assert!((score_trial_count(bundle.trial_count) - 0.70).abs() < 1e-9);
        assert!((score_citations(bundle.citation_count) - 0.55).abs() < 1e-9);
        assert!((score_sources(&bundle.sources) - 0.90).abs() < 1e-9);
        assert!((score_mechanism(&bundle.pathways) - 0.85).abs() < 1e-9);

        let score = confidence(&bundle);
        let expected = 0.40 * 0.65 + 0.20 * 0.70 + 0.15 * 0.55 + 0.15 * 0.90 + 0.10 * 0.85;
        assert!((score - expected).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn metformin_case_scores_very_high() {
        let bundle = bundle(
            "Phase 3",
            156,
            450,
            &["repoDB", "ClinicalTrials.gov", "ReDO_DB"],
            &["AMPK signaling", "mTOR pathway", "Insulin/IGF-1 axis"],
        );
        let score = confidence(&bundle);
        assert!(score >= 0.85, "got {score}");
        assert_eq!(ConfidenceTier::from_score(score), ConfidenceTier::VeryHigh);
    }

    #[test]
    fn confidence_is_always_in_unit_interval() {
        let bundles = [
            bundle("", 0, 0, &[], &[]),
            bundle("Approved", u32::MAX, u32::MAX, &["FDA", "FDA", "FDA", "FDA"], &["a", "b", "c", "d", "e"]),
            bundle("Launched", 3, 12, &["unknown source"], &["one"]),
        ];
        for b in &bundles {
            let score = confidence(b);
            assert!((0.0..=1.0).contains(&score), "out of bounds: {score}");
        }
    }

    #[test]
    fn source_averaging_takes_top_three() {
        // FDA 1.0, repoDB 0.95, ClinicalTrials 0.90 are kept; PubMed 0.75 is not.
        let sources: Vec<String> = ["PubMed", "FDA", "repoDB", "ClinicalTrials.gov"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let expected = (1.0 + 0.95 + 0.90) / 3.0;
        assert!((score_sources(&sources) - expected).abs() < 1e-9);

        let single = vec!["some preclinical registry".to_string()];
        assert!((score_sources(&single) - 0.50).abs() < 1e-9);
    }

    #[test]
    fn tier_thresholds_are_lower_inclusive() {
        assert_eq!(ConfidenceTier::from_score(0.85), ConfidenceTier::VeryHigh);
        assert_eq!(ConfidenceTier::from_score(0.84999), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.70), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.55), ConfidenceTier::Moderate);
        assert_eq!(ConfidenceTier::from_score(0.40), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0.39999), ConfidenceTier::VeryLow);
    }

    #[test]
    fn explanations_are_deterministic_and_rounded() {
        let bundle = bundle(
            "Phase 3",
            156,
            450,
            &["repoDB", "ClinicalTrials.gov"],
            &["AMPK signaling"],
        );
        let first = serde_json::to_string(&explain(&bundle)).unwrap();
        let second = serde_json::to_string(&explain(&bundle)).unwrap();
        assert_eq!(first, second);

        let explanation = explain(&bundle);
        assert!((explanation.clinical_phase.contribution - 0.34).abs() < 1e-9);
        assert!((explanation.trial_count.contribution - 0.20).abs() < 1e-9);
        assert_eq!(
            serde_json::to_value(explanation.tier).unwrap(),
            serde_json::json!("Very High")
        );
    }
}
