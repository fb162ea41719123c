//! Adapters assembling an [`EvidenceBundle`] from each source of signal:
//! curated corpus records, hero cases, and live provider fetches.

use corpus::types::{ClinicalPhase, Drug, HeroCase};
use fetchers::{DrugRecord, Paper, Trial};

use crate::scoring::EvidenceBundle;

/// Mechanism strings in the curated data are comma-separated pathway
/// descriptions ("AMPK activation, mTOR inhibition").
pub fn split_pathways(mechanism: &str) -> Vec<String> {
    mechanism
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn bundle_from_drug(drug: &Drug) -> EvidenceBundle {
    EvidenceBundle {
        phase: drug.phase_label.clone(),
        trial_count: 0,
        citation_count: 0,
        sources: vec![drug.source.as_str().to_string()],
        pathways: split_pathways(&drug.mechanism),
    }
}

pub fn bundle_from_hero(hero: &HeroCase) -> EvidenceBundle {
    EvidenceBundle {
        phase: String::new(),
        trial_count: hero.trial_count,
        citation_count: hero.citation_count,
        sources: Vec::new(),
        pathways: hero.pathways.clone(),
    }
}

/// Everything the live fan-out returned, before per-match attribution.
#[derive(Debug, Default)]
pub struct LiveEvidence {
    pub papers: Vec<Paper>,
    pub trials: Vec<Trial>,
    pub drugs: Vec<DrugRecord>,
}

impl LiveEvidence {
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty() && self.trials.is_empty() && self.drugs.is_empty()
    }
}

fn push_source(bundle: &mut EvidenceBundle, source: &str) {
    if !bundle.sources.iter().any(|s| s == source) {
        bundle.sources.push(source.to_string());
    }
}

/// Folds fetched records into the bundle of the match whose drug name
/// they mention (case-insensitive substring). Missing contributions
/// leave the bundle untouched, they never penalize.
pub fn apply_live_evidence(
    bundle: &mut EvidenceBundle,
    drug_name: &str,
    live: &LiveEvidence,
) -> bool {
    let needle = drug_name.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let mut changed = false;

    let cited: u32 = live
        .papers
        .iter()
        .filter(|paper| paper.title.to_lowercase().contains(&needle))
        .map(|paper| paper.citation_count.max(1))
        .sum();
    if cited > 0 {
        bundle.citation_count = bundle.citation_count.saturating_add(cited);
        push_source(bundle, "PubMed");
        changed = true;
    }

    let trial_hits = live
        .trials
        .iter()
        .filter(|trial| trial.title.to_lowercase().contains(&needle))
        .count() as u32;
    if trial_hits > 0 {
        bundle.trial_count = bundle.trial_count.max(trial_hits);
        push_source(bundle, "ClinicalTrials.gov");
        changed = true;
    }

    for record in &live.drugs {
        if !record.name.to_lowercase().contains(&needle) {
            continue;
        }
        push_source(bundle, "DrugBank");
        // An authoritative approval upgrades an otherwise unknown phase.
        if record.approval_status.eq_ignore_ascii_case("approved")
            && ClinicalPhase::from_label(&bundle.phase) == ClinicalPhase::Unknown
        {
            bundle.phase = "Approved".to_string();
        }
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::types::{EvidenceLevel, SourceKind};

    fn sample_drug() -> Drug {
        Drug {
            drug_id: "metformin".to_string(),
            name: "Metformin".to_string(),
            clinical_phase: ClinicalPhase::Approved,
            phase_label: "Approved".to_string(),
            mechanism: "AMPK activation, mTOR inhibition".to_string(),
            targets: vec!["PRKAA1".to_string()],
            disease_area: "endocrinology".to_string(),
            indication: "type 2 diabetes".to_string(),
            source: SourceKind::BroadHub,
            oncology: false,
        }
    }

    #[test]
    fn corpus_bundle_uses_curated_fields_and_zero_defaults() {
        let bundle = bundle_from_drug(&sample_drug());
        assert_eq!(bundle.phase, "Approved");
        assert_eq!(bundle.trial_count, 0);
        assert_eq!(bundle.citation_count, 0);
        assert_eq!(bundle.sources, vec!["broad_hub"]);
        assert_eq!(bundle.pathways, vec!["AMPK activation", "mTOR inhibition"]);
    }

    #[test]
    fn hero_bundle_carries_curated_counts() {
        let hero = HeroCase {
            drug_id: "aspirin".to_string(),
            drug_name: "Aspirin".to_string(),
            original_indication: "Pain Relief".to_string(),
            repurposed_cancers: vec!["Colorectal Cancer".to_string()],
            confidence_score: 0.92,
            trial_count: 89,
            citation_count: 320,
            mechanism: "COX-2 inhibition".to_string(),
            pathways: vec!["COX-2/prostaglandin pathway".to_string()],
            evidence_level: EvidenceLevel::VeryHigh,
            demo_priority: Some(1),
        };
        let bundle = bundle_from_hero(&hero);
        assert_eq!(bundle.trial_count, 89);
        assert_eq!(bundle.citation_count, 320);
        assert_eq!(bundle.pathways.len(), 1);
    }

    #[test]
    fn live_evidence_attributes_by_drug_name_substring() {
        let live = LiveEvidence {
            papers: vec![
                Paper {
                    pmid: "1".to_string(),
                    title: "Metformin and breast cancer incidence".to_string(),
                    citation_count: 40,
                    ..Paper::default()
                },
                Paper {
                    pmid: "2".to_string(),
                    title: "Unrelated statin study".to_string(),
                    citation_count: 90,
                    ..Paper::default()
                },
            ],
            trials: vec![Trial {
                nct_id: "NCT1".to_string(),
                title: "Phase 3 metformin adjuvant trial".to_string(),
                ..Trial::default()
            }],
            drugs: vec![DrugRecord {
                name: "Metformin".to_string(),
                approval_status: "Approved".to_string(),
                ..DrugRecord::default()
            }],
        };

        let mut bundle = EvidenceBundle::default();
        let changed = apply_live_evidence(&mut bundle, "Metformin", &live);
        assert!(changed);
        assert_eq!(bundle.citation_count, 40);
        assert_eq!(bundle.trial_count, 1);
        assert_eq!(bundle.phase, "Approved");
        assert_eq!(
            bundle.sources,
            vec!["PubMed", "ClinicalTrials.gov", "DrugBank"]
        );

        // A drug nothing mentions is left untouched.
        let mut untouched = EvidenceBundle::default();
        assert!(!apply_live_evidence(&mut untouched, "Volasertib", &live));
        assert_eq!(untouched, EvidenceBundle::default());
    }
}
