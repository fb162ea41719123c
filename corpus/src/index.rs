use std::collections::HashMap;

use crate::loader::Corpus;
use crate::types::ClinicalPhase;

/// Read-only lookup structures over the corpus, built once after load.
/// Values are positions into `Corpus::drugs`, kept in dataset order so
/// scans and tie-breaks stay stable across runs.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    by_name: HashMap<String, usize>,
    mechanism_order: Vec<String>,
    by_mechanism: HashMap<String, Vec<usize>>,
    target_order: Vec<String>,
    by_target: HashMap<String, Vec<usize>>,
    by_phase: HashMap<ClinicalPhase, Vec<usize>>,
    token_index: HashMap<String, Vec<usize>>,
}

/// Lowercased alphanumeric tokens; the same split is applied to indexed
/// text and to queries.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl CorpusIndex {
    pub fn build(corpus: &Corpus) -> Self {
        use std::collections::hash_map::Entry;

        let mut by_name = HashMap::new();
        let mut mechanism_order = Vec::new();
        let mut by_mechanism: HashMap<String, Vec<usize>> = HashMap::new();
        let mut target_order = Vec::new();
        let mut by_target: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_phase: HashMap<ClinicalPhase, Vec<usize>> = HashMap::new();
        let mut token_index: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, drug) in corpus.drugs.iter().enumerate() {
            by_name.insert(drug.drug_id.clone(), position);

            if !drug.mechanism.is_empty() {
                let bucket = match by_mechanism.entry(drug.mechanism.clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        mechanism_order.push(drug.mechanism.clone());
                        entry.insert(Vec::new())
                    }
                };
                if bucket.last() != Some(&position) {
                    bucket.push(position);
                }
            }

            for target in &drug.targets {
                let bucket = match by_target.entry(target.clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        target_order.push(target.clone());
                        entry.insert(Vec::new())
                    }
                };
                if bucket.last() != Some(&position) {
                    bucket.push(position);
                }
            }

            by_phase.entry(drug.clinical_phase).or_default().push(position);

            for token in tokenize(&drug.name).chain(tokenize(&drug.mechanism)) {
                let bucket = token_index.entry(token).or_default();
                if bucket.last() != Some(&position) {
                    bucket.push(position);
                }
            }
        }

        Self {
            by_name,
            mechanism_order,
            by_mechanism,
            target_order,
            by_target,
            by_phase,
            token_index,
        }
    }

    /// Exact lookup; the argument must already be normalized to lowercase.
    pub fn position_by_name(&self, normalized_name: &str) -> Option<usize> {
        self.by_name.get(normalized_name).copied()
    }

    /// Mechanism keys in first-appearance order.
    pub fn mechanisms(&self) -> &[String] {
        &self.mechanism_order
    }

    pub fn positions_for_mechanism(&self, mechanism: &str) -> &[usize] {
        self.by_mechanism
            .get(mechanism)
            .map_or(&[], Vec::as_slice)
    }

    /// Target symbols in first-appearance order.
    pub fn targets(&self) -> &[String] {
        &self.target_order
    }

    pub fn positions_for_target(&self, target: &str) -> &[usize] {
        self.by_target.get(target).map_or(&[], Vec::as_slice)
    }

    pub fn positions_in_phase(&self, phase: ClinicalPhase) -> &[usize] {
        self.by_phase.get(&phase).map_or(&[], Vec::as_slice)
    }

    pub fn positions_for_token(&self, token: &str) -> &[usize] {
        self.token_index.get(token).map_or(&[], Vec::as_slice)
    }

    pub fn mechanism_count(&self) -> usize {
        self.by_mechanism.len()
    }

    pub fn target_count(&self) -> usize {
        self.by_target.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Drug, SourceKind};

    fn drug(name: &str, phase: &str, moa: &str, targets: &str) -> Drug {
        Drug {
            drug_id: Drug::id_for(name),
            name: name.to_string(),
            clinical_phase: ClinicalPhase::from_label(phase),
            phase_label: phase.to_string(),
            mechanism: moa.to_string(),
            targets: targets
                .split('|')
                .filter(|t| !t.is_empty())
                .map(|t| t.trim().to_uppercase())
                .collect(),
            disease_area: String::new(),
            indication: String::new(),
            source: SourceKind::BroadHub,
            oncology: false,
        }
    }

    fn corpus() -> Corpus {
        Corpus {
            drugs: vec![
                drug("Metformin", "Approved", "AMPK activator", "PRKAA1|PRKAA2"),
                drug("Imatinib", "Approved", "BCR-ABL kinase inhibitor", "ABL1|KIT"),
                drug("Dasatinib", "Approved", "BCR-ABL kinase inhibitor", "ABL1|SRC"),
                drug("Volasertib", "Phase 2", "PLK1 inhibitor", "PLK1"),
            ],
            hero_cases: Vec::new(),
        }
    }

    #[test]
    fn exact_name_lookup_uses_normalized_keys() {
        let corpus = corpus();
        let index = CorpusIndex::build(&corpus);
        assert_eq!(index.position_by_name("metformin"), Some(0));
        assert_eq!(index.position_by_name("Metformin"), None);
        assert_eq!(index.position_by_name("missing"), None);
    }

    #[test]
    fn mechanism_buckets_preserve_insertion_order() {
        let corpus = corpus();
        let index = CorpusIndex::build(&corpus);
        assert_eq!(
            index.positions_for_mechanism("BCR-ABL kinase inhibitor"),
            &[1, 2]
        );
        // First-appearance order of mechanism keys.
        assert_eq!(index.mechanisms()[0], "AMPK activator");
        assert_eq!(index.mechanisms()[1], "BCR-ABL kinase inhibitor");
    }

    #[test]
    fn target_index_is_uppercase_and_deduplicated() {
        let corpus = corpus();
        let index = CorpusIndex::build(&corpus);
        assert_eq!(index.positions_for_target("ABL1"), &[1, 2]);
        assert_eq!(index.positions_for_target("PLK1"), &[3]);
        assert!(index.positions_for_target("abl1").is_empty());
    }

    #[test]
    fn phase_index_groups_drugs() {
        let corpus = corpus();
        let index = CorpusIndex::build(&corpus);
        assert_eq!(index.positions_in_phase(ClinicalPhase::Approved), &[0, 1, 2]);
        assert_eq!(index.positions_in_phase(ClinicalPhase::Phase2), &[3]);
        assert!(index.positions_in_phase(ClinicalPhase::Preclinical).is_empty());
    }

    #[test]
    fn token_index_covers_name_and_mechanism_terms() {
        let corpus = corpus();
        let index = CorpusIndex::build(&corpus);
        assert_eq!(index.positions_for_token("kinase"), &[1, 2]);
        assert_eq!(index.positions_for_token("metformin"), &[0]);
        assert_eq!(index.positions_for_token("plk1"), &[3]);
        // No position appears twice under one key even when a token
        // occurs in both name and mechanism.
        let positions = index.positions_for_token("inhibitor");
        let mut deduped = positions.to_vec();
        deduped.dedup();
        assert_eq!(positions, deduped.as_slice());
    }
}
