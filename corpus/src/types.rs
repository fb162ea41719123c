use serde::{Deserialize, Serialize};

/// Clinical development stage. Labels are matched case-insensitively as
/// substrings, most advanced stage first, so strings like
/// "Phase 3/Prevention Studies" resolve to the phase they mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalPhase {
    Approved,
    Phase3,
    Phase2,
    Phase1,
    Preclinical,
    Unknown,
}

impl ClinicalPhase {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("approved") {
            Self::Approved
        } else if label.contains("phase 3") {
            Self::Phase3
        } else if label.contains("phase 2") {
            Self::Phase2
        } else if label.contains("phase 1") {
            Self::Phase1
        } else if label.contains("preclinical") {
            Self::Preclinical
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Phase3 => "Phase 3",
            Self::Phase2 => "Phase 2",
            Self::Phase1 => "Phase 1",
            Self::Preclinical => "Preclinical",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ClinicalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a drug record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BroadHub,
    Repodb,
    Curated,
    External,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BroadHub => "broad_hub",
            Self::Repodb => "repodb",
            Self::Curated => "curated",
            Self::External => "external",
        }
    }
}

/// One curated compound. Immutable after corpus load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    /// Normalized lowercase name; stable within a process generation.
    pub drug_id: String,
    /// Display-cased name as shipped in the dataset.
    pub name: String,
    pub clinical_phase: ClinicalPhase,
    /// Raw phase text, kept because the scorer works on the label.
    pub phase_label: String,
    pub mechanism: String,
    /// Uppercase gene symbols, deduplicated, dataset order.
    pub targets: Vec<String>,
    pub disease_area: String,
    pub indication: String,
    pub source: SourceKind,
    /// Set when the oncology overlay lists this compound.
    pub oncology: bool,
}

impl Drug {
    pub fn id_for(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Curated high-confidence repurposing example; ground truth for ranking
/// and the demo anchor cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeroCase {
    pub drug_id: String,
    pub drug_name: String,
    pub original_indication: String,
    pub repurposed_cancers: Vec<String>,
    pub confidence_score: f64,
    pub trial_count: u32,
    pub citation_count: u32,
    pub mechanism: String,
    pub pathways: Vec<String>,
    pub evidence_level: EvidenceLevel,
    pub demo_priority: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_label_matching_prefers_most_advanced_stage() {
        assert_eq!(ClinicalPhase::from_label("Approved"), ClinicalPhase::Approved);
        assert_eq!(
            ClinicalPhase::from_label("Approved/Ongoing Studies"),
            ClinicalPhase::Approved
        );
        assert_eq!(
            ClinicalPhase::from_label("Phase 3/Prevention Studies"),
            ClinicalPhase::Phase3
        );
        assert_eq!(ClinicalPhase::from_label("phase 2"), ClinicalPhase::Phase2);
        assert_eq!(
            ClinicalPhase::from_label("Preclinical/Early Phase"),
            ClinicalPhase::Preclinical
        );
        assert_eq!(ClinicalPhase::from_label(""), ClinicalPhase::Unknown);
        assert_eq!(ClinicalPhase::from_label("Launched"), ClinicalPhase::Unknown);
    }

    #[test]
    fn drug_ids_are_case_insensitive() {
        assert_eq!(Drug::id_for("Metformin"), "metformin");
        assert_eq!(Drug::id_for("  ASPIRIN "), "aspirin");
    }

    #[test]
    fn evidence_levels_order_by_strength() {
        assert!(EvidenceLevel::VeryHigh > EvidenceLevel::High);
        assert!(EvidenceLevel::High > EvidenceLevel::Moderate);
        assert!(EvidenceLevel::Moderate > EvidenceLevel::Low);
    }
}
