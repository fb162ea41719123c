use std::fs;
use std::path::{Path, PathBuf};

use common::error::AppError;
use serde::Deserialize;
use tracing::{info, warn};

use crate::types::{ClinicalPhase, Drug, EvidenceLevel, HeroCase, SourceKind};

const BROAD_JSON: &str = "broad/broad_complete.json";
const BROAD_TSV: &str = "broad/broad_complete.tsv";
const ONCOLOGY_JSON: &str = "broad/broad_oncology_compounds.json";
const HERO_JSON: &str = "hero_cases/hero_repurposing_cases.json";

#[derive(Debug, Clone, Deserialize, Default)]
struct RawBroadDrug {
    #[serde(default)]
    pert_iname: String,
    #[serde(default)]
    clinical_phase: String,
    #[serde(default)]
    moa: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    disease_area: String,
    #[serde(default)]
    indication: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BroadFile {
    Wrapped {
        all_drugs: Vec<RawBroadDrug>,
    },
    Plain(Vec<RawBroadDrug>),
}

#[derive(Deserialize)]
struct OncologyFile {
    #[serde(default)]
    oncology_drugs: Vec<RawBroadDrug>,
}

/// The curated hero file ships `repurposed_cancer` both as a single
/// string and as a list; both normalize to a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        };
        items
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
struct RawHeroCase {
    drug_name: String,
    #[serde(default)]
    original_indication: String,
    #[serde(alias = "repurposed_cancers")]
    repurposed_cancer: StringOrList,
    confidence_score: f64,
    #[serde(default)]
    trial_count: u32,
    #[serde(default, alias = "citation_count")]
    citations: u32,
    #[serde(default)]
    mechanism: String,
    #[serde(default)]
    pathways: Vec<String>,
    evidence_level: EvidenceLevel,
    #[serde(default)]
    demo_priority: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CorpusCounts {
    pub drugs: usize,
    pub oncology: usize,
    pub hero_cases: usize,
    pub mechanisms: usize,
    pub targets: usize,
}

/// Immutable collections published once at startup.
#[derive(Debug, Default)]
pub struct Corpus {
    pub drugs: Vec<Drug>,
    pub hero_cases: Vec<HeroCase>,
}

impl Corpus {
    pub fn counts(&self) -> CorpusCounts {
        let mut mechanisms = std::collections::HashSet::new();
        let mut targets = std::collections::HashSet::new();
        for drug in &self.drugs {
            if !drug.mechanism.is_empty() {
                mechanisms.insert(drug.mechanism.as_str());
            }
            for target in &drug.targets {
                targets.insert(target.as_str());
            }
        }
        CorpusCounts {
            drugs: self.drugs.len(),
            oncology: self.drugs.iter().filter(|d| d.oncology).count(),
            hero_cases: self.hero_cases.len(),
            mechanisms: mechanisms.len(),
            targets: targets.len(),
        }
    }
}

fn parse_error(path: &Path, message: impl std::fmt::Display) -> AppError {
    AppError::CorpusParse {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn normalize_targets(raw: &str) -> Vec<String> {
    let mut targets = Vec::new();
    for symbol in raw.split('|') {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() && !targets.contains(&symbol) {
            targets.push(symbol);
        }
    }
    targets
}

fn build_drug(raw: RawBroadDrug, source: SourceKind, oncology: bool) -> Option<Drug> {
    let name = raw.pert_iname.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let phase_label = raw.clinical_phase.trim().to_string();
    Some(Drug {
        drug_id: Drug::id_for(&name),
        clinical_phase: ClinicalPhase::from_label(&phase_label),
        phase_label,
        name,
        mechanism: raw.moa.trim().to_string(),
        targets: normalize_targets(&raw.target),
        disease_area: raw.disease_area.trim().to_string(),
        indication: raw.indication.trim().to_string(),
        source,
        oncology,
    })
}

fn read_broad_file(path: &Path) -> Result<Vec<RawBroadDrug>, AppError> {
    let raw = fs::read_to_string(path)?;
    let parsed: BroadFile = serde_json::from_str(&raw).map_err(|e| parse_error(path, e))?;
    Ok(match parsed {
        BroadFile::Wrapped { all_drugs } => all_drugs,
        BroadFile::Plain(drugs) => drugs,
    })
}

fn read_broad_tsv(path: &Path) -> Result<Vec<RawBroadDrug>, AppError> {
    let raw = fs::read_to_string(path)?;
    let mut lines = raw.lines();
    let header = lines
        .next()
        .ok_or_else(|| parse_error(path, "missing header row"))?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let position = |name: &str| columns.iter().position(|c| *c == name);
    let name_idx = position("pert_iname")
        .ok_or_else(|| parse_error(path, "missing pert_iname column"))?;
    let phase_idx = position("clinical_phase");
    let moa_idx = position("moa");
    let target_idx = position("target");
    let area_idx = position("disease_area");
    let indication_idx = position("indication");

    let field = |cells: &[&str], idx: Option<usize>| -> String {
        idx.and_then(|i| cells.get(i)).map_or_else(String::new, |v| (*v).to_string())
    };

    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        records.push(RawBroadDrug {
            pert_iname: field(&cells, Some(name_idx)),
            clinical_phase: field(&cells, phase_idx),
            moa: field(&cells, moa_idx),
            target: field(&cells, target_idx),
            disease_area: field(&cells, area_idx),
            indication: field(&cells, indication_idx),
        });
    }
    Ok(records)
}

fn read_hero_file(path: &Path) -> Result<Vec<HeroCase>, AppError> {
    let raw = fs::read_to_string(path)?;
    let parsed: Vec<RawHeroCase> = serde_json::from_str(&raw).map_err(|e| parse_error(path, e))?;
    let mut cases = Vec::with_capacity(parsed.len());
    for raw_case in parsed {
        let drug_name = raw_case.drug_name.trim().to_string();
        if drug_name.is_empty() {
            continue;
        }
        cases.push(HeroCase {
            drug_id: Drug::id_for(&drug_name),
            drug_name,
            original_indication: raw_case.original_indication.trim().to_string(),
            repurposed_cancers: raw_case.repurposed_cancer.into_vec(),
            confidence_score: raw_case.confidence_score.clamp(0.0, 1.0),
            trial_count: raw_case.trial_count,
            citation_count: raw_case.citations,
            mechanism: raw_case.mechanism.trim().to_string(),
            pathways: raw_case.pathways,
            evidence_level: raw_case.evidence_level,
            demo_priority: raw_case.demo_priority,
        });
    }
    Ok(cases)
}

/// Loads the curated datasets from `corpus_dir`. Missing files produce
/// empty collections; files that are present but malformed abort startup
/// with `CorpusParse`.
pub fn load_corpus(corpus_dir: impl AsRef<Path>) -> Result<Corpus, AppError> {
    let corpus_dir = corpus_dir.as_ref();

    let broad_json: PathBuf = corpus_dir.join(BROAD_JSON);
    let broad_tsv: PathBuf = corpus_dir.join(BROAD_TSV);
    let raw_drugs = if broad_json.exists() {
        read_broad_file(&broad_json)?
    } else if broad_tsv.exists() {
        read_broad_tsv(&broad_tsv)?
    } else {
        warn!(path = %broad_json.display(), "broad hub dataset not found");
        Vec::new()
    };

    let mut drugs: Vec<Drug> = Vec::with_capacity(raw_drugs.len());
    let mut seen = std::collections::HashSet::new();
    for raw in raw_drugs {
        if let Some(drug) = build_drug(raw, SourceKind::BroadHub, false) {
            // First record wins for case-insensitive duplicate names.
            if seen.insert(drug.drug_id.clone()) {
                drugs.push(drug);
            }
        }
    }

    let oncology_path = corpus_dir.join(ONCOLOGY_JSON);
    if oncology_path.exists() {
        let raw = fs::read_to_string(&oncology_path)?;
        let overlay: OncologyFile =
            serde_json::from_str(&raw).map_err(|e| parse_error(&oncology_path, e))?;
        for raw in overlay.oncology_drugs {
            let Some(drug) = build_drug(raw, SourceKind::BroadHub, true) else {
                continue;
            };
            if let Some(existing) = drugs.iter_mut().find(|d| d.drug_id == drug.drug_id) {
                existing.oncology = true;
            } else if seen.insert(drug.drug_id.clone()) {
                drugs.push(drug);
            }
        }
    }

    let hero_path = corpus_dir.join(HERO_JSON);
    let hero_cases = if hero_path.exists() {
        read_hero_file(&hero_path)?
    } else {
        warn!(path = %hero_path.display(), "hero cases dataset not found");
        Vec::new()
    };

    let corpus = Corpus { drugs, hero_cases };
    let counts = corpus.counts();
    info!(
        drugs = counts.drugs,
        oncology = counts.oncology,
        hero_cases = counts.hero_cases,
        "corpus loaded"
    );
    Ok(corpus)
}
