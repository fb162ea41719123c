use serde::{Deserialize, Serialize};

/// A PubMed paper in provider-neutral shape. Fields the provider omits
/// are filled with neutral defaults rather than dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    pub pmid: String,
    pub title: String,
    pub authors: Vec<String>,
    pub journal: String,
    pub publication_date: String,
    pub doi: Option<String>,
    pub abstract_text: String,
    pub citation_count: u32,
}

/// A ClinicalTrials.gov study. Records without an id or title carry no
/// usable signal and are dropped during parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trial {
    pub nct_id: String,
    pub title: String,
    pub status: String,
    pub phase: String,
    pub sponsor: String,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub enrollment_count: Option<u32>,
    pub primary_outcome: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdverseEvent {
    pub event: String,
    pub frequency: String,
}

/// A DrugBank drug record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DrugRecord {
    pub name: String,
    pub drugbank_id: String,
    pub molecular_weight: Option<f64>,
    pub structure: Option<String>,
    pub approval_status: String,
    pub manufacturer: Option<String>,
    pub mechanism: Option<String>,
    pub drug_class: Option<String>,
    pub adverse_events: Vec<AdverseEvent>,
    pub contraindications: Vec<String>,
    pub interactions: Vec<String>,
}
