pub mod clinicaltrials;
pub mod drugbank;
pub mod pubmed;
pub mod records;

use std::time::Duration;

use common::error::AppError;
use common::utils::config::AppConfig;

pub use clinicaltrials::ClinicalTrialsClient;
pub use drugbank::DrugBankClient;
pub use pubmed::PubMedClient;
pub use records::{AdverseEvent, DrugRecord, Paper, Trial};

/// Result of one provider fetch. Transient provider failures are data,
/// not thrown errors, so the orchestrator can reason about partial
/// success explicitly.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Ok(Vec<T>),
    Degraded { reason: String },
}

impl<T> FetchOutcome<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn records(self) -> Vec<T> {
        match self {
            Self::Ok(records) => records,
            Self::Degraded { .. } => Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason } => Some(reason),
        }
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("oncoscout/0.1")
        .build()?)
}

/// The three external clients bundled for the live-evidence fan-out.
pub struct LiveEvidenceClients {
    pub pubmed: PubMedClient,
    pub clinicaltrials: ClinicalTrialsClient,
    pub drugbank: DrugBankClient,
}

impl LiveEvidenceClients {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.external_timeout_seconds);
        Ok(Self {
            pubmed: PubMedClient::new(
                timeout,
                config.pubmed_concurrency,
                config.pubmed_api_key.clone(),
            )?,
            clinicaltrials: ClinicalTrialsClient::new(timeout, config.clinicaltrials_concurrency)?,
            drugbank: DrugBankClient::new(
                timeout,
                config.drugbank_concurrency,
                config.drugbank_api_key.clone(),
            )?,
        })
    }
}
