use std::sync::Arc;
use std::time::Duration;

use common::error::AppError;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::records::Trial;
use crate::{build_http_client, FetchOutcome};

const CTGOV_BASE: &str = "https://clinicaltrials.gov/api/v2";

/// ClinicalTrials.gov studies API v2 client, bounded to five concurrent
/// requests.
pub struct ClinicalTrialsClient {
    http: reqwest::Client,
    base: String,
    limiter: Arc<Semaphore>,
}

impl ClinicalTrialsClient {
    pub fn new(timeout: Duration, concurrency: usize) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base: CTGOV_BASE.to_string(),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
        })
    }

    #[cfg(test)]
    fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub async fn search_trials(
        &self,
        drug_name: &str,
        cancer_type: Option<&str>,
        max_results: usize,
    ) -> FetchOutcome<Trial> {
        let Ok(_permit) = self.limiter.acquire().await else {
            return FetchOutcome::degraded("clinicaltrials admission closed");
        };

        let url = format!("{}/studies", self.base);
        let page_size = max_results.to_string();
        let mut request = self.http.get(&url).query(&[
            ("query.intr", drug_name),
            ("format", "json"),
            ("pageSize", page_size.as_str()),
        ]);
        if let Some(cancer) = cancer_type.map(str::trim).filter(|c| !c.is_empty()) {
            request = request.query(&[("query.cond", cancer)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(drug_name, error = %e, "clinicaltrials request degraded");
                return FetchOutcome::degraded(e.to_string());
            }
        };
        if !response.status().is_success() {
            let reason = format!("clinicaltrials returned {}", response.status());
            warn!(drug_name, %reason, "clinicaltrials request degraded");
            return FetchOutcome::degraded(reason);
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(drug_name, error = %e, "clinicaltrials body degraded");
                return FetchOutcome::degraded(e.to_string());
            }
        };

        let trials = body
            .get("studies")
            .and_then(|v| v.as_array())
            .map(|studies| studies.iter().filter_map(parse_study).collect())
            .unwrap_or_default();
        FetchOutcome::Ok(trials)
    }
}

/// Records missing an NCT id or title are dropped without aborting the
/// batch.
fn parse_study(study: &serde_json::Value) -> Option<Trial> {
    let protocol = study.get("protocolSection")?;
    let identification = protocol.get("identificationModule")?;
    let nct_id = identification.get("nctId")?.as_str()?.trim().to_string();
    let title = identification.get("briefTitle")?.as_str()?.trim().to_string();
    if nct_id.is_empty() || title.is_empty() {
        return None;
    }

    let status_module = protocol.get("statusModule");
    let design = protocol.get("designModule");
    let phase = design
        .and_then(|d| d.get("phases"))
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())
        .and_then(|p| p.as_str())
        .unwrap_or_default()
        .to_string();

    Some(Trial {
        url: format!("https://clinicaltrials.gov/study/{nct_id}"),
        nct_id,
        title,
        status: status_module
            .and_then(|s| s.get("overallStatus"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        phase,
        sponsor: protocol
            .pointer("/sponsorCollaboratorsModule/leadSponsor/name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        start_date: status_module
            .and_then(|s| s.pointer("/startDateStruct/date"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        completion_date: status_module
            .and_then(|s| s.pointer("/completionDateStruct/date"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        enrollment_count: design
            .and_then(|d| d.pointer("/enrollmentInfo/count"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        primary_outcome: protocol
            .pointer("/outcomesModule/primaryOutcomes/0/measure")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}
