use std::sync::Arc;
use std::time::Duration;

use common::error::AppError;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::records::{AdverseEvent, DrugRecord};
use crate::{build_http_client, FetchOutcome};

const DRUGBANK_BASE: &str = "https://go.drugbank.com/api";

/// DrugBank REST client. The API key is mandatory; calls without one
/// fail with a configuration error before touching the network. Bounded
/// to two concurrent requests.
pub struct DrugBankClient {
    http: reqwest::Client,
    base: String,
    limiter: Arc<Semaphore>,
    api_key: Option<String>,
}

impl DrugBankClient {
    pub fn new(
        timeout: Duration,
        concurrency: usize,
        api_key: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base: DRUGBANK_BASE.to_string(),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            api_key,
        })
    }

    #[cfg(test)]
    fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    fn require_key(&self) -> Result<&str, AppError> {
        self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("DRUGBANK_API_KEY is required for DrugBank lookups".to_string())
        })
    }

    pub async fn search_drugs(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<FetchOutcome<DrugRecord>, AppError> {
        let key = self.require_key()?.to_string();
        let Ok(_permit) = self.limiter.acquire().await else {
            return Ok(FetchOutcome::degraded("drugbank admission closed"));
        };

        let url = format!("{}/drugs", self.base);
        let limit = max_results.to_string();
        let response = match self
            .http
            .get(&url)
            .bearer_auth(key)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(query, error = %e, "drugbank request degraded");
                return Ok(FetchOutcome::degraded(e.to_string()));
            }
        };
        if !response.status().is_success() {
            let reason = format!("drugbank returned {}", response.status());
            warn!(query, %reason, "drugbank request degraded");
            return Ok(FetchOutcome::degraded(reason));
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(query, error = %e, "drugbank body degraded");
                return Ok(FetchOutcome::degraded(e.to_string()));
            }
        };

        let records = match body.as_array() {
            Some(entries) => entries.iter().filter_map(parse_drug).collect(),
            None => body
                .get("drugs")
                .and_then(|v| v.as_array())
                .map(|entries| entries.iter().filter_map(parse_drug).collect())
                .unwrap_or_default(),
        };
        Ok(FetchOutcome::Ok(records))
    }
}

fn parse_drug(entry: &serde_json::Value) -> Option<DrugRecord> {
    let name = entry.get("name")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let groups: Vec<&str> = entry
        .get("groups")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(|g| g.as_str()).collect())
        .unwrap_or_default();
    let approval_status = if groups.iter().any(|g| g.eq_ignore_ascii_case("approved")) {
        "Approved".to_string()
    } else {
        "Not Approved".to_string()
    };

    let adverse_events = entry
        .get("adverse_effects")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|ae| {
                    Some(AdverseEvent {
                        event: ae.get("event")?.as_str()?.to_string(),
                        frequency: ae.get("frequency")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let interactions = entry
        .get("drug_interactions")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|interaction| {
                    let drug = interaction.get("drug")?.as_str()?;
                    let description = interaction.get("description")?.as_str()?;
                    Some(format!("{drug}: {description}"))
                })
                .collect()
        })
        .unwrap_or_default();

    Some(DrugRecord {
        name,
        drugbank_id: entry
            .get("drugbank_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        molecular_weight: entry
            .pointer("/properties/molecular_weight")
            .and_then(serde_json::Value::as_f64),
        structure: entry
            .get("smiles")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        approval_status,
        manufacturer: entry
            .pointer("/manufacturer/name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        mechanism: entry
            .pointer("/mechanisms_of_action/0/mechanism")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        drug_class: entry
            .pointer("/drug_classifications/0/classification")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        adverse_events,
        contraindications: entry
            .get("contraindications")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        interactions,
    })
}
