use std::sync::Arc;
use std::time::Duration;

use common::error::AppError;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::records::Paper;
use crate::{build_http_client, FetchOutcome};

const PUBMED_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// NCBI E-utilities client: `esearch` resolves PMIDs, `esummary` hydrates
/// them. At most three requests run concurrently.
pub struct PubMedClient {
    http: reqwest::Client,
    base: String,
    limiter: Arc<Semaphore>,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(
        timeout: Duration,
        concurrency: usize,
        api_key: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base: PUBMED_BASE.to_string(),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            api_key,
        })
    }

    #[cfg(test)]
    fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub async fn search_papers(&self, query: &str, max_results: usize) -> FetchOutcome<Paper> {
        let Ok(_permit) = self.limiter.acquire().await else {
            return FetchOutcome::degraded("pubmed admission closed");
        };

        let pmids = match self.search_ids(query, max_results).await {
            Ok(pmids) => pmids,
            Err(reason) => {
                warn!(query, %reason, "pubmed search degraded");
                return FetchOutcome::degraded(reason);
            }
        };
        if pmids.is_empty() {
            return FetchOutcome::Ok(Vec::new());
        }

        match self.fetch_summaries(&pmids).await {
            Ok(papers) => FetchOutcome::Ok(papers),
            Err(reason) => {
                warn!(query, %reason, "pubmed summary fetch degraded");
                FetchOutcome::degraded(reason)
            }
        }
    }

    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>, String> {
        let url = format!("{}/esearch.fcgi", self.base);
        let retmax = max_results.to_string();
        let mut request = self.http.get(&url).query(&[
            ("db", "pubmed"),
            ("term", query),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
            ("sort", "relevance"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("pubmed esearch returned {}", response.status()));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        let ids = body
            .pointer("/esearchresult/idlist")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn fetch_summaries(&self, pmids: &[String]) -> Result<Vec<Paper>, String> {
        let url = format!("{}/esummary.fcgi", self.base);
        let ids = pmids.join(",");
        let mut request = self.http.get(&url).query(&[
            ("db", "pubmed"),
            ("id", ids.as_str()),
            ("retmode", "json"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("pubmed esummary returned {}", response.status()));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;

        let Some(result) = body.get("result") else {
            return Ok(Vec::new());
        };
        let uids: Vec<String> = result
            .get("uids")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        // Individual summaries that fail to parse are skipped; the batch
        // still succeeds.
        let papers = uids
            .iter()
            .filter_map(|uid| parse_summary(uid, result.get(uid)?))
            .collect();
        Ok(papers)
    }
}

fn parse_summary(uid: &str, summary: &serde_json::Value) -> Option<Paper> {
    let title = summary.get("title")?.as_str()?.to_string();
    if title.is_empty() {
        return None;
    }
    let authors = summary
        .get("authors")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|author| author.get("name")?.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Some(Paper {
        pmid: uid.to_string(),
        title,
        authors,
        journal: string_field(summary, "fulljournalname")
            .or_else(|| string_field(summary, "source"))
            .unwrap_or_default(),
        publication_date: string_field(summary, "pubdate").unwrap_or_default(),
        doi: string_field(summary, "elocationid").filter(|v| !v.is_empty()),
        abstract_text: String::new(),
        citation_count: summary
            .get("pmcrefcount")
            .and_then(value_as_u32)
            .unwrap_or(0),
    })
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

fn value_as_u32(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value.as_str()?.parse().ok()
}
