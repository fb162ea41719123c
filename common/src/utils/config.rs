use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Development,
    Staging,
    Production,
}

fn default_environment() -> RuntimeEnvironment {
    RuntimeEnvironment::Development
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: RuntimeEnvironment,
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: String,

    /// Redis-style connection string; absent means the cache layer is disabled.
    #[serde(default)]
    pub cache_url: Option<String>,

    /// SurrealDB address; absent means analysis artifacts stay ephemeral.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_database_namespace")]
    pub database_namespace: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default)]
    pub database_username: Option<String>,
    #[serde(default)]
    pub database_password: Option<String>,

    #[serde(default = "default_access_token_ttl_minutes")]
    pub access_token_ttl_minutes: u64,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: u64,

    #[serde(default = "default_rate_limit_basic")]
    pub rate_limit_basic: u32,
    #[serde(default = "default_rate_limit_pro")]
    pub rate_limit_pro: u32,
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    #[serde(default = "default_external_timeout_seconds")]
    pub external_timeout_seconds: u64,
    #[serde(default = "default_live_evidence_deadline_seconds")]
    pub live_evidence_deadline_seconds: u64,

    #[serde(default = "default_pubmed_concurrency")]
    pub pubmed_concurrency: usize,
    #[serde(default = "default_clinicaltrials_concurrency")]
    pub clinicaltrials_concurrency: usize,
    #[serde(default = "default_drugbank_concurrency")]
    pub drugbank_concurrency: usize,

    #[serde(default = "default_cache_ttl_drug_details")]
    pub cache_ttl_drug_details: u64,
    #[serde(default = "default_cache_ttl_search_results")]
    pub cache_ttl_search_results: u64,
    #[serde(default = "default_cache_ttl_market_analysis")]
    pub cache_ttl_market_analysis: u64,
    #[serde(default = "default_cache_ttl_paper_summaries")]
    pub cache_ttl_paper_summaries: u64,

    #[serde(default)]
    pub pubmed_api_key: Option<String>,
    #[serde(default)]
    pub drugbank_api_key: Option<String>,
}

fn default_corpus_dir() -> String {
    "./data".to_string()
}

fn default_database_namespace() -> String {
    "oncoscout".to_string()
}

fn default_database_name() -> String {
    "core".to_string()
}

fn default_access_token_ttl_minutes() -> u64 {
    15
}

fn default_refresh_token_ttl_days() -> u64 {
    7
}

fn default_rate_limit_basic() -> u32 {
    100
}

fn default_rate_limit_pro() -> u32 {
    1000
}

fn default_rate_limit_window_seconds() -> u64 {
    3600
}

fn default_external_timeout_seconds() -> u64 {
    30
}

fn default_live_evidence_deadline_seconds() -> u64 {
    10
}

fn default_pubmed_concurrency() -> usize {
    3
}

fn default_clinicaltrials_concurrency() -> usize {
    5
}

fn default_drugbank_concurrency() -> usize {
    2
}

fn default_cache_ttl_drug_details() -> u64 {
    86_400
}

fn default_cache_ttl_search_results() -> u64 {
    3_600
}

fn default_cache_ttl_market_analysis() -> u64 {
    604_800
}

fn default_cache_ttl_paper_summaries() -> u64 {
    2_592_000
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == RuntimeEnvironment::Production
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.environment, RuntimeEnvironment::Development);
        assert_eq!(config.rate_limit_basic, 100);
        assert_eq!(config.rate_limit_pro, 1000);
        assert_eq!(config.rate_limit_window_seconds, 3600);
        assert_eq!(config.cache_ttl_search_results, 3600);
        assert_eq!(config.cache_ttl_paper_summaries, 2_592_000);
        assert_eq!(config.pubmed_concurrency, 3);
        assert_eq!(config.clinicaltrials_concurrency, 5);
        assert_eq!(config.drugbank_concurrency, 2);
        assert!(config.cache_url.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn environment_parses_lowercase() {
        let config: AppConfig =
            serde_json::from_str(r#"{"environment":"production"}"#).unwrap();
        assert!(config.is_production());
    }
}
