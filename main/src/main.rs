use std::sync::Arc;

use clap::{Parser, Subcommand};
use common::auth::RefreshTokenStore;
use common::cache::CacheClient;
use common::rate_limit::RateLimitTier;
use common::storage::{AnalysisStore, SurrealDbClient};
use common::utils::config::{get_config, AppConfig, RuntimeEnvironment};
use corpus::load_corpus;
use fetchers::LiveEvidenceClients;
use search_pipeline::{
    CallerContext, Pagination, QueryEngine, SearchFilters, SearchRequest,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "oncoscout", about = "Drug repurposing search and scoring engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search ranked drug-to-cancer repurposing opportunities.
    Search {
        query: String,
        #[arg(long)]
        min_confidence: Option<f64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        oncology_only: bool,
        /// Fan out to PubMed, ClinicalTrials.gov and DrugBank.
        #[arg(long)]
        live: bool,
        /// Record the search as an analysis artifact.
        #[arg(long)]
        persist: bool,
    },
    /// Hero-case and corpus details for one drug.
    Drug { name: String },
    /// Drugs whose mechanism of action contains the given text.
    Mechanism { query: String },
    /// Corpus counts, hero aggregates and source breakdown.
    Stats,
    /// Issue a refresh token and rotate it once, printing both records.
    RefreshDemo { subject: String },
}

fn default_log_filter(config: &AppConfig) -> &'static str {
    match config.environment {
        RuntimeEnvironment::Development => "debug",
        RuntimeEnvironment::Staging | RuntimeEnvironment::Production => "info",
    }
}

async fn build_engine(config: &AppConfig) -> anyhow::Result<(QueryEngine, CacheClient)> {
    // Corpus load failures abort startup; missing files only warn.
    let corpus = Arc::new(load_corpus(&config.corpus_dir)?);

    let cache = match &config.cache_url {
        Some(url) => CacheClient::connect(url).await,
        None => {
            info!("no cache_url configured, running without cache");
            CacheClient::disabled()
        }
    };

    let store = match &config.database_url {
        Some(url) => {
            let db = SurrealDbClient::new(
                url,
                config.database_username.as_deref(),
                config.database_password.as_deref(),
                &config.database_namespace,
                &config.database_name,
            )
            .await?;
            db.ensure_initialized().await?;
            Arc::new(AnalysisStore::durable(Arc::new(db)))
        }
        None => {
            info!("no database_url configured, analysis artifacts stay ephemeral");
            Arc::new(AnalysisStore::ephemeral())
        }
    };

    let live = match LiveEvidenceClients::from_config(config) {
        Ok(clients) => Some(Arc::new(clients)),
        Err(e) => {
            warn!(error = %e, "external clients unavailable");
            None
        }
    };

    let engine = QueryEngine::new(corpus, cache.clone(), store, live, config);
    Ok((engine, cache))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = get_config()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&config))),
        )
        .try_init()
        .ok();

    let (engine, cache) = build_engine(&config).await?;
    // The local CLI is not subject to per-identity throttling.
    let caller = CallerContext {
        identity: "cli".to_string(),
        tier: RateLimitTier::Enterprise,
        subject: None,
        session_id: None,
    };

    match cli.command {
        Command::Search {
            query,
            min_confidence,
            limit,
            offset,
            oncology_only,
            live,
            persist,
        } => {
            let request = SearchRequest {
                query,
                filters: SearchFilters {
                    oncology_only,
                    min_confidence,
                    phase_in: None,
                },
                pagination: Pagination { offset, limit },
                want_live_evidence: live,
                persist,
            };
            let response = engine.search(request, &caller).await?;
            print_json(&response)?;
        }
        Command::Drug { name } => {
            let details = engine.drug_details(&name).await?;
            print_json(&details)?;
        }
        Command::Mechanism { query } => {
            let drugs = engine.drugs_by_mechanism(&query);
            print_json(&drugs)?;
        }
        Command::Stats => {
            print_json(&engine.stats())?;
        }
        Command::RefreshDemo { subject } => {
            let store = RefreshTokenStore::new(cache, config.refresh_token_ttl_days);
            let issued = store.issue(&subject).await;
            let rotated = store.rotate(&issued.jti).await?;
            print_json(&serde_json::json!({
                "issued": issued,
                "rotated": rotated,
            }))?;
        }
    }

    Ok(())
}
