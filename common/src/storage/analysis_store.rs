use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use super::db::SurrealDbClient;
use super::types::{AnalysisArtifact, ArtifactKind, StoredObject};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub kind: Option<ArtifactKind>,
    pub subject: Option<String>,
    pub session_id: Option<String>,
}

impl ArtifactFilter {
    fn matches(&self, artifact: &AnalysisArtifact) -> bool {
        if self.kind.is_some_and(|kind| kind != artifact.kind) {
            return false;
        }
        if let Some(subject) = &self.subject {
            if artifact.subject.as_deref() != Some(subject.as_str()) {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if artifact.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Append-only store for generated analyses. With a database attached
/// writes are durable; without one (or when a write fails) artifacts land
/// in a process-local buffer so they stay retrievable for the lifetime of
/// the process.
pub struct AnalysisStore {
    db: Option<Arc<SurrealDbClient>>,
    ephemeral: RwLock<Vec<AnalysisArtifact>>,
}

impl AnalysisStore {
    pub fn durable(db: Arc<SurrealDbClient>) -> Self {
        Self {
            db: Some(db),
            ephemeral: RwLock::new(Vec::new()),
        }
    }

    pub fn ephemeral() -> Self {
        Self {
            db: None,
            ephemeral: RwLock::new(Vec::new()),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.db.is_some()
    }

    /// Returns the artifact id. Persistence failures degrade to the
    /// ephemeral buffer with a warning; the caller always gets an id back.
    pub async fn insert(&self, artifact: AnalysisArtifact) -> String {
        let id = artifact.id.clone();
        if let Some(db) = &self.db {
            match db.store_item(artifact.clone()).await {
                Ok(_) => return id,
                Err(e) => {
                    warn!(error = %e, artifact_id = %id, "artifact write failed, keeping ephemeral copy");
                }
            }
        }
        self.ephemeral.write().await.push(artifact);
        id
    }

    pub async fn get(&self, id: &str) -> Result<AnalysisArtifact, AppError> {
        if let Some(db) = &self.db {
            match db.get_item::<AnalysisArtifact>(id).await {
                Ok(Some(artifact)) => return Ok(artifact),
                Ok(None) => {}
                Err(e) => warn!(error = %e, artifact_id = id, "artifact read failed, checking ephemeral buffer"),
            }
        }
        self.ephemeral
            .read()
            .await
            .iter()
            .find(|artifact| artifact.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("artifact {id}")))
    }

    /// Newest first, filtered, truncated to `limit`.
    pub async fn list(
        &self,
        filter: &ArtifactFilter,
        limit: usize,
    ) -> Result<Vec<AnalysisArtifact>, AppError> {
        let mut results: Vec<AnalysisArtifact> = Vec::new();

        if let Some(db) = &self.db {
            let mut conditions: Vec<&str> = Vec::new();
            if filter.kind.is_some() {
                conditions.push("kind = $kind");
            }
            if filter.subject.is_some() {
                conditions.push("subject = $subject");
            }
            if filter.session_id.is_some() {
                conditions.push("session_id = $session_id");
            }
            let where_clause = if conditions.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", conditions.join(" AND "))
            };
            let statement = format!(
                "SELECT * FROM {}{} ORDER BY created_at DESC LIMIT $limit",
                AnalysisArtifact::table_name(),
                where_clause
            );

            let mut query = db.client.query(statement).bind(("limit", limit));
            if let Some(kind) = filter.kind {
                query = query.bind(("kind", kind.as_str()));
            }
            if let Some(subject) = filter.subject.clone() {
                query = query.bind(("subject", subject));
            }
            if let Some(session_id) = filter.session_id.clone() {
                query = query.bind(("session_id", session_id));
            }

            match query.await.and_then(|mut response| response.take(0)) {
                Ok(rows) => results = rows,
                Err(e) => {
                    warn!(error = %e, "artifact list failed, falling back to ephemeral buffer");
                }
            }
        }

        let buffered = self.ephemeral.read().await;
        results.extend(buffered.iter().filter(|a| filter.matches(a)).cloned());

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.dedup_by(|a, b| a.id == b.id);
        results.truncate(limit);
        Ok(results)
    }
}
