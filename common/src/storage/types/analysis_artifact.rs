use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{deserialize_flexible_id, StoredObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Search,
    Discovery,
    MarketReport,
    Dashboard,
    Comparison,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Discovery => "discovery",
            Self::MarketReport => "market_report",
            Self::Dashboard => "dashboard",
            Self::Comparison => "comparison",
        }
    }
}

/// Durable record of a generated analysis. Append-only: once created the
/// record is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisArtifact {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub inputs: serde_json::Value,
    pub outputs: serde_json::Value,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisArtifact {
    pub fn new(kind: ArtifactKind, inputs: serde_json::Value, outputs: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            subject: None,
            session_id: None,
            inputs,
            outputs,
            confidence: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

impl StoredObject for AnalysisArtifact {
    fn table_name() -> &'static str {
        "analysis_artifact"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}
