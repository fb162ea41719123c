pub mod analysis_store;
pub mod db;
pub mod types;

pub use analysis_store::{AnalysisStore, ArtifactFilter};
pub use db::SurrealDbClient;
