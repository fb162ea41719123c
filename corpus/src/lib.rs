pub mod index;
pub mod loader;
pub mod types;

pub use index::CorpusIndex;
pub use loader::{load_corpus, Corpus, CorpusCounts};
pub use types::{ClinicalPhase, Drug, EvidenceLevel, HeroCase, SourceKind};
