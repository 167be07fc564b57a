//! Vocabulary classification
//!
//! Turns subtitle segments into per-token knowledge verdicts for one user:
//! lemma resolution ([`classifier`]), user/lemma lookups ([`knowledge`]) and
//! the filter stage that partitions tokens into known / learning / blocking
//! ([`filter`]).

pub mod classifier;
pub mod filter;
pub mod knowledge;

pub use classifier::{LemmaClassifier, Tier};
pub use filter::{
    AnnotatedSegment, ChunkAnalysis, ChunkStatistics, ClassifiedToken, TokenStatus,
    VocabularyFilter, WordTokenizer,
};
pub use knowledge::{KnowledgeStore, MemoryKnowledgeStore, SqliteKnowledgeStore};
