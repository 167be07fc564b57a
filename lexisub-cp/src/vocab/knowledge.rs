//! Vocabulary knowledge store
//!
//! External collaborator answering "is lemma L known by user U", the lemma's
//! difficulty tier, and the user's configured level. Read-only from this
//! service's perspective. A store failure must surface as
//! `UpstreamUnavailable`: a wrong default verdict would materially change
//! what the learner sees, so there is no silent unknown-by-default fallback.

use crate::vocab::Tier;
use async_trait::async_trait;
use lexisub_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

/// Narrow read interface onto the vocabulary knowledge base
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Has the user marked this lemma as known?
    async fn is_known(&self, user_id: &str, lemma: &str, language: &str) -> Result<bool>;

    /// Difficulty tier of a lemma; `Tier::Unknown` when unclassified
    async fn tier_of(&self, lemma: &str, language: &str) -> Result<Tier>;

    /// The user's configured vocabulary level
    async fn level_of(&self, user_id: &str) -> Result<Tier>;
}

/// Sqlite-backed adapter over the vocabulary database
pub struct SqliteKnowledgeStore {
    db: SqlitePool,
}

impl SqliteKnowledgeStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn upstream(e: sqlx::Error) -> Error {
    Error::UpstreamUnavailable(format!("knowledge store: {}", e))
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn is_known(&self, user_id: &str, lemma: &str, language: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM user_vocabulary WHERE user_id = ? AND lemma = ? AND language = ?",
        )
        .bind(user_id)
        .bind(lemma)
        .bind(language)
        .fetch_optional(&self.db)
        .await
        .map_err(upstream)?;
        Ok(row.is_some())
    }

    async fn tier_of(&self, lemma: &str, language: &str) -> Result<Tier> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT tier FROM lemma_tiers WHERE lemma = ? AND language = ?")
                .bind(lemma)
                .bind(language)
                .fetch_optional(&self.db)
                .await
                .map_err(upstream)?;
        Ok(row
            .and_then(|(tier,)| Tier::parse(&tier))
            .unwrap_or(Tier::Unknown))
    }

    async fn level_of(&self, user_id: &str) -> Result<Tier> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT level FROM user_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await
                .map_err(upstream)?;
        // Missing profile defaults to A1: flag more, never less
        Ok(row
            .and_then(|(level,)| Tier::parse(&level))
            .unwrap_or(Tier::A1))
    }
}

/// In-memory store used by tests and local development
#[derive(Debug, Default, Clone)]
pub struct MemoryKnowledgeStore {
    known: HashSet<(String, String, String)>,
    tiers: HashMap<(String, String), Tier>,
    levels: HashMap<String, Tier>,
    /// When set, every call fails with `UpstreamUnavailable`
    unreachable: bool,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(mut self, user_id: &str, lemma: &str, language: &str) -> Self {
        self.known.insert((
            user_id.to_string(),
            lemma.to_string(),
            language.to_string(),
        ));
        self
    }

    pub fn with_tier(mut self, lemma: &str, language: &str, tier: Tier) -> Self {
        self.tiers
            .insert((lemma.to_string(), language.to_string()), tier);
        self
    }

    pub fn with_level(mut self, user_id: &str, level: Tier) -> Self {
        self.levels.insert(user_id.to_string(), level);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            Err(Error::UpstreamUnavailable(
                "knowledge store: connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn is_known(&self, user_id: &str, lemma: &str, language: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.known.contains(&(
            user_id.to_string(),
            lemma.to_string(),
            language.to_string(),
        )))
    }

    async fn tier_of(&self, lemma: &str, language: &str) -> Result<Tier> {
        self.check_reachable()?;
        Ok(self
            .tiers
            .get(&(lemma.to_string(), language.to_string()))
            .copied()
            .unwrap_or(Tier::Unknown))
    }

    async fn level_of(&self, user_id: &str) -> Result<Tier> {
        self.check_reachable()?;
        Ok(self.levels.get(user_id).copied().unwrap_or(Tier::A1))
    }
}
