use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::error::RecommendError;
use crate::models::{FeedbackRequest, HistoryEntry, Medium};

/// Record of served requests and of what the user picked afterwards.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a new entry with empty `picked_*` fields.
    async fn record(&self, medium: Medium, query: &str) -> Result<HistoryEntry, RecommendError>;

    /// Fills the `picked_*` fields of an entry. Each entry accepts feedback once.
    async fn apply_feedback(&self, feedback: &FeedbackRequest)
    -> Result<HistoryEntry, RecommendError>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, RecommendError>;
}

fn already_rated(id: Uuid) -> RecommendError {
    RecommendError::Conflict(format!("feedback for {id} was already recorded"))
}

fn unknown_entry(id: Uuid) -> RecommendError {
    RecommendError::NotFound(format!("history entry {id}"))
}

/// Entries kept by the in-memory store before the oldest are dropped.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

pub struct InMemoryHistoryStore {
    entries: Arc<DashMap<Uuid, HistoryEntry>>,
    feedback: Arc<DashMap<Uuid, FeedbackRecord>>,
    /// Insertion order, oldest at the front.
    order: Arc<Mutex<VecDeque<Uuid>>>,
    capacity: usize,
}

/// Row of the feedback log.
#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub history_id: Uuid,
    pub picked_title: String,
    pub picked_id: Option<String>,
    pub picked_medium: Option<Medium>,
    pub created_at: DateTime<Utc>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Keeps at most `capacity` entries, evicting the oldest along with its feedback.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            feedback: Arc::new(DashMap::new()),
            order: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn feedback_for(&self, history_id: Uuid) -> Option<FeedbackRecord> {
        self.feedback.get(&history_id).map(|entry| entry.clone())
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, medium: Medium, query: &str) -> Result<HistoryEntry, RecommendError> {
        let entry = HistoryEntry::new(medium, query);
        self.entries.insert(entry.id, entry.clone());

        let evicted: Vec<Uuid> = {
            let mut order = self
                .order
                .lock()
                .map_err(|_| RecommendError::Storage("history order lock poisoned".into()))?;
            order.push_back(entry.id);
            let excess = order.len().saturating_sub(self.capacity);
            order.drain(..excess).collect()
        };
        for id in evicted {
            self.entries.remove(&id);
            self.feedback.remove(&id);
        }
        Ok(entry)
    }

    async fn apply_feedback(
        &self,
        feedback: &FeedbackRequest,
    ) -> Result<HistoryEntry, RecommendError> {
        let id = feedback.history_id;
        let updated = {
            // Held shard lock makes the check-and-set atomic per entry.
            let mut entry = self.entries.get_mut(&id).ok_or_else(|| unknown_entry(id))?;
            if entry.has_feedback() {
                return Err(already_rated(id));
            }
            entry.picked_title = Some(feedback.picked_title.clone());
            entry.picked_id = feedback.picked_id.clone();
            entry.picked_medium = feedback.picked_medium;
            entry.clone()
        };

        self.feedback.insert(
            id,
            FeedbackRecord {
                history_id: id,
                picked_title: feedback.picked_title.clone(),
                picked_id: feedback.picked_id.clone(),
                picked_medium: feedback.picked_medium,
                created_at: Utc::now(),
            },
        );
        Ok(updated)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, RecommendError> {
        let mut entries: Vec<HistoryEntry> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }
}

const CREATE_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    id UUID PRIMARY KEY,
    type TEXT NOT NULL,
    query TEXT NOT NULL,
    picked_title TEXT,
    picked_id TEXT,
    picked_medium TEXT,
    timestamp TIMESTAMPTZ NOT NULL
)"#;

const CREATE_FEEDBACK: &str = r#"
CREATE TABLE IF NOT EXISTS feedback (
    id BIGSERIAL PRIMARY KEY,
    history_id UUID NOT NULL REFERENCES history(id),
    picked_title TEXT NOT NULL,
    picked_id TEXT,
    picked_medium TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

#[derive(FromRow)]
struct HistoryRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    medium: String,
    query: String,
    picked_title: Option<String>,
    picked_id: Option<String>,
    picked_medium: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = RecommendError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let medium = row
            .medium
            .parse()
            .map_err(|_| RecommendError::Storage(format!("bad medium in history {}", row.id)))?;
        let picked_medium = row
            .picked_medium
            .map(|m| m.parse::<Medium>())
            .transpose()
            .map_err(|_| RecommendError::Storage(format!("bad picked medium in history {}", row.id)))?;
        Ok(HistoryEntry {
            id: row.id,
            medium,
            query: row.query,
            picked_title: row.picked_title,
            picked_id: row.picked_id,
            picked_medium,
            timestamp: row.timestamp,
        })
    }
}

/// Postgres-backed history with the `history` and `feedback` tables.
pub struct PostgresHistoryStore {
    pool: PgPool,
}

impl PostgresHistoryStore {
    pub async fn connect(database_url: &str) -> Result<Self, RecommendError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::query(CREATE_HISTORY).execute(&pool).await?;
        sqlx::query(CREATE_FEEDBACK).execute(&pool).await?;
        info!("history tables ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn record(&self, medium: Medium, query: &str) -> Result<HistoryEntry, RecommendError> {
        let entry = HistoryEntry::new(medium, query);
        sqlx::query("INSERT INTO history (id, type, query, timestamp) VALUES ($1, $2, $3, $4)")
            .bind(entry.id)
            .bind(entry.medium.as_str())
            .bind(&entry.query)
            .bind(entry.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn apply_feedback(
        &self,
        feedback: &FeedbackRequest,
    ) -> Result<HistoryEntry, RecommendError> {
        let id = feedback.history_id;
        let mut tx = self.pool.begin().await?;

        let updated: Option<HistoryRow> = sqlx::query_as(
            "UPDATE history SET picked_title = $2, picked_id = $3, picked_medium = $4 \
             WHERE id = $1 AND picked_title IS NULL \
             RETURNING id, type, query, picked_title, picked_id, picked_medium, timestamp",
        )
        .bind(id)
        .bind(&feedback.picked_title)
        .bind(&feedback.picked_id)
        .bind(feedback.picked_medium.map(|m| m.as_str()))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM history WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => already_rated(id),
                None => unknown_entry(id),
            });
        };

        sqlx::query(
            "INSERT INTO feedback (history_id, picked_title, picked_id, picked_medium) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&feedback.picked_title)
        .bind(&feedback.picked_id)
        .bind(feedback.picked_medium.map(|m| m.as_str()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        HistoryEntry::try_from(row)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, RecommendError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, type, query, picked_title, picked_id, picked_medium, timestamp \
             FROM history ORDER BY timestamp DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HistoryEntry::try_from).collect()
    }
}
