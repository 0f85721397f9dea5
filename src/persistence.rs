// src/persistence.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, migrate::Migrator};

use crate::{
    engine::store::{PersistenceStore, completed_key, xp_key},
    error::AppError,
};

/// Schema migrations, embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// In-memory store for one live session.
///
/// Seeded from the learner's stored rows for a course. Every `set` lands in the
/// buffer immediately and is remembered as pending until the request handler
/// flushes it to the database.
#[derive(Debug, Clone, Default)]
pub struct BufferedStore {
    entries: HashMap<String, String>,
    pending: BTreeMap<String, String>,
}

impl BufferedStore {
    pub fn seeded(entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            pending: BTreeMap::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

impl PersistenceStore for BufferedStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value.clone());
        self.pending.insert(key.to_owned(), value);
    }
}

/// Represents a row of the 'progress_entries' table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

pub async fn create_learner(pool: &SqlitePool, learner_id: &str) -> Result<(), AppError> {
    sqlx::query("INSERT INTO learners (id, created_at) VALUES (?1, ?2)")
        .bind(learner_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create learner: {:?}", e);
            AppError::from(e)
        })?;

    Ok(())
}

/// Loads the stored progress keys of one course for a learner.
pub async fn load_course_entries(
    pool: &SqlitePool,
    learner_id: &str,
    course_id: &str,
) -> Result<HashMap<String, String>, AppError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT key, value FROM progress_entries WHERE learner_id = ?1 AND key IN (?2, ?3)",
    )
    .bind(learner_id)
    .bind(xp_key(course_id))
    .bind(completed_key(course_id))
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load progress entries: {:?}", e);
        AppError::from(e)
    })?;

    Ok(rows.into_iter().collect())
}

/// Loads every stored entry of a learner.
pub async fn load_learner_entries(
    pool: &SqlitePool,
    learner_id: &str,
) -> Result<Vec<StoredEntry>, AppError> {
    let rows = sqlx::query_as::<_, StoredEntry>(
        "SELECT key, value, updated_at FROM progress_entries WHERE learner_id = ?1",
    )
    .bind(learner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Upserts entries in a single transaction.
pub async fn write_entries(
    pool: &SqlitePool,
    learner_id: &str,
    entries: &[(String, String)],
) -> Result<(), AppError> {
    if entries.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for (key, value) in entries {
        sqlx::query(
            r#"
            INSERT INTO progress_entries (learner_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(learner_id)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit progress entries: {:?}", e);
        AppError::from(e)
    })?;

    tracing::debug!(learner = learner_id, count = entries.len(), "Progress flushed");
    Ok(())
}
