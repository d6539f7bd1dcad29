use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::EventRecord;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub event_id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
}

impl StoredEvent {
    pub fn into_record(self) -> EventRecord {
        EventRecord {
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            weather: None,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let timestamp: i64 = row.try_get("event_date")?;
        let date = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| anyhow!("stored event date {timestamp} is out of range"))?;
        Ok(Self {
            event_id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            date,
            location: row.try_get("location")?,
        })
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Stores a new event. Weather is never persisted.
    pub async fn insert_event(&self, event: &EventRecord) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO events (title, description, event_date, location)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date.timestamp())
        .bind(&event.location)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert event")?;
        let event_id = rec.get::<i64, _>(0);
        tracing::debug!(event_id, title = %event.title, "stored event");
        Ok(event_id)
    }

    /// Events dated strictly after `after`, soonest first.
    pub async fn list_upcoming_events(
        &self,
        after: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT id, title, description, event_date, location
             FROM events
             WHERE event_date > ?
             ORDER BY event_date ASC, id ASC
             LIMIT ?",
        )
        .bind(after.timestamp())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to list upcoming events")?;
        rows.iter().map(StoredEvent::from_row).collect()
    }

    pub async fn count_events(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
