//! Repository Implementation

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::StorageError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS daily_drive (
        day TEXT PRIMARY KEY,
        seconds INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        started_at TEXT NOT NULL,
        ended_at TEXT NOT NULL,
        session_seconds INTEGER NOT NULL,
        daily_seconds INTEGER NOT NULL,
        alarm_count INTEGER NOT NULL,
        peak_fatigue REAL NOT NULL,
        frames INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions (started_at)",
];

/// One finished monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub session_seconds: u64,
    /// Daily drive cache after this session was committed
    pub daily_seconds: u64,
    pub alarm_count: u32,
    pub peak_fatigue: f64,
    pub frames: u64,
}

impl SessionRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, StorageError> {
        let id: String = row.try_get("id")?;
        let started_at: String = row.try_get("started_at")?;
        let ended_at: String = row.try_get("ended_at")?;

        Ok(Self {
            id: Uuid::parse_str(&id).map_err(|e| StorageError::CorruptRow(e.to_string()))?,
            started_at: parse_time(&started_at)?,
            ended_at: parse_time(&ended_at)?,
            session_seconds: to_u64(row.try_get("session_seconds")?),
            daily_seconds: to_u64(row.try_get("daily_seconds")?),
            alarm_count: u32::try_from(row.try_get::<i64, _>("alarm_count")?).unwrap_or(0),
            peak_fatigue: row.try_get("peak_fatigue")?,
            frames: to_u64(row.try_get("frames")?),
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow(format!("{}: {}", raw, e)))
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// SQLite-backed repository
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open (creating if missing) the database at `url` and apply the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        info!("Opening database: {}", url);
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    /// Create tables if they do not exist
    pub async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Database schema up to date");
        Ok(())
    }

    /// Committed drive seconds for `day`, zero if none
    pub async fn load_daily(&self, day: NaiveDate) -> Result<u64, StorageError> {
        let seconds: Option<i64> = sqlx::query_scalar("SELECT seconds FROM daily_drive WHERE day = ?")
            .bind(day_key(day))
            .fetch_optional(&self.pool)
            .await?;
        Ok(seconds.map(to_u64).unwrap_or(0))
    }

    /// Overwrite the committed drive seconds for `day`
    pub async fn save_daily(&self, day: NaiveDate, seconds: u64) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO daily_drive (day, seconds) VALUES (?, ?)
             ON CONFLICT(day) DO UPDATE SET seconds = excluded.seconds",
        )
        .bind(day_key(day))
        .bind(to_i64(seconds))
        .execute(&self.pool)
        .await?;
        debug!("Saved {}s of drive time for {}", seconds, day);
        Ok(())
    }

    pub async fn record_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sessions
             (id, started_at, ended_at, session_seconds, daily_seconds, alarm_count, peak_fatigue, frames)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.started_at.to_rfc3339())
        .bind(record.ended_at.to_rfc3339())
        .bind(to_i64(record.session_seconds))
        .bind(to_i64(record.daily_seconds))
        .bind(i64::from(record.alarm_count))
        .bind(record.peak_fatigue)
        .bind(to_i64(record.frames))
        .execute(&self.pool)
        .await?;
        info!("Recorded session {} ({}s)", record.id, record.session_seconds);
        Ok(())
    }

    /// Most recent sessions first
    pub async fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRecord>, StorageError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY started_at DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(SessionRecord::from_row).collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn memory_repo() -> Repository {
        Repository::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn session(start_hour: u32, seconds: u64) -> SessionRecord {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, start_hour, 0, 0).unwrap();
        SessionRecord {
            id: Uuid::new_v4(),
            started_at,
            ended_at: started_at + Duration::seconds(seconds as i64),
            session_seconds: seconds,
            daily_seconds: seconds,
            alarm_count: 2,
            peak_fatigue: 41.5,
            frames: seconds * 30,
        }
    }

    #[tokio::test]
    async fn test_daily_defaults_to_zero() {
        let repo = memory_repo().await;
        assert_eq!(repo.load_daily(day(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_daily_upsert() {
        let repo = memory_repo().await;
        repo.save_daily(day(1), 120).await.unwrap();
        repo.save_daily(day(1), 300).await.unwrap();
        repo.save_daily(day(2), 10).await.unwrap();

        assert_eq!(repo.load_daily(day(1)).await.unwrap(), 300);
        assert_eq!(repo.load_daily(day(2)).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_sessions_newest_first() {
        let repo = memory_repo().await;
        let early = session(8, 600);
        let late = session(14, 1800);
        repo.record_session(&early).await.unwrap();
        repo.record_session(&late).await.unwrap();

        let sessions = repo.recent_sessions(10).await.unwrap();
        assert_eq!(sessions, vec![late.clone(), early]);

        let limited = repo.recent_sessions(1).await.unwrap();
        assert_eq!(limited, vec![late]);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let repo = memory_repo().await;
        repo.save_daily(day(3), 42).await.unwrap();
        repo.migrate().await.unwrap();
        assert_eq!(repo.load_daily(day(3)).await.unwrap(), 42);
    }
}
