//! Profile and interaction persistence
//!
//! SQLite through sqlx when a `DATABASE_URL` is configured, otherwise an
//! in-memory backend for development and tests. Only one business profile
//! is active at a time; saving again updates it in place.

use crate::error::AdvisorError;
use crate::models::{Interaction, Profile, StoredProfile};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        business_type TEXT NOT NULL,
        location TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS interactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        profile_id INTEGER,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        FOREIGN KEY (profile_id) REFERENCES profiles (id)
    )"#,
];

#[derive(Default)]
struct MemoryState {
    profile: Option<StoredProfile>,
    interactions: Vec<Interaction>,
    next_profile_id: i64,
}

enum Backend {
    InMemory(RwLock<MemoryState>),
    Sqlite(SqlitePool),
}

pub struct ProfileStore {
    backend: Backend,
}

impl ProfileStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory(RwLock::new(MemoryState::default())),
        }
    }

    /// Open the configured database and create the tables, or fall back to
    /// the in-memory backend when no URL is given.
    pub async fn initialize(database_url: Option<&str>) -> Result<Self> {
        match database_url {
            Some(url) if !url.trim().is_empty() => Self::connect_sqlite(url).await,
            _ => {
                info!("No DATABASE_URL configured, profiles are kept in memory");
                Ok(Self::in_memory())
            }
        }
    }

    pub async fn connect_sqlite(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `sqlite::memory:` is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(*statement).execute(&pool).await?;
        }

        info!(database_url, "Profile store connected");
        Ok(Self {
            backend: Backend::Sqlite(pool),
        })
    }

    pub async fn shutdown(&self) {
        if let Backend::Sqlite(pool) = &self.backend {
            pool.close().await;
            debug!("Profile store pool closed");
        }
    }

    /// Save the active profile. The first save inserts, later saves update
    /// the same row and keep its id and creation time.
    pub async fn save(&self, profile: Profile) -> Result<StoredProfile> {
        let profile = Profile {
            owner_name: profile.owner_name.trim().to_string(),
            business_type: profile.business_type.trim().to_string(),
            location: profile.location.trim().to_string(),
        };
        if profile.owner_name.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "owner name must not be empty".to_string(),
            ));
        }

        match &self.backend {
            Backend::InMemory(state) => {
                let mut state = state.write().await;
                let existing = state.profile.take();
                let stored = match existing {
                    Some(existing) => StoredProfile {
                        profile,
                        ..existing
                    },
                    None => {
                        state.next_profile_id += 1;
                        StoredProfile {
                            id: state.next_profile_id,
                            profile,
                            created_at: Utc::now(),
                        }
                    }
                };
                state.profile = Some(stored.clone());
                Ok(stored)
            }
            Backend::Sqlite(pool) => {
                let existing = load_sqlite(pool).await?;
                let stored = match existing {
                    Some(existing) => {
                        sqlx::query(
                            "UPDATE profiles SET name = ?, business_type = ?, location = ? WHERE id = ?",
                        )
                        .bind(&profile.owner_name)
                        .bind(&profile.business_type)
                        .bind(&profile.location)
                        .bind(existing.id)
                        .execute(pool)
                        .await?;

                        StoredProfile {
                            profile,
                            ..existing
                        }
                    }
                    None => {
                        let created_at = Utc::now();
                        let result = sqlx::query(
                            "INSERT INTO profiles (name, business_type, location, created_at) VALUES (?, ?, ?, ?)",
                        )
                        .bind(&profile.owner_name)
                        .bind(&profile.business_type)
                        .bind(&profile.location)
                        .bind(created_at.to_rfc3339())
                        .execute(pool)
                        .await?;

                        StoredProfile {
                            id: result.last_insert_rowid(),
                            profile,
                            created_at,
                        }
                    }
                };

                debug!(profile_id = stored.id, "Profile saved");
                Ok(stored)
            }
        }
    }

    pub async fn load(&self) -> Result<Option<StoredProfile>> {
        match &self.backend {
            Backend::InMemory(state) => Ok(state.read().await.profile.clone()),
            Backend::Sqlite(pool) => load_sqlite(pool).await,
        }
    }

    /// Append one question/answer pair to the interaction log
    pub async fn record_interaction(
        &self,
        profile_id: Option<i64>,
        question: &str,
        answer: &str,
    ) -> Result<Interaction> {
        let timestamp = Utc::now();

        match &self.backend {
            Backend::InMemory(state) => {
                let mut state = state.write().await;
                let interaction = Interaction {
                    id: state.interactions.len() as i64 + 1,
                    profile_id,
                    question: question.to_string(),
                    answer: answer.to_string(),
                    timestamp,
                };
                state.interactions.push(interaction.clone());
                Ok(interaction)
            }
            Backend::Sqlite(pool) => {
                let result = sqlx::query(
                    "INSERT INTO interactions (profile_id, question, answer, timestamp) VALUES (?, ?, ?, ?)",
                )
                .bind(profile_id)
                .bind(question)
                .bind(answer)
                .bind(timestamp.to_rfc3339())
                .execute(pool)
                .await?;

                Ok(Interaction {
                    id: result.last_insert_rowid(),
                    profile_id,
                    question: question.to_string(),
                    answer: answer.to_string(),
                    timestamp,
                })
            }
        }
    }

    /// The most recent `limit` interactions, oldest first
    pub async fn interactions(&self, limit: usize) -> Result<Vec<Interaction>> {
        match &self.backend {
            Backend::InMemory(state) => {
                let state = state.read().await;
                let skip = state.interactions.len().saturating_sub(limit);
                Ok(state.interactions[skip..].to_vec())
            }
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(
                    "SELECT id, profile_id, question, answer, timestamp FROM (
                        SELECT * FROM interactions ORDER BY id DESC LIMIT ?
                    ) ORDER BY id ASC",
                )
                .bind(limit as i64)
                .fetch_all(pool)
                .await?;

                rows.iter().map(row_to_interaction).collect()
            }
        }
    }
}

async fn load_sqlite(pool: &SqlitePool) -> Result<Option<StoredProfile>> {
    let row = sqlx::query(
        "SELECT id, name, business_type, location, created_at FROM profiles ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_profile).transpose()
}

fn row_to_profile(row: &SqliteRow) -> Result<StoredProfile> {
    let created_at: String = row.try_get("created_at")?;

    Ok(StoredProfile {
        id: row.try_get("id")?,
        profile: Profile {
            owner_name: row.try_get("name")?,
            business_type: row.try_get("business_type")?,
            location: row.try_get("location")?,
        },
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_interaction(row: &SqliteRow) -> Result<Interaction> {
    let timestamp: String = row.try_get("timestamp")?;

    Ok(Interaction {
        id: row.try_get("id")?,
        profile_id: row.try_get("profile_id")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AdvisorError::Database(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, business: &str) -> Profile {
        Profile {
            owner_name: name.to_string(),
            business_type: business.to_string(),
            location: "Bandung".to_string(),
        }
    }

    async fn stores() -> Vec<ProfileStore> {
        vec![
            ProfileStore::in_memory(),
            ProfileStore::initialize(Some("sqlite::memory:")).await.unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_save_overwrites_active_profile() {
        for store in stores().await {
            assert!(store.load().await.unwrap().is_none());

            let first = store.save(profile("Siti", "kuliner")).await.unwrap();
            let second = store.save(profile(" Budi ", "fashion")).await.unwrap();

            assert_eq!(first.id, second.id);
            assert_eq!(second.profile.owner_name, "Budi");

            let loaded = store.load().await.unwrap().unwrap();
            assert_eq!(loaded.id, first.id);
            assert_eq!(loaded.profile.business_type, "fashion");
        }
    }

    #[tokio::test]
    async fn test_empty_owner_name_rejected() {
        for store in stores().await {
            let err = store.save(profile("   ", "kuliner")).await.unwrap_err();
            assert!(matches!(err, AdvisorError::InvalidInput(_)));
            assert!(store.load().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_interactions_newest_last() {
        for store in stores().await {
            let saved = store.save(profile("Siti", "kuliner")).await.unwrap();
            for i in 1..=4 {
                store
                    .record_interaction(Some(saved.id), &format!("q{}", i), &format!("a{}", i))
                    .await
                    .unwrap();
            }
            store.record_interaction(None, "q5", "a5").await.unwrap();

            let recent = store.interactions(3).await.unwrap();
            let questions: Vec<&str> = recent.iter().map(|i| i.question.as_str()).collect();
            assert_eq!(questions, vec!["q3", "q4", "q5"]);
            assert_eq!(recent[0].profile_id, Some(saved.id));
            assert_eq!(recent[2].profile_id, None);
        }
    }

    #[tokio::test]
    async fn test_initialize_without_url_is_in_memory() {
        let store = ProfileStore::initialize(None).await.unwrap();
        assert!(matches!(store.backend, Backend::InMemory(_)));
        store.shutdown().await;
    }
}
