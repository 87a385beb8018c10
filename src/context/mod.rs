//! Per-user dialog session state, persisted in SQLite.

use chrono::{DateTime, Utc};
use rusqlite::{params, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::db::{migrate, Db};
use crate::error::Result;

/// User and session id of the record kept after [`ContextStore::clean_context`].
pub const SENTINEL_ID: &str = "000";
const SENTINEL_MAX_DURATION: u32 = 3;

/// Where a user currently is in a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogContext {
    pub id: Uuid,
    pub user_id: String,
    pub session_id: String,
    /// Consecutive unusable inputs tolerated before the dialog resets.
    pub max_duration_invalid_input: u32,
    pub duration_invalid_input: u32,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub current_vertex_id: Option<String>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogContext {
    pub fn new(user_id: &str, session_id: &str, max_duration_invalid_input: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            max_duration_invalid_input,
            duration_invalid_input: 0,
            scenario: None,
            current_vertex_id: None,
            slots: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Count one more invalid input; true once the limit is reached.
    pub fn register_invalid_input(&mut self) -> bool {
        self.duration_invalid_input += 1;
        self.duration_invalid_input >= self.max_duration_invalid_input
    }

    /// Forget scenario progress, keeping identity and limits.
    pub fn reset(&mut self) {
        self.duration_invalid_input = 0;
        self.scenario = None;
        self.current_vertex_id = None;
        self.slots.clear();
    }
}

/// SQLite-backed store of [`DialogContext`] records keyed by (user, session).
#[derive(Debug, Clone)]
pub struct ContextStore {
    db: Db,
    max_duration_invalid_input: u32,
}

impl ContextStore {
    /// Open (creating if needed) the store at `db_path` and apply migrations.
    pub async fn open<P: AsRef<Path>>(db_path: P, max_duration_invalid_input: u32) -> Result<Self> {
        let db = Db::new(db_path);
        db.with_connection(|conn| migrate::run_migrations(conn)).await?;
        Ok(Self {
            db,
            max_duration_invalid_input,
        })
    }

    /// Context of (user, session), creating and persisting a fresh one on first access.
    ///
    /// The flag is true when the context was just created.
    pub async fn get_context(&self, user_id: &str, session_id: &str) -> Result<(bool, DialogContext)> {
        let user = user_id.to_string();
        let session = session_id.to_string();
        let max = self.max_duration_invalid_input;

        let result = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let fresh = DialogContext::new(&user, &session, max);
                let created = tx.execute(
                    "INSERT INTO dialog_contexts (user_id, session_id, context, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(user_id, session_id) DO NOTHING",
                    params![
                        fresh.user_id,
                        fresh.session_id,
                        serde_json::to_string(&fresh)?,
                        fresh.created_at.to_rfc3339(),
                        fresh.updated_at.to_rfc3339(),
                    ],
                )? == 1;

                let stored: String = tx.query_row(
                    "SELECT context FROM dialog_contexts WHERE user_id = ?1 AND session_id = ?2",
                    params![user, session],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok((created, serde_json::from_str(&stored)?))
            })
            .await;

        if let Err(e) = &result {
            log::error!("get_context({}, {}) failed: {}", user_id, session_id, e);
        }
        result
    }

    /// Replace the stored context of (user, session). False when no record exists.
    pub async fn update_context(&self, user_id: &str, session_id: &str, context: &DialogContext) -> Result<bool> {
        let user = user_id.to_string();
        let session = session_id.to_string();
        let mut context = context.clone();
        context.updated_at = Utc::now();

        let result = self
            .db
            .with_connection(move |conn| {
                let json = serde_json::to_string(&context)?;
                let changed = conn.execute(
                    "UPDATE dialog_contexts SET context = ?1, updated_at = ?2
                     WHERE user_id = ?3 AND session_id = ?4",
                    params![json, context.updated_at.to_rfc3339(), user, session],
                )?;
                Ok(changed > 0)
            })
            .await;

        if let Err(e) = &result {
            log::error!("update_context({}, {}) failed: {}", user_id, session_id, e);
        }
        result
    }

    /// Delete every context and reseed the sentinel record.
    pub async fn clean_context(&self) -> Result<()> {
        let result = self
            .db
            .with_connection(|conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM dialog_contexts", [])?;
                insert(&tx, &DialogContext::new(SENTINEL_ID, SENTINEL_ID, SENTINEL_MAX_DURATION))?;
                tx.commit()?;
                log::info!("Removed {} dialog contexts", removed);
                Ok(())
            })
            .await;

        if let Err(e) = &result {
            log::error!("clean_context failed: {}", e);
        }
        result
    }

    pub async fn count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM dialog_contexts", [], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await
    }
}

fn insert(conn: &rusqlite::Connection, context: &DialogContext) -> Result<()> {
    conn.execute(
        "INSERT INTO dialog_contexts (user_id, session_id, context, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            context.user_id,
            context.session_id,
            serde_json::to_string(context)?,
            context.created_at.to_rfc3339(),
            context.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> ContextStore {
        ContextStore::open(dir.path().join("contexts.db"), 3).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_context_creates_once() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let (created, first) = store.get_context("alice", "s1").await.unwrap();
        assert!(created);
        assert_eq!(first.max_duration_invalid_input, 3);
        assert_eq!(first.duration_invalid_input, 0);

        let (created, again) = store.get_context("alice", "s1").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);

        let (created, _) = store.get_context("alice", "s2").await.unwrap();
        assert!(created);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for round in 0..10 {
            let session = format!("s{}", round);
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let session = session.clone();
                    tokio::spawn(async move { store.get_context("alice", &session).await })
                })
                .collect();

            let mut created = 0;
            let mut ids = Vec::new();
            for handle in handles {
                let (new, ctx) = handle.await.unwrap().unwrap();
                created += new as usize;
                ids.push(ctx.id);
            }
            assert_eq!(created, 1, "round {}", round);
            ids.dedup();
            assert_eq!(ids.len(), 1, "round {}", round);
        }
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_update_context_persists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let (_, mut ctx) = store.get_context("bob", "s1").await.unwrap();
        ctx.scenario = Some("shopping".to_string());
        ctx.slots.insert("brand".to_string(), "Contoso".to_string());
        assert!(!ctx.register_invalid_input());

        assert!(store.update_context("bob", "s1", &ctx).await.unwrap());

        let (created, stored) = store.get_context("bob", "s1").await.unwrap();
        assert!(!created);
        assert_eq!(stored.scenario.as_deref(), Some("shopping"));
        assert_eq!(stored.slots["brand"], "Contoso");
        assert_eq!(stored.duration_invalid_input, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_context_is_false() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let ctx = DialogContext::new("nobody", "s0", 3);
        assert!(!store.update_context("nobody", "s0", &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_context_reseeds_sentinel() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        store.get_context("alice", "s1").await.unwrap();
        store.get_context("bob", "s1").await.unwrap();

        store.clean_context().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let (created, sentinel) = store.get_context(SENTINEL_ID, SENTINEL_ID).await.unwrap();
        assert!(!created);
        assert_eq!(sentinel.max_duration_invalid_input, 3);
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = store(&dir).await.get_context("alice", "s1").await.unwrap();

        let reopened = store(&dir).await;
        let (created, stored) = reopened.get_context("alice", "s1").await.unwrap();
        assert!(!created);
        assert_eq!(stored.id, ctx.id);
    }

    #[test]
    fn test_invalid_input_limit_and_reset() {
        let mut ctx = DialogContext::new("u", "s", 2);
        ctx.scenario = Some("shopping".to_string());
        assert!(!ctx.register_invalid_input());
        assert!(ctx.register_invalid_input());
        ctx.reset();
        assert_eq!(ctx.duration_invalid_input, 0);
        assert!(ctx.scenario.is_none());
    }
}
