//! libSQL storage layer for tracked channel state.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the current
//! latest item per channel (`latest_items`) and the append-only history of
//! superseded items (`archived_items`).
//!
//! **Access rules:**
//! - Tracker: read-write via [`Storage::open`]
//! - Inspection commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use channelwatch_shared::{
    ArchiveAction, ArchivedItem, ChannelItem, ChannelWatchError, LatestItem, Result, SearchResult,
};
use libsql::{Connection, Database, TransactionBehavior, params};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Payload columns shared by `latest_items` and `archived_items`, in row order.
const ITEM_COLUMNS: &str =
    "channel_id, item_id, title, url, thumbnail_url, description, search_results_json";

/// What [`Storage::record_latest`] did to a channel's latest row.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// No prior row; the item was inserted.
    Inserted,
    /// The stored row already has this item id; nothing was written.
    Unchanged,
    /// The prior row was archived as `replaced` and overwritten.
    Replaced { previous: LatestItem },
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    /// Serializes write transactions issued through this handle.
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChannelWatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
            write_lock: Mutex::new(()),
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ChannelWatchError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
            write_lock: Mutex::new(()),
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ChannelWatchError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ChannelWatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    /// Install `item` as its channel's latest, archiving whatever it replaces.
    ///
    /// The read, the comparison and both writes run inside one
    /// `BEGIN IMMEDIATE` transaction: either the archive row and the overwrite
    /// both land, or neither does.
    pub async fn record_latest(
        &self,
        item: &ChannelItem,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;

        match apply_transition(&tx, item, now).await {
            Ok(transition) => {
                tx.commit().await.map_err(db_err)?;
                Ok(transition)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Archive a channel's latest item as `removed` and delete the latest row.
    ///
    /// Returns the archived snapshot, or `None` if the channel had no row.
    pub async fn remove_latest(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LatestItem>> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;

        let outcome = remove_row(&tx, channel_id, now).await;

        match outcome {
            Ok(removed) => {
                tx.commit().await.map_err(db_err)?;
                Ok(removed)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Get a channel's latest item.
    pub async fn get_latest(&self, channel_id: &str) -> Result<Option<LatestItem>> {
        select_latest(&self.conn, channel_id).await
    }

    /// List every channel's latest item, ordered by channel id.
    pub async fn list_latest(&self) -> Result<Vec<LatestItem>> {
        let sql =
            format!("SELECT {ITEM_COLUMNS}, updated_at FROM latest_items ORDER BY channel_id");
        let mut rows = self.conn.query(&sql, params![]).await.map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_latest(&row)?);
        }
        Ok(results)
    }

    /// List a channel's archived items, newest first.
    pub async fn list_archived(&self, channel_id: &str) -> Result<Vec<ArchivedItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}, archived_at, action, id FROM archived_items
             WHERE channel_id = ?1 ORDER BY id DESC"
        );
        let mut rows = self
            .conn
            .query(&sql, params![channel_id])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_archived(&row)?);
        }
        Ok(results)
    }

    /// Count all archived rows across channels.
    pub async fn count_archived(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM archived_items", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as u64),
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction body
// ---------------------------------------------------------------------------

/// Read-compare-write for one channel. Must run inside a transaction.
async fn apply_transition(
    conn: &Connection,
    item: &ChannelItem,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let existing = select_latest(conn, &item.channel_id).await?;
    let results_json = encode_results(&item.search_results)?;
    let now_str = now.to_rfc3339();

    match existing {
        None => {
            let sql = format!(
                "INSERT INTO latest_items ({ITEM_COLUMNS}, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            );
            conn.execute(
                &sql,
                params![
                    item.channel_id.as_str(),
                    item.item_id.as_str(),
                    item.title.as_str(),
                    item.url.as_str(),
                    item.thumbnail_url.as_str(),
                    item.description.as_str(),
                    results_json.as_str(),
                    now_str.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
            debug!(channel_id = %item.channel_id, item_id = %item.item_id, "inserted latest item");
            Ok(Transition::Inserted)
        }
        Some(previous) if previous.item.item_id == item.item_id => Ok(Transition::Unchanged),
        Some(previous) => {
            archive_row(conn, &item.channel_id, ArchiveAction::Replaced, now).await?;
            conn.execute(
                "UPDATE latest_items SET
                   item_id = ?2,
                   title = ?3,
                   url = ?4,
                   thumbnail_url = ?5,
                   description = ?6,
                   search_results_json = ?7,
                   updated_at = ?8
                 WHERE channel_id = ?1",
                params![
                    item.channel_id.as_str(),
                    item.item_id.as_str(),
                    item.title.as_str(),
                    item.url.as_str(),
                    item.thumbnail_url.as_str(),
                    item.description.as_str(),
                    results_json.as_str(),
                    now_str.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
            debug!(
                channel_id = %item.channel_id,
                from = %previous.item.item_id,
                to = %item.item_id,
                "replaced latest item"
            );
            Ok(Transition::Replaced { previous })
        }
    }
}

/// Archive-as-removed then delete. Must run inside a transaction.
async fn remove_row(
    conn: &Connection,
    channel_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<LatestItem>> {
    let Some(existing) = select_latest(conn, channel_id).await? else {
        return Ok(None);
    };
    archive_row(conn, channel_id, ArchiveAction::Removed, now).await?;
    conn.execute(
        "DELETE FROM latest_items WHERE channel_id = ?1",
        params![channel_id],
    )
    .await
    .map_err(db_err)?;
    Ok(Some(existing))
}

/// Copy the channel's current latest row into `archived_items`.
async fn archive_row(
    conn: &Connection,
    channel_id: &str,
    action: ArchiveAction,
    now: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO archived_items ({ITEM_COLUMNS}, archived_at, action)
         SELECT {ITEM_COLUMNS}, ?2, ?3 FROM latest_items WHERE channel_id = ?1"
    );
    let inserted = conn
        .execute(
            &sql,
            params![channel_id, now.to_rfc3339(), action.as_str()],
        )
        .await
        .map_err(db_err)?;

    if inserted != 1 {
        return Err(ChannelWatchError::Storage(format!(
            "expected to archive 1 row for {channel_id}, archived {inserted}"
        )));
    }
    Ok(())
}

async fn select_latest(conn: &Connection, channel_id: &str) -> Result<Option<LatestItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS}, updated_at FROM latest_items WHERE channel_id = ?1");
    let mut rows = conn.query(&sql, params![channel_id]).await.map_err(db_err)?;

    match rows.next().await.map_err(db_err)? {
        Some(row) => Ok(Some(row_to_latest(&row)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> ChannelWatchError {
    ChannelWatchError::Storage(e.to_string())
}

fn encode_results(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string(results)
        .map_err(|e| ChannelWatchError::Storage(format!("cannot encode search results: {e}")))
}

fn decode_results(raw: Option<String>) -> Result<Vec<SearchResult>> {
    match raw {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| ChannelWatchError::Storage(format!("invalid search_results_json: {e}"))),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ChannelWatchError::Storage(format!("invalid date: {e}")))
}

/// Map the leading [`ITEM_COLUMNS`] of a row to a [`ChannelItem`].
fn row_to_item(row: &libsql::Row) -> Result<ChannelItem> {
    Ok(ChannelItem {
        channel_id: row.get::<String>(0).map_err(db_err)?,
        item_id: row.get::<String>(1).map_err(db_err)?,
        title: row.get::<String>(2).map_err(db_err)?,
        url: row.get::<String>(3).map_err(db_err)?,
        thumbnail_url: row.get::<String>(4).map_err(db_err)?,
        description: row.get::<String>(5).unwrap_or_default(),
        search_results: decode_results(row.get::<String>(6).ok())?,
    })
}

fn row_to_latest(row: &libsql::Row) -> Result<LatestItem> {
    let updated_at: String = row.get(7).map_err(db_err)?;
    Ok(LatestItem {
        item: row_to_item(row)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_archived(row: &libsql::Row) -> Result<ArchivedItem> {
    let archived_at: String = row.get(7).map_err(db_err)?;
    let action: String = row.get(8).map_err(db_err)?;
    Ok(ArchivedItem {
        id: row.get::<i64>(9).map_err(db_err)?,
        item: row_to_item(row)?,
        archived_at: parse_timestamp(&archived_at)?,
        action: action.parse().map_err(ChannelWatchError::Storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn item(channel_id: &str, item_id: &str) -> ChannelItem {
        ChannelItem {
            channel_id: channel_id.into(),
            item_id: item_id.into(),
            title: format!("Title {item_id}"),
            url: format!("https://www.youtube.com/watch?v={item_id}"),
            thumbnail_url: format!("https://i.ytimg.com/vi/{item_id}/hqdefault.jpg"),
            description: format!("Description of {item_id}"),
            search_results: vec![SearchResult {
                url: "https://example.com/a".into(),
                title: "A".into(),
                snippet: "snippet".into(),
                context: "context text".into(),
            }],
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn first_record_inserts_without_archiving() {
        let storage = test_storage().await;
        let v1 = item("UC1", "v1");

        let transition = storage.record_latest(&v1, Utc::now()).await.unwrap();
        assert_eq!(transition, Transition::Inserted);

        let latest = storage.get_latest("UC1").await.unwrap().expect("row");
        assert_eq!(latest.item, v1);
        assert_eq!(storage.count_archived().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn same_item_is_unchanged_and_writes_nothing() {
        let storage = test_storage().await;
        let first_seen = Utc::now() - Duration::minutes(30);
        storage.record_latest(&item("UC1", "v1"), first_seen).await.unwrap();

        let mut retitled = item("UC1", "v1");
        retitled.title = "Edited title".into();
        let transition = storage.record_latest(&retitled, Utc::now()).await.unwrap();
        assert_eq!(transition, Transition::Unchanged);

        let latest = storage.get_latest("UC1").await.unwrap().unwrap();
        assert_eq!(latest.item.title, "Title v1");
        assert_eq!(latest.updated_at.timestamp(), first_seen.timestamp());
        assert_eq!(storage.count_archived().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn new_item_archives_previous_payload() {
        let storage = test_storage().await;
        let v1 = item("UC1", "v1");
        storage.record_latest(&v1, Utc::now()).await.unwrap();
        let before = storage.get_latest("UC1").await.unwrap().unwrap();

        let v2 = item("UC1", "v2");
        let transition = storage.record_latest(&v2, Utc::now()).await.unwrap();
        assert_eq!(
            transition,
            Transition::Replaced {
                previous: before.clone()
            }
        );

        let latest = storage.get_latest("UC1").await.unwrap().unwrap();
        assert_eq!(latest.item, v2);

        let archived = storage.list_archived("UC1").await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].item, before.item);
        assert_eq!(archived[0].action, ArchiveAction::Replaced);
    }

    #[tokio::test]
    async fn failed_overwrite_rolls_back_archive_row() {
        let storage = test_storage().await;
        storage.record_latest(&item("UC1", "v1"), Utc::now()).await.unwrap();
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_overwrite BEFORE UPDATE ON latest_items
                 BEGIN SELECT RAISE(ABORT, 'overwrite rejected'); END;",
            )
            .await
            .unwrap();

        let err = storage
            .record_latest(&item("UC1", "v2"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelWatchError::Storage(_)));

        assert_eq!(storage.count_archived().await.unwrap(), 0);
        let latest = storage.get_latest("UC1").await.unwrap().unwrap();
        assert_eq!(latest.item.item_id, "v1");
    }

    #[tokio::test]
    async fn concurrent_updates_on_one_channel_lose_nothing() {
        let storage = std::sync::Arc::new(test_storage().await);
        storage.record_latest(&item("UC1", "v0"), Utc::now()).await.unwrap();

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage
                        .record_latest(&item("UC1", &format!("v{n}")), Utc::now())
                        .await
                })
            })
            .collect();

        for handle in handles {
            let transition = handle.await.unwrap().unwrap();
            assert!(matches!(transition, Transition::Replaced { .. }));
        }

        let archived = storage.list_archived("UC1").await.unwrap();
        assert_eq!(archived.len(), 8);
        assert!(archived.iter().all(|a| a.action == ArchiveAction::Replaced));

        // every id except the surviving latest one was archived exactly once
        let latest = storage.get_latest("UC1").await.unwrap().unwrap();
        let mut ids: Vec<String> = archived.into_iter().map(|a| a.item.item_id).collect();
        ids.push(latest.item.item_id);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 9);
    }

    #[tokio::test]
    async fn history_is_append_only_and_newest_first() {
        let storage = test_storage().await;
        for id in ["v1", "v2", "v3"] {
            storage.record_latest(&item("UC1", id), Utc::now()).await.unwrap();
        }
        storage.record_latest(&item("UC2", "x1"), Utc::now()).await.unwrap();

        let archived = storage.list_archived("UC1").await.unwrap();
        let ids: Vec<&str> = archived.iter().map(|a| a.item.item_id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);
        assert!(storage.list_archived("UC2").await.unwrap().is_empty());
        assert_eq!(storage.list_latest().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_description_and_results_roundtrip() {
        let storage = test_storage().await;
        let mut bare = item("UC1", "v1");
        bare.description = String::new();
        bare.search_results = Vec::new();
        storage.record_latest(&bare, Utc::now()).await.unwrap();

        let latest = storage.get_latest("UC1").await.unwrap().unwrap();
        assert!(latest.item.description.is_empty());
        assert!(latest.item.search_results.is_empty());
    }

    #[tokio::test]
    async fn remove_latest_archives_as_removed() {
        let storage = test_storage().await;
        storage.record_latest(&item("UC1", "v1"), Utc::now()).await.unwrap();

        let removed = storage.remove_latest("UC1", Utc::now()).await.unwrap();
        assert_eq!(removed.map(|r| r.item.item_id), Some("v1".to_string()));
        assert!(storage.get_latest("UC1").await.unwrap().is_none());

        let archived = storage.list_archived("UC1").await.unwrap();
        assert_eq!(archived[0].action, ArchiveAction::Removed);

        assert!(storage.remove_latest("UC1", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("cw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.record_latest(&item("UC1", "v1"), Utc::now()).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_latest().await.unwrap().len(), 1);
        let result = ro.record_latest(&item("UC1", "v2"), Utc::now()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_database() {
        let tmp = std::env::temp_dir().join(format!("cw_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
