//! SQL migration definitions for the channelwatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: latest_items, archived_items",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Current latest item per channel (one row per channel)
CREATE TABLE IF NOT EXISTS latest_items (
    channel_id          TEXT PRIMARY KEY,
    item_id             TEXT NOT NULL,
    title               TEXT NOT NULL,
    url                 TEXT NOT NULL,
    thumbnail_url       TEXT NOT NULL,
    description         TEXT,
    search_results_json TEXT,
    updated_at          TEXT NOT NULL
);

-- Append-only history of superseded items
CREATE TABLE IF NOT EXISTS archived_items (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id          TEXT NOT NULL,
    item_id             TEXT NOT NULL,
    title               TEXT NOT NULL,
    url                 TEXT NOT NULL,
    thumbnail_url       TEXT NOT NULL,
    description         TEXT,
    search_results_json TEXT,
    archived_at         TEXT NOT NULL,
    action              TEXT NOT NULL CHECK (action IN ('replaced', 'removed'))
);

CREATE INDEX IF NOT EXISTS idx_archived_items_channel ON archived_items(channel_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
