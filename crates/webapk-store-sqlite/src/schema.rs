//! SQL schema for the installed-app registry.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS apps (
    app_id                       TEXT PRIMARY KEY,
    manifest_url                 TEXT NOT NULL,
    scope                        TEXT NOT NULL,
    start_url                    TEXT NOT NULL,
    name                         TEXT NOT NULL,
    short_name                   TEXT NOT NULL DEFAULT '',
    display                      TEXT NOT NULL DEFAULT 'browser',
    orientation                  TEXT NOT NULL DEFAULT 'default',
    theme_color                  INTEGER,          -- ARGB or NULL
    background_color             INTEGER,          -- ARGB or NULL
    icon_hashes                  TEXT NOT NULL DEFAULT '{}',  -- JSON url -> hash
    shell_version                INTEGER,          -- NULL: never checked
    registered_at                TEXT NOT NULL,    -- RFC 3339 UTC
    last_check_at                TEXT,
    last_update_completed_at     TEXT,
    last_update_succeeded        INTEGER NOT NULL DEFAULT 0,
    relaxed_updates              INTEGER NOT NULL DEFAULT 0,
    last_requested_shell_version INTEGER,
    dismissed_disclosure         INTEGER NOT NULL DEFAULT 0,
    pending_update_path          TEXT
);

CREATE INDEX IF NOT EXISTS apps_pending_idx
    ON apps(pending_update_path) WHERE pending_update_path IS NOT NULL;

PRAGMA user_version = 1;
";
