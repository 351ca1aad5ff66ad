//! SQL schema for the Shapeshift metadata tables.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS shapeshift_models (
    model_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    table_name  TEXT NOT NULL,
    marker      INTEGER NOT NULL DEFAULT 0 CHECK (marker >= 0),
    created_at  TEXT NOT NULL,       -- ISO 8601 UTC
    purged_at   TEXT                 -- set once the table is dropped
);

-- Names and tables are unique among live models only; purged declarations
-- are kept for audit and release both.
CREATE UNIQUE INDEX IF NOT EXISTS shapeshift_models_live_name
    ON shapeshift_models(name) WHERE purged_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS shapeshift_models_live_table
    ON shapeshift_models(table_name) WHERE purged_at IS NULL;

CREATE TABLE IF NOT EXISTS shapeshift_fields (
    field_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    data_type   TEXT NOT NULL,       -- 'character' | 'text' | 'integer' | ...
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS shapeshift_attachments (
    model_id     TEXT NOT NULL REFERENCES shapeshift_models(model_id),
    field_id     TEXT NOT NULL REFERENCES shapeshift_fields(field_id),
    required     INTEGER NOT NULL DEFAULT 0,
    is_unique    INTEGER NOT NULL DEFAULT 0,
    max_length   INTEGER,
    default_json TEXT,               -- JSON-encoded Value or NULL
    position     INTEGER NOT NULL,
    modified_at  TEXT NOT NULL,
    PRIMARY KEY (model_id, field_id)
);

CREATE INDEX IF NOT EXISTS shapeshift_attachments_field_idx
    ON shapeshift_attachments(field_id);

PRAGMA user_version = 1;
";
