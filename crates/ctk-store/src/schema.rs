//! Logical schema and forward-only migrations.
//!
//! Hand-written `CREATE TABLE IF NOT EXISTS` DDL executed at connection
//! open time rather than an external migration tool, since this crate has
//! no build-time SQLx CLI step to lean on.

use rusqlite::Connection;

/// Bump whenever the DDL below changes in a way that requires a migration
/// step. Persisted in `ctk_meta`.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_META: &str = "
CREATE TABLE IF NOT EXISTS ctk_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const CREATE_CONVERSATIONS: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    title TEXT,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    source TEXT,
    model TEXT,
    project TEXT,
    starred_at TEXT,
    pinned_at TEXT,
    archived_at TEXT,
    version TEXT NOT NULL,
    format TEXT NOT NULL,
    custom_data TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_conversations_source ON conversations(source);
CREATE INDEX IF NOT EXISTS idx_conversations_model ON conversations(model);
CREATE INDEX IF NOT EXISTS idx_conversations_project ON conversations(project);
CREATE INDEX IF NOT EXISTS idx_conversations_starred ON conversations(starred_at);
CREATE INDEX IF NOT EXISTS idx_conversations_pinned ON conversations(pinned_at);
CREATE INDEX IF NOT EXISTS idx_conversations_archived ON conversations(archived_at);
CREATE INDEX IF NOT EXISTS idx_conversations_created ON conversations(created_at);
CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_slug ON conversations(slug);
";

const CREATE_MESSAGES: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    parent_id TEXT,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT,
    seq INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
CREATE INDEX IF NOT EXISTS idx_messages_parent ON messages(parent_id);
";

const CREATE_TAGS: &str = "
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS conversation_tags (
    conv_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    tag_name TEXT NOT NULL REFERENCES tags(name) ON DELETE CASCADE,
    PRIMARY KEY (conv_id, tag_name)
);
CREATE INDEX IF NOT EXISTS idx_conversation_tags_tag ON conversation_tags(tag_name);
";

const CREATE_FTS: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS conversation_fts USING fts5(
    conv_id UNINDEXED,
    title,
    body
);
";

const CREATE_EMBEDDINGS: &str = "
CREATE TABLE IF NOT EXISTS embeddings (
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    model TEXT,
    chunking TEXT NOT NULL,
    aggregation TEXT NOT NULL,
    dims INTEGER NOT NULL,
    vector BLOB NOT NULL,
    created_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    PRIMARY KEY (conversation_id, provider, model, chunking, aggregation)
);
CREATE INDEX IF NOT EXISTS idx_embeddings_config_hash ON embeddings(config_hash);
";

const CREATE_SIMILARITIES: &str = "
CREATE TABLE IF NOT EXISTS similarities (
    a_id TEXT NOT NULL,
    b_id TEXT NOT NULL,
    metric TEXT NOT NULL,
    provider TEXT NOT NULL,
    similarity REAL NOT NULL,
    computed_at TEXT NOT NULL,
    PRIMARY KEY (a_id, b_id, metric, provider)
);
CREATE INDEX IF NOT EXISTS idx_similarities_a ON similarities(a_id);
CREATE INDEX IF NOT EXISTS idx_similarities_b ON similarities(b_id);
";

pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_META)?;
    conn.execute_batch(CREATE_CONVERSATIONS)?;
    conn.execute_batch(CREATE_MESSAGES)?;
    conn.execute_batch(CREATE_TAGS)?;
    conn.execute_batch(CREATE_FTS)?;
    conn.execute_batch(CREATE_EMBEDDINGS)?;
    conn.execute_batch(CREATE_SIMILARITIES)?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM ctk_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0).map(|v| v.parse().unwrap_or(0)),
        )
        .ok();
    match existing {
        None => {
            conn.execute(
                "INSERT INTO ctk_meta (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(v) if v < SCHEMA_VERSION => {
            run_migrations(conn, v)?;
            conn.execute(
                "UPDATE ctk_meta SET value = ?1 WHERE key = 'schema_version'",
                [SCHEMA_VERSION.to_string()],
            )?;
        }
        _ => {}
    }
    Ok(())
}

/// Forward-only migration ladder. Each arm mutates `conn` from `from` to
/// `from + 1`; there is nothing to do yet since this is schema v1, but
/// future versions slot in here without restructuring callers.
fn run_migrations(_conn: &Connection, _from: i64) -> rusqlite::Result<()> {
    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT value FROM ctk_meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0).map(|v| v.parse().unwrap_or(0)),
    )
}
