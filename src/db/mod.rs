//! SQLite persistence for the question/answer corpus
use rusqlite::{Connection, Result};
use std::path::Path;
use tracing::info;

pub mod qa;
pub mod seed;
pub mod store;
pub mod unanswered;

pub use store::SqliteStore;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS qa (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    question_norm TEXT NOT NULL,
    answer TEXT NOT NULL,
    category TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_qa_question_norm ON qa(question_norm);

CREATE TABLE IF NOT EXISTS unanswered (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    question TEXT NOT NULL,
    question_norm TEXT NOT NULL,
    asked_at TEXT NOT NULL,
    handled INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_unanswered_question_norm ON unanswered(question_norm);
CREATE INDEX IF NOT EXISTS idx_unanswered_handled ON unanswered(handled);
"#;

/// A wrapper around a SQLite connection initialized with the application schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!("Database initialized successfully");

        Ok(Self { conn })
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

/// Escape a user term for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_contains(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
