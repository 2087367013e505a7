/// Store adapter contract for question/answer records.
///
/// The store is the single source of truth. The cache holds no durable state
/// of its own and only ever reads through [`QaStore::list_all`].
pub mod memory;
pub mod models;

pub use memory::MemoryStore;
pub use models::{
    Category, QaEntry, QaPatch, UnansweredQuestion, UnknownCategory, parse_category,
};

use thiserror::Error;

/// Errors surfaced by store implementations.
///
/// Implementations never retry internally beyond what the backend does; the
/// cache and admin layers decide what a failure means for them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no entry with id {0}")]
    NotFound(i64),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Durable CRUD over question/answer records.
///
/// All implementations must be `Send + Sync` so they can be shared behind
/// `Arc` and called from the blocking thread pool.
pub trait QaStore: Send + Sync {
    /// Insert a new record. The store assigns the id.
    fn create(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
    ) -> Result<QaEntry, StoreError>;

    /// Apply a partial update. Returns the record as stored afterwards.
    fn update(&self, id: i64, patch: &QaPatch) -> Result<QaEntry, StoreError>;

    fn delete(&self, id: i64) -> Result<(), StoreError>;

    fn get(&self, id: i64) -> Result<QaEntry, StoreError>;

    /// Every live record, ordered by id ascending.
    fn list_all(&self) -> Result<Vec<QaEntry>, StoreError>;

    /// Substring search over the original and normalized question text,
    /// most recently updated first.
    fn search(&self, term: &str, limit: usize) -> Result<Vec<QaEntry>, StoreError>;
}

/// Log of addressed questions that found no confident answer.
pub trait UnansweredLog: Send + Sync {
    fn log_unanswered(&self, user_id: Option<i64>, question: &str) -> Result<i64, StoreError>;

    /// Newest first. With `only_unhandled`, handled rows are skipped.
    fn list_unanswered(
        &self,
        only_unhandled: bool,
    ) -> Result<Vec<UnansweredQuestion>, StoreError>;

    fn mark_handled(&self, id: i64) -> Result<(), StoreError>;
}
