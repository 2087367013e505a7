/// [`QaStore`] and [`UnansweredLog`] backed by [`Db`].
///
/// `rusqlite::Connection` is not `Sync`, so the handle is serialized behind a
/// mutex. Callers on the async side reach it through `spawn_blocking`.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::Db;
use crate::store::{QaEntry, QaPatch, QaStore, StoreError, UnansweredLog, UnansweredQuestion};

pub struct SqliteStore {
    db: Mutex<Db>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::new(Db::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Db::open_in_memory()?))
    }

    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Direct access for maintenance paths (seed import, paging).
    pub fn db(&self) -> Result<MutexGuard<'_, Db>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

impl QaStore for SqliteStore {
    fn create(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
    ) -> Result<QaEntry, StoreError> {
        Ok(self.db()?.insert_qa(question, answer, category)?)
    }

    fn update(&self, id: i64, patch: &QaPatch) -> Result<QaEntry, StoreError> {
        self.db()?
            .update_qa(id, patch)?
            .ok_or(StoreError::NotFound(id))
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        if self.db()?.delete_qa(id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    fn get(&self, id: i64) -> Result<QaEntry, StoreError> {
        self.db()?.get_qa(id)?.ok_or(StoreError::NotFound(id))
    }

    fn list_all(&self) -> Result<Vec<QaEntry>, StoreError> {
        Ok(self.db()?.list_qa()?)
    }

    fn search(&self, term: &str, limit: usize) -> Result<Vec<QaEntry>, StoreError> {
        Ok(self.db()?.search_qa(term, limit)?)
    }
}

impl UnansweredLog for SqliteStore {
    fn log_unanswered(&self, user_id: Option<i64>, question: &str) -> Result<i64, StoreError> {
        Ok(self.db()?.log_unanswered(user_id, question)?)
    }

    fn list_unanswered(
        &self,
        only_unhandled: bool,
    ) -> Result<Vec<UnansweredQuestion>, StoreError> {
        Ok(self.db()?.list_unanswered(only_unhandled)?)
    }

    fn mark_handled(&self, id: i64) -> Result<(), StoreError> {
        if self.db()?.mark_unanswered_handled(id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get(1), Err(StoreError::NotFound(1)));
        assert_eq!(store.delete(1), Err(StoreError::NotFound(1)));
        assert_eq!(
            store.update(1, &QaPatch::default()),
            Err(StoreError::NotFound(1))
        );
        assert_eq!(store.mark_handled(1), Err(StoreError::NotFound(1)));
    }

    #[test]
    fn test_store_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let e = store.create("Where are you?", "Main St", None).unwrap();
        assert_eq!(store.get(e.id).unwrap().answer, "Main St");
        assert_eq!(store.list_all().unwrap().len(), 1);
        assert_eq!(store.search("where", 5).unwrap().len(), 1);
        store.delete(e.id).unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_when_file_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        // A directory path cannot be opened as a database file
        let result = SqliteStore::open(dir.path());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
