//! In-memory store.
//!
//! Keeps records in a `BTreeMap` so `list_all` comes out in id order without
//! sorting. Useful for tests and for running the engine without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{QaEntry, QaPatch, QaStore, StoreError, UnansweredLog, UnansweredQuestion};
use crate::normalize::normalize;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    entries: BTreeMap<i64, QaEntry>,
    next_unanswered_id: i64,
    unanswered: Vec<UnansweredQuestion>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `(question, answer)` pairs, ids from 1.
    #[must_use]
    pub fn with_entries(pairs: &[(&str, &str)]) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap_or_else(|e| e.into_inner());
            for (question, answer) in pairs {
                insert(&mut state, question, answer, None);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn insert(state: &mut MemoryState, question: &str, answer: &str, category: Option<&str>) -> QaEntry {
    state.next_id += 1;
    let entry = QaEntry {
        id: state.next_id,
        question: question.to_string(),
        question_norm: normalize(question),
        answer: answer.to_string(),
        category: category.map(str::to_string),
        updated_at: Utc::now(),
    };
    state.entries.insert(entry.id, entry.clone());
    entry
}

impl QaStore for MemoryStore {
    fn create(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
    ) -> Result<QaEntry, StoreError> {
        let mut state = self.lock()?;
        Ok(insert(&mut state, question, answer, category))
    }

    fn update(&self, id: i64, patch: &QaPatch) -> Result<QaEntry, StoreError> {
        let mut state = self.lock()?;
        let entry = state.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(question) = &patch.question {
            entry.question = question.clone();
            entry.question_norm = normalize(question);
        }
        if let Some(answer) = &patch.answer {
            entry.answer = answer.clone();
        }
        if let Some(category) = &patch.category {
            // Empty clears
            entry.category = Some(category.clone()).filter(|c| !c.is_empty());
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<QaEntry, StoreError> {
        let state = self.lock()?;
        state.entries.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn list_all(&self) -> Result<Vec<QaEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state.entries.values().cloned().collect())
    }

    fn search(&self, term: &str, limit: usize) -> Result<Vec<QaEntry>, StoreError> {
        let state = self.lock()?;
        let term_norm = normalize(term);
        let mut hits: Vec<QaEntry> = state
            .entries
            .values()
            .filter(|e| {
                e.question.contains(term)
                    || (!term_norm.is_empty() && e.question_norm.contains(&term_norm))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

impl UnansweredLog for MemoryStore {
    fn log_unanswered(&self, user_id: Option<i64>, question: &str) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        state.next_unanswered_id += 1;
        let id = state.next_unanswered_id;
        state.unanswered.push(UnansweredQuestion {
            id,
            user_id,
            question: question.to_string(),
            question_norm: normalize(question),
            asked_at: Utc::now(),
            handled: false,
        });
        Ok(id)
    }

    fn list_unanswered(
        &self,
        only_unhandled: bool,
    ) -> Result<Vec<UnansweredQuestion>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .unanswered
            .iter()
            .rev()
            .filter(|u| !only_unhandled || !u.handled)
            .cloned()
            .collect())
    }

    fn mark_handled(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let row = state
            .unanswered
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.handled = true;
        Ok(())
    }
}
