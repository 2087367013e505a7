use super::{Db, like_contains};
use crate::normalize::normalize;
use crate::store::{QaEntry, QaPatch};
use chrono::Utc;
use rusqlite::{OptionalExtension, Result, Row, params};

const QA_COLUMNS: &str = "id, question, question_norm, answer, category, updated_at";

fn map_qa_row(row: &Row<'_>) -> Result<QaEntry> {
    Ok(QaEntry {
        id: row.get(0)?,
        question: row.get(1)?,
        question_norm: row.get(2)?,
        answer: row.get(3)?,
        category: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Db {
    /// Inserts a new question/answer pair and returns it with its assigned id
    pub fn insert_qa(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
    ) -> Result<QaEntry> {
        let question_norm = normalize(question);
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO qa (question, question_norm, answer, category, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![question, question_norm, answer, category, now],
        )?;

        Ok(QaEntry {
            id: self.conn.last_insert_rowid(),
            question: question.to_string(),
            question_norm,
            answer: answer.to_string(),
            category: category.map(str::to_string),
            updated_at: now,
        })
    }

    /// Applies a partial update. Returns `None` when the id does not exist
    pub fn update_qa(&self, id: i64, patch: &QaPatch) -> Result<Option<QaEntry>> {
        let Some(mut entry) = self.get_qa(id)? else {
            return Ok(None);
        };

        if let Some(question) = &patch.question {
            entry.question_norm = normalize(question);
            entry.question = question.clone();
        }
        if let Some(answer) = &patch.answer {
            entry.answer = answer.clone();
        }
        if let Some(category) = &patch.category {
            // Empty clears
            entry.category = Some(category.clone()).filter(|c| !c.is_empty());
        }
        entry.updated_at = Utc::now();

        let rows = self.conn.execute(
            "UPDATE qa SET question = ?, question_norm = ?, answer = ?, category = ?, updated_at = ? WHERE id = ?",
            params![
                entry.question,
                entry.question_norm,
                entry.answer,
                entry.category,
                entry.updated_at,
                id
            ],
        )?;

        Ok((rows > 0).then_some(entry))
    }

    /// Deletes a question/answer pair, returning whether a row was removed
    pub fn delete_qa(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM qa WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    pub fn get_qa(&self, id: i64) -> Result<Option<QaEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {QA_COLUMNS} FROM qa WHERE id = ?"),
                params![id],
                map_qa_row,
            )
            .optional()
    }

    /// Returns every pair in corpus order (id ascending)
    pub fn list_qa(&self) -> Result<Vec<QaEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {QA_COLUMNS} FROM qa ORDER BY id ASC"))?;
        let rows = stmt.query_map([], map_qa_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Keyset pagination: up to `limit` pairs with id greater than `after_id`
    pub fn list_qa_page(&self, after_id: i64, limit: usize) -> Result<Vec<QaEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QA_COLUMNS} FROM qa WHERE id > ? ORDER BY id ASC LIMIT ?"
        ))?;
        let rows = stmt.query_map(params![after_id, limit as i64], map_qa_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Substring search on the original and normalized question, newest first
    pub fn search_qa(&self, term: &str, limit: usize) -> Result<Vec<QaEntry>> {
        let raw = like_contains(term);
        // An all-punctuation term normalizes to "" and would match every row.
        let term_norm = normalize(term);
        let norm = (!term_norm.is_empty()).then(|| like_contains(&term_norm));

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {QA_COLUMNS} FROM qa
            WHERE question LIKE ?1 ESCAPE '\' OR question_norm LIKE ?2 ESCAPE '\'
            ORDER BY updated_at DESC, id DESC
            LIMIT ?3
            "#
        ))?;
        let rows = stmt.query_map(params![raw, norm, limit as i64], map_qa_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Id of the first pair whose normalized question equals `question_norm`
    pub fn find_qa_by_norm(&self, question_norm: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM qa WHERE question_norm = ? ORDER BY id ASC LIMIT 1",
                params![question_norm],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn count_qa(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM qa", [], |row| row.get(0))
    }
}
