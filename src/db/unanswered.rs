use super::Db;
use crate::normalize::normalize;
use crate::store::UnansweredQuestion;
use chrono::Utc;
use rusqlite::{Result, Row, params};

fn map_unanswered_row(row: &Row<'_>) -> Result<UnansweredQuestion> {
    Ok(UnansweredQuestion {
        id: row.get(0)?,
        user_id: row.get(1)?,
        question: row.get(2)?,
        question_norm: row.get(3)?,
        asked_at: row.get(4)?,
        handled: row.get::<_, i64>(5)? != 0,
    })
}

impl Db {
    /// Records an addressed question that got no confident answer
    pub fn log_unanswered(&self, user_id: Option<i64>, question: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO unanswered (user_id, question, question_norm, asked_at) VALUES (?, ?, ?, ?)",
            params![user_id, question, normalize(question), Utc::now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn mark_unanswered_handled(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("UPDATE unanswered SET handled = 1 WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    /// Newest first
    pub fn list_unanswered(&self, only_unhandled: bool) -> Result<Vec<UnansweredQuestion>> {
        let query = if only_unhandled {
            "SELECT id, user_id, question, question_norm, asked_at, handled FROM unanswered WHERE handled = 0 ORDER BY id DESC"
        } else {
            "SELECT id, user_id, question, question_norm, asked_at, handled FROM unanswered ORDER BY id DESC"
        };

        let mut stmt = self.conn.prepare(query)?;
        let rows = stmt.query_map([], map_unanswered_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
