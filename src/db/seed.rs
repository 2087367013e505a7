/// Bulk import of question/answer pairs from a JSON seed file.
///
/// The file is a JSON array of `{"question", "answer", "category"?}` objects.
/// Rows whose normalized question already exists are updated in place
/// instead of duplicated.
use std::path::Path;

use chrono::Utc;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::Db;
use crate::normalize::normalize;
use crate::store::parse_category;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("seed file must be a JSON array of objects: {0}")]
    Json(#[from] serde_json::Error),

    #[error("item #{index}: {reason}")]
    Invalid { index: usize, reason: String },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Parse and validate a seed file without touching the database.
pub fn load_seed_file<P: AsRef<Path>>(path: P) -> Result<Vec<SeedItem>, SeedError> {
    let data = std::fs::read_to_string(path)?;
    parse_seed(&data)
}

/// Categories come back as canonical keys, blank ones as `None`.
pub fn parse_seed(data: &str) -> Result<Vec<SeedItem>, SeedError> {
    let mut items: Vec<SeedItem> = serde_json::from_str(data)?;
    for (i, item) in items.iter_mut().enumerate() {
        let index = i + 1;
        if item.question.trim().is_empty() {
            return Err(SeedError::Invalid {
                index,
                reason: "question is blank".to_string(),
            });
        }
        if item.answer.trim().is_empty() {
            return Err(SeedError::Invalid {
                index,
                reason: "answer is blank".to_string(),
            });
        }
        item.category = parse_category(item.category.as_deref())
            .map_err(|e| SeedError::Invalid {
                index,
                reason: e.to_string(),
            })?
            .map(|c| c.key().to_string());
    }
    Ok(items)
}

impl Db {
    /// Imports seed items in a single transaction
    pub fn import_seed(&mut self, items: &[SeedItem]) -> Result<SeedReport, SeedError> {
        let tx = self.conn.transaction()?;
        let mut report = SeedReport::default();

        for item in items {
            let question = item.question.trim();
            let answer = item.answer.trim();
            let category = item.category.as_deref();
            let question_norm = normalize(question);
            let now = Utc::now();

            let updated = tx.execute(
                "UPDATE qa SET answer = ?, category = ?, updated_at = ? WHERE question_norm = ?",
                params![answer, category, now, question_norm],
            )?;

            if updated > 0 {
                report.updated += 1;
            } else {
                tx.execute(
                    "INSERT INTO qa (question, question_norm, answer, category, updated_at) VALUES (?, ?, ?, ?, ?)",
                    params![question, question_norm, answer, category, now],
                )?;
                report.inserted += 1;
            }
        }

        tx.commit()?;
        info!(
            "Seed import complete: {} inserted, {} updated",
            report.inserted, report.updated
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"[
        {"question": "What are your hours?", "answer": "9-5 Mon-Fri", "category": "general"},
        {"question": "How much is the fee?", "answer": "100"},
        {"question": "what are your HOURS", "answer": "9-6 Mon-Sat", "category": "  "}
    ]"#;

    #[test]
    fn test_import_upserts_by_normalized_question() {
        let mut db = Db::open_in_memory().unwrap();
        let items = parse_seed(SEED).unwrap();

        let report = db.import_seed(&items).unwrap();
        assert_eq!(
            report,
            SeedReport {
                inserted: 2,
                updated: 1
            }
        );

        let all = db.list_qa().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].answer, "9-6 Mon-Sat");
        assert_eq!(all[0].question, "What are your hours?");
        assert_eq!(all[0].category, None);

        // Re-running the same seed only updates
        let report = db.import_seed(&items).unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 3);
        assert_eq!(db.count_qa().unwrap(), 2);
    }

    #[test]
    fn test_parse_rejects_blank_fields() {
        let err = parse_seed(r#"[{"question": "q", "answer": "a"}, {"question": " ", "answer": "a"}]"#)
            .unwrap_err();
        match err {
            SeedError::Invalid { index, .. } => assert_eq!(index, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_canonicalizes_categories() {
        let items = parse_seed(
            r#"[{"question": "q1", "answer": "a", "category": "FEES"},
                {"question": "q2", "answer": "a", "category": "الحضور"}]"#,
        )
        .unwrap();
        assert_eq!(items[0].category.as_deref(), Some("fees"));
        assert_eq!(items[1].category.as_deref(), Some("attendance"));

        let err = parse_seed(
            r#"[{"question": "q1", "answer": "a"}, {"question": "q2", "answer": "a", "category": "misc"}]"#,
        )
        .unwrap_err();
        match err {
            SeedError::Invalid { index, reason } => {
                assert_eq!(index, 2);
                assert!(reason.contains("misc"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_seed(r#"{"question": "q", "answer": "a"}"#),
            Err(SeedError::Json(_))
        ));
        assert!(matches!(
            parse_seed(r#"[{"question": "q"}]"#),
            Err(SeedError::Json(_))
        ));
    }

    #[test]
    fn test_load_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, SEED).unwrap();
        assert_eq!(load_seed_file(&path).unwrap().len(), 3);
        assert!(matches!(
            load_seed_file(dir.path().join("missing.json")),
            Err(SeedError::Io(_))
        ));
    }
}
