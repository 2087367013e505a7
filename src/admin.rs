/// Admin command handling: authorization plus write-through mutations.
///
/// Every successful mutation is followed by [`CacheManager::invalidate`], so
/// the next query rebuilds from the store regardless of the TTL. Failed or
/// rejected commands leave the cache alone.
use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cache::CacheManager;
use crate::store::{
    Category, QaEntry, QaPatch, QaStore, StoreError, UnansweredLog, UnansweredQuestion,
    parse_category,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("not authorized")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no entry with id {0}")]
    NotFound(i64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AdminError::NotFound(id),
            other => AdminError::Store(other),
        }
    }
}

/// Allow-list of admin user ids. Admin commands are accepted only in
/// private chats.
#[derive(Debug, Clone, Default)]
pub struct AdminGuard {
    admin_ids: HashSet<i64>,
}

impl AdminGuard {
    pub fn new(admin_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn authorize(&self, user_id: i64, is_private_chat: bool) -> Result<(), AdminError> {
        if is_private_chat && self.is_admin(user_id) {
            Ok(())
        } else {
            Err(AdminError::Unauthorized)
        }
    }
}

pub struct AdminService {
    store: Arc<dyn QaStore>,
    unanswered: Arc<dyn UnansweredLog>,
    cache: Arc<CacheManager>,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn QaStore>,
        unanswered: Arc<dyn UnansweredLog>,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self {
            store,
            unanswered,
            cache,
        }
    }

    pub fn add(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
    ) -> Result<QaEntry, AdminError> {
        let question = required("question", question)?;
        let answer = required("answer", answer)?;
        let category = category_key(category)?;

        let entry = self.store.create(question, answer, category)?;
        self.cache.invalidate();
        info!("Admin added QA #{}", entry.id);
        Ok(entry)
    }

    pub fn update(&self, id: i64, patch: QaPatch) -> Result<QaEntry, AdminError> {
        if patch.is_empty() {
            return Err(AdminError::InvalidInput("nothing to update".to_string()));
        }
        let patch = QaPatch {
            question: patch
                .question
                .map(|q| required("question", &q).map(str::to_string))
                .transpose()?,
            answer: patch
                .answer
                .map(|a| required("answer", &a).map(str::to_string))
                .transpose()?,
            category: patch
                .category
                .map(|c| {
                    category_key(Some(c.as_str())).map(|key| key.unwrap_or_default().to_string())
                })
                .transpose()?,
        };

        let entry = self.store.update(id, &patch)?;
        self.cache.invalidate();
        info!("Admin updated QA #{id}");
        Ok(entry)
    }

    pub fn delete(&self, id: i64) -> Result<(), AdminError> {
        self.store.delete(id)?;
        self.cache.invalidate();
        info!("Admin deleted QA #{id}");
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<QaEntry, AdminError> {
        Ok(self.store.get(id)?)
    }

    /// First `limit` records in id order.
    pub fn list(&self, limit: usize) -> Result<Vec<QaEntry>, AdminError> {
        let mut entries = self.store.list_all()?;
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn search(&self, term: &str, limit: usize) -> Result<Vec<QaEntry>, AdminError> {
        let term = required("term", term)?;
        Ok(self.store.search(term, limit)?)
    }

    pub fn list_unanswered(
        &self,
        only_unhandled: bool,
    ) -> Result<Vec<UnansweredQuestion>, AdminError> {
        Ok(self.unanswered.list_unanswered(only_unhandled)?)
    }

    /// Mark a logged question handled. The corpus is untouched, so the
    /// cache is not invalidated.
    pub fn resolve_unanswered(&self, id: i64) -> Result<(), AdminError> {
        self.unanswered.mark_handled(id)?;
        info!("Admin resolved unanswered #{id}");
        Ok(())
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AdminError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AdminError::InvalidInput(format!("{field} must not be blank")))
    } else {
        Ok(trimmed)
    }
}

/// Canonical key for a free-form category; blank means none.
fn category_key(raw: Option<&str>) -> Result<Option<&'static str>, AdminError> {
    parse_category(raw)
        .map(|c| c.map(Category::key))
        .map_err(|e| AdminError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn service() -> (AdminService, Arc<CacheManager>) {
        let store = Arc::new(MemoryStore::with_entries(&[(
            "what are your hours",
            "9-5 Mon-Fri",
        )]));
        let cache = Arc::new(CacheManager::new(
            store.clone() as Arc<dyn QaStore>,
            CacheConfig {
                ttl: Duration::from_secs(3600),
                ..Default::default()
            },
        ));
        (AdminService::new(store.clone(), store, cache.clone()), cache)
    }

    #[test]
    fn test_guard() {
        let guard = AdminGuard::new([42]);
        assert!(guard.authorize(42, true).is_ok());
        assert_eq!(guard.authorize(42, false), Err(AdminError::Unauthorized));
        assert_eq!(guard.authorize(7, true), Err(AdminError::Unauthorized));
        assert_eq!(
            AdminGuard::default().authorize(42, true),
            Err(AdminError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let (admin, cache) = service();
        cache.warm_up().await.unwrap();
        assert!(!cache.stats().invalidated);

        let entry = admin
            .update(
                1,
                QaPatch {
                    answer: Some("8-6 Mon-Sat".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(entry.answer, "8-6 Mon-Sat");
        assert!(cache.stats().invalidated);

        let index = cache.snapshot().await.unwrap();
        assert_eq!(index.entries()[0].answer, "8-6 Mon-Sat");
    }

    #[tokio::test]
    async fn test_add_and_delete_invalidate() {
        let (admin, cache) = service();
        cache.warm_up().await.unwrap();

        let added = admin.add("  Where is the office? ", "Main St", Some("general")).unwrap();
        assert_eq!(added.question, "Where is the office?");
        assert!(cache.stats().invalidated);
        assert_eq!(cache.snapshot().await.unwrap().len(), 2);

        admin.delete(added.id).unwrap();
        assert!(cache.stats().invalidated);
        assert_eq!(cache.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_categories_are_checked_against_taxonomy() {
        let (admin, cache) = service();
        cache.warm_up().await.unwrap();

        assert!(matches!(
            admin.add("Is there parking?", "Yes", Some("parking")),
            Err(AdminError::InvalidInput(msg)) if msg.contains("parking")
        ));
        assert!(!cache.stats().invalidated);

        let added = admin.add("How much is it?", "100", Some("الرسوم")).unwrap();
        assert_eq!(added.category.as_deref(), Some("fees"));

        let updated = admin
            .update(
                added.id,
                QaPatch {
                    category: Some(" Location ".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category.as_deref(), Some("location"));

        assert!(matches!(
            admin.update(
                added.id,
                QaPatch {
                    category: Some("misc".to_string()),
                    ..Default::default()
                },
            ),
            Err(AdminError::InvalidInput(_))
        ));
        assert_eq!(admin.get(added.id).unwrap().category.as_deref(), Some("location"));

        let cleared = admin
            .update(
                added.id,
                QaPatch {
                    category: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.category, None);
    }

    #[tokio::test]
    async fn test_failures_do_not_invalidate() {
        let (admin, cache) = service();
        cache.warm_up().await.unwrap();

        assert_eq!(admin.delete(99), Err(AdminError::NotFound(99)));
        assert!(matches!(admin.add(" ", "x", None), Err(AdminError::InvalidInput(_))));
        assert!(matches!(
            admin.update(1, QaPatch::default()),
            Err(AdminError::InvalidInput(_))
        ));
        assert!(matches!(
            admin.update(
                1,
                QaPatch {
                    answer: Some("   ".to_string()),
                    ..Default::default()
                }
            ),
            Err(AdminError::InvalidInput(_))
        ));
        assert_eq!(
            admin.update(
                99,
                QaPatch {
                    answer: Some("x".to_string()),
                    ..Default::default()
                }
            ),
            Err(AdminError::NotFound(99))
        );
        assert!(!cache.stats().invalidated);
    }

    #[test]
    fn test_reads() {
        let (admin, _) = service();
        assert_eq!(admin.get(1).unwrap().answer, "9-5 Mon-Fri");
        assert_eq!(admin.get(2), Err(AdminError::NotFound(2)));
        assert_eq!(admin.list(10).unwrap().len(), 1);
        assert_eq!(admin.list(0).unwrap().len(), 0);
        assert_eq!(admin.search("hours", 5).unwrap().len(), 1);
        assert!(matches!(admin.search("  ", 5), Err(AdminError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_resolve_unanswered() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CacheManager::new(
            store.clone() as Arc<dyn QaStore>,
            CacheConfig::default(),
        ));
        let admin = AdminService::new(store.clone(), store.clone(), cache.clone());

        let id = store.log_unanswered(Some(5), "refund?").unwrap();
        assert_eq!(admin.list_unanswered(true).unwrap().len(), 1);

        admin.resolve_unanswered(id).unwrap();
        assert!(admin.list_unanswered(true).unwrap().is_empty());
        assert_eq!(admin.list_unanswered(false).unwrap().len(), 1);
        assert_eq!(admin.resolve_unanswered(99), Err(AdminError::NotFound(99)));
        assert!(!cache.stats().invalidated);
    }
}
