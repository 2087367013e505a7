/// End-to-end integration tests for the rustfaq pipeline.
///
/// Tests the complete flow:
///   Config → Seed → SQLite store → Cache → Query → Admin write → Re-query
use rustfaq::admin::{AdminGuard, AdminService};
use rustfaq::cache::{CacheConfig, CacheManager};
use rustfaq::config::Config;
use rustfaq::db::SqliteStore;
use rustfaq::db::seed::load_seed_file;
use rustfaq::eval::{LabeledQuery, evaluate};
use rustfaq::query::{QueryContext, QueryEngine};
use rustfaq::responder::{IncomingMessage, Reply, Responder};
use rustfaq::store::{QaPatch, QaStore, UnansweredLog};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const SEED: &str = r#"[
    {"question": "What are your hours?", "answer": "9-5 Mon-Fri", "category": "general"},
    {"question": "Where is the office?", "answer": "Main St 1"},
    {"question": "ما هي مواعيد العمل؟", "answer": "من ٩ إلى ٥"}
]"#;

struct App {
    store: Arc<SqliteStore>,
    cache: Arc<CacheManager>,
    engine: Arc<QueryEngine>,
    admin: AdminService,
}

fn build(db_path: &std::path::Path, ttl: Duration) -> App {
    let mut config = Config::default();
    config.db_path = db_path.to_string_lossy().to_string();
    config.cache.ttl_secs = ttl.as_secs();
    config.matching.normal_threshold = 70.0;
    config.matching.mention_threshold = 60.0;
    config.validate().unwrap();

    let store = Arc::new(SqliteStore::open(&config.db_path).unwrap());
    let cache = Arc::new(CacheManager::new(
        store.clone() as Arc<dyn QaStore>,
        config.to_cache_config(),
    ));
    let engine = Arc::new(QueryEngine::new(cache.clone(), config.to_match_config()));
    let admin = AdminService::new(store.clone(), store.clone(), cache.clone());
    App {
        store,
        cache,
        engine,
        admin,
    }
}

fn seed(app: &App, dir: &std::path::Path) {
    let path = dir.join("seed.json");
    fs::write(&path, SEED).unwrap();
    let items = load_seed_file(&path).unwrap();
    let report = app.store.db().unwrap().import_seed(&items).unwrap();
    assert_eq!(report.inserted, 3);
}

/// Seed → ask → admin update → ask sees the new answer despite a long TTL
#[tokio::test]
async fn test_full_pipeline() {
    let temp_dir = tempdir().unwrap();
    let app = build(&temp_dir.path().join("faq.db"), Duration::from_secs(3600));
    seed(&app, temp_dir.path());

    let index = app.cache.warm_up().await.unwrap();
    assert_eq!(index.len(), 3);

    let result = app
        .engine
        .answer("what r ur hours", QueryContext::Direct)
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(app.engine.reply_text(&result), "9-5 Mon-Fri");

    let id = result.entry.unwrap().id;
    app.admin
        .update(
            id,
            QaPatch {
                answer: Some("8-6 Mon-Sat".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let result = app
        .engine
        .answer("what r ur hours", QueryContext::Mention)
        .await
        .unwrap();
    assert_eq!(app.engine.reply_text(&result), "8-6 Mon-Sat");
    assert_eq!(app.cache.stats().version, Some(2));

    // Arabic query with diacritics and a different question mark
    let result = app
        .engine
        .answer("ما هِيَ مواعيد العمل?", QueryContext::Direct)
        .await
        .unwrap();
    assert!(result.matched);
    assert_eq!(result.score, 100.0);
}

/// Re-seeding updates existing questions instead of duplicating them
#[tokio::test]
async fn test_reseed_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    let app = build(&temp_dir.path().join("faq.db"), Duration::from_secs(30));
    seed(&app, temp_dir.path());

    let path = temp_dir.path().join("update.json");
    fs::write(
        &path,
        r#"[{"question": "what are your hours", "answer": "Closed on holidays"}]"#,
    )
    .unwrap();
    let items = load_seed_file(&path).unwrap();
    let report = app.store.db().unwrap().import_seed(&items).unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(app.store.list_all().unwrap().len(), 3);

    let result = app
        .engine
        .answer("What are your hours", QueryContext::Direct)
        .await
        .unwrap();
    assert_eq!(app.engine.reply_text(&result), "Closed on holidays");
}

/// Addressed misses land in the unanswered log and can be resolved
#[tokio::test]
async fn test_unanswered_flow() {
    let temp_dir = tempdir().unwrap();
    let app = build(&temp_dir.path().join("faq.db"), Duration::from_secs(30));
    seed(&app, temp_dir.path());

    let responder = Responder::new(
        app.engine.clone(),
        app.store.clone() as Arc<dyn UnansweredLog>,
        Some("faqbot".to_string()),
    );

    let reply = responder
        .handle(&IncomingMessage::private(9, "what is your refund policy"))
        .await
        .unwrap();
    assert!(matches!(reply, Reply::Apology(_)));

    let ambient = responder
        .handle(&IncomingMessage::group(9, "anyone seen my keys"))
        .await
        .unwrap();
    assert_eq!(ambient, Reply::Silent);

    let guard = AdminGuard::new([1]);
    guard.authorize(1, true).unwrap();
    let pending = app.admin.list_unanswered(true).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].user_id, Some(9));

    app.admin.resolve_unanswered(pending[0].id).unwrap();
    assert!(app.admin.list_unanswered(true).unwrap().is_empty());
}

/// Data survives reopening the database file
#[tokio::test]
async fn test_persistence_across_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("faq.db");
    {
        let app = build(&db_path, Duration::from_secs(30));
        app.admin.add("Do you ship abroad?", "Yes, EU only", None).unwrap();
    }

    let app = build(&db_path, Duration::from_secs(30));
    let result = app
        .engine
        .answer("do you ship abroad", QueryContext::Direct)
        .await
        .unwrap();
    assert_eq!(app.engine.reply_text(&result), "Yes, EU only");
}

/// Evaluation over the seeded corpus
#[tokio::test]
async fn test_eval_over_seeded_corpus() {
    let temp_dir = tempdir().unwrap();
    let app = build(&temp_dir.path().join("faq.db"), Duration::from_secs(30));
    seed(&app, temp_dir.path());

    let index = app.cache.snapshot().await.unwrap();
    let hours = app.store.search("hours", 1).unwrap()[0].id;
    let office = app.store.search("office", 1).unwrap()[0].id;
    let labeled = vec![
        LabeledQuery {
            query: "what r ur hours".to_string(),
            expected_id: hours,
        },
        LabeledQuery {
            query: "where's the office".to_string(),
            expected_id: office,
        },
    ];
    let report = evaluate(&index, &labeled, &[70.0]);
    assert_eq!(report.top1_hits, 2);
    assert_eq!(report.thresholds[0].true_positives, 2);
}

/// Default config wires a usable cache
#[test]
fn test_default_cache_config() {
    let cache = Config::default().to_cache_config();
    assert_eq!(cache, CacheConfig::default());
}
