//! # rustfaq: FAQ answering engine
//!
//! Answers free-text questions from an admin-curated question/answer corpus
//! by fuzzy matching against an in-memory snapshot. The snapshot is cached
//! with a TTL, rebuilt single-flight, and invalidated on every admin write.
//!
//! ## Architecture
//!
//! - **[`normalize`]**: Text normalization shared by the store, index and queries
//! - **[`matcher`]**: Immutable match index and the similarity metric
//! - **[`cache`]**: Snapshot lifecycle: TTL, invalidation, warm-up, auto-refresh
//! - **[`query`]**: Threshold selection per context and apology fallback
//! - **[`store`]**: Store contract (`QaStore`, `UnansweredLog`) and an in-memory store
//! - **[`db`]**: SQLite store, schema, seed import
//! - **[`admin`]**: Admin authorization and write-through mutations
//! - **[`responder`]**: Chat message classification and reply decisions
//! - **[`eval`]**: Offline accuracy / precision / recall over labeled queries
//! - **[`config`]**: Configuration loading, env overrides, validation
//! - **[`mcp`]**: MCP operator tools (stdio transport via rmcp)

pub mod admin;
pub mod cache;
pub mod config;
pub mod db;
pub mod eval;
pub mod matcher;
pub mod mcp;
pub mod normalize;
pub mod query;
pub mod responder;
pub mod store;
