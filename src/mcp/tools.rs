/// MCP Tool handlers for rustfaq.
///
/// The operator surface over stdio:
/// 1. ask                – match a question against the corpus
/// 2. add_qa             – add a question/answer pair
/// 3. update_qa          – partially update a pair
/// 4. delete_qa          – delete a pair
/// 5. get_qa             – fetch one pair
/// 6. list_qa            – list pairs in id order
/// 7. search_qa          – substring search over questions
/// 8. list_unanswered    – review logged misses
/// 9. resolve_unanswered – mark a logged miss handled
/// 10. refresh_cache     – force a match index rebuild
/// 11. cache_status      – snapshot version, age and rebuild failures
/// 12. list_categories   – the fixed category taxonomy
///
/// The stdio channel belongs to the local operator, so admin tools skip the
/// chat-side `AdminGuard`.
use crate::admin::AdminError;
use crate::mcp::server::McpContext;
use crate::query::QueryContext;
use crate::store::{Category, QaPatch};
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;

const DEFAULT_LIST_LIMIT: usize = 50;
const DEFAULT_SEARCH_LIMIT: usize = 10;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct AskParams {
    /// Question text as a user would type it
    question: String,
    /// Use the mention threshold instead of the direct one (default: false)
    mention: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct AddQaParams {
    question: String,
    answer: String,
    /// Optional category key or Arabic label (see list_categories)
    category: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct UpdateQaParams {
    id: i64,
    /// New question text (unchanged if omitted)
    question: Option<String>,
    /// New answer text (unchanged if omitted)
    answer: Option<String>,
    /// New category key or Arabic label (unchanged if omitted, blank clears)
    category: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct IdParam {
    id: i64,
}

#[derive(Deserialize, JsonSchema)]
struct ListParams {
    /// Max entries (default: 50)
    limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct SearchParams {
    /// Substring to look for in questions
    term: String,
    /// Max results (default: 10)
    limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct UnansweredParams {
    /// Include already handled questions (default: false)
    all: Option<bool>,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

/// Caller mistakes become tool errors; backend failures become protocol errors.
fn admin_failure(err: AdminError) -> Result<CallToolResult, McpError> {
    match err {
        AdminError::Store(e) => Err(McpError::internal_error(format!("store failed: {e}"), None)),
        other => error_result(&other.to_string()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, McpError> {
    serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("serialization failed: {e}"), None))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: ask ─────────────────────────────────────────────────

    #[tool(
        description = "Match a question against the FAQ corpus. Returns the answer when the best score clears the threshold, otherwise the apology message and the best score seen."
    )]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.question.trim().is_empty() {
            return error_result("question is required");
        }
        let context = if p.mention.unwrap_or(false) {
            QueryContext::Mention
        } else {
            QueryContext::Direct
        };

        let result = self
            .ctx
            .engine
            .answer(&p.question, context)
            .await
            .map_err(|e| McpError::internal_error(format!("match failed: {e}"), None))?;

        json_result(serde_json::json!({
            "matched": result.matched,
            "score": result.score,
            "threshold": self.ctx.engine.config().threshold_for(context),
            "reply": self.ctx.engine.reply_text(&result),
            "entry": to_json(&result.entry)?,
        }))
    }

    // ── Tool 2: add_qa ──────────────────────────────────────────────

    #[tool(description = "Add a question/answer pair. The match index is rebuilt on the next query.")]
    async fn add_qa(&self, params: Parameters<AddQaParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        match self
            .ctx
            .admin
            .add(&p.question, &p.answer, p.category.as_deref())
        {
            Ok(entry) => json_result(serde_json::json!({ "success": true, "entry": to_json(&entry)? })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 3: update_qa ───────────────────────────────────────────

    #[tool(description = "Update the question, answer or category of an existing pair")]
    async fn update_qa(
        &self,
        params: Parameters<UpdateQaParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let patch = QaPatch {
            question: p.question,
            answer: p.answer,
            category: p.category,
        };
        match self.ctx.admin.update(p.id, patch) {
            Ok(entry) => json_result(serde_json::json!({ "success": true, "entry": to_json(&entry)? })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 4: delete_qa ───────────────────────────────────────────

    #[tool(description = "Delete a question/answer pair by id")]
    async fn delete_qa(&self, params: Parameters<IdParam>) -> Result<CallToolResult, McpError> {
        let id = params.0.id;
        match self.ctx.admin.delete(id) {
            Ok(()) => json_result(serde_json::json!({
                "success": true,
                "message": format!("Deleted QA #{id}"),
            })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 5: get_qa ──────────────────────────────────────────────

    #[tool(description = "Fetch a question/answer pair by id")]
    async fn get_qa(&self, params: Parameters<IdParam>) -> Result<CallToolResult, McpError> {
        match self.ctx.admin.get(params.0.id) {
            Ok(entry) => json_result(to_json(&entry)?),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 6: list_qa ─────────────────────────────────────────────

    #[tool(description = "List question/answer pairs in id order")]
    async fn list_qa(&self, params: Parameters<ListParams>) -> Result<CallToolResult, McpError> {
        let limit = params.0.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        match self.ctx.admin.list(limit) {
            Ok(entries) => json_result(serde_json::json!({ "entries": to_json(&entries)? })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 7: search_qa ───────────────────────────────────────────

    #[tool(description = "Substring search over questions, most recently updated first")]
    async fn search_qa(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let limit = p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        match self.ctx.admin.search(&p.term, limit) {
            Ok(entries) => json_result(serde_json::json!({ "results": to_json(&entries)? })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 8: list_unanswered ─────────────────────────────────────

    #[tool(description = "List questions that were addressed to the bot but found no confident answer")]
    async fn list_unanswered(
        &self,
        params: Parameters<UnansweredParams>,
    ) -> Result<CallToolResult, McpError> {
        let only_unhandled = !params.0.all.unwrap_or(false);
        match self.ctx.admin.list_unanswered(only_unhandled) {
            Ok(items) => json_result(serde_json::json!({ "unanswered": to_json(&items)? })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 9: resolve_unanswered ──────────────────────────────────

    #[tool(description = "Mark a logged unanswered question as handled")]
    async fn resolve_unanswered(
        &self,
        params: Parameters<IdParam>,
    ) -> Result<CallToolResult, McpError> {
        let id = params.0.id;
        match self.ctx.admin.resolve_unanswered(id) {
            Ok(()) => json_result(serde_json::json!({
                "success": true,
                "message": format!("Unanswered #{id} marked handled"),
            })),
            Err(e) => admin_failure(e),
        }
    }

    // ── Tool 10: refresh_cache ──────────────────────────────────────

    #[tool(description = "Rebuild the match index from the store now")]
    async fn refresh_cache(&self) -> Result<CallToolResult, McpError> {
        match self.ctx.cache.force_reload().await {
            Ok(index) => json_result(serde_json::json!({
                "success": true,
                "version": index.version(),
                "entries": index.len(),
            })),
            Err(e) => error_result(&e.to_string()),
        }
    }

    // ── Tool 11: cache_status ───────────────────────────────────────

    #[tool(description = "Show the published match index version, age and rebuild failures")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        json_result(to_json(&self.ctx.cache.stats())?)
    }

    // ── Tool 12: list_categories ────────────────────────────────────

    #[tool(description = "List the categories a question/answer pair may be filed under")]
    async fn list_categories(&self) -> Result<CallToolResult, McpError> {
        let categories: Vec<serde_json::Value> = Category::ALL
            .iter()
            .map(|c| serde_json::json!({ "key": c.key(), "label": c.label() }))
            .collect();
        json_result(serde_json::json!({ "categories": categories }))
    }
}
