/// Query engine: threshold selection on top of the cached match index.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{CacheError, CacheManager};
use crate::matcher::MatchResult;

/// Where a question came from. Each surface has its own confidence bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryContext {
    /// Private chat or otherwise unambiguous request.
    Direct,
    /// Group message that mentions the bot or replies to it.
    Mention,
}

/// Matching settings, fixed for the lifetime of the engine.
///
/// The two thresholds are independent; neither is assumed to be stricter.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub normal_threshold: f64,
    pub mention_threshold: f64,
    pub apology_message: String,
}

impl MatchConfig {
    #[must_use]
    pub fn threshold_for(&self, context: QueryContext) -> f64 {
        match context {
            QueryContext::Direct => self.normal_threshold,
            QueryContext::Mention => self.mention_threshold,
        }
    }
}

pub struct QueryEngine {
    cache: Arc<CacheManager>,
    config: MatchConfig,
}

impl QueryEngine {
    pub fn new(cache: Arc<CacheManager>, config: MatchConfig) -> Self {
        Self { cache, config }
    }

    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Best answer for `input` under the threshold of `context`.
    ///
    /// Errors only when no snapshot could ever be loaded. A miss is a normal
    /// `matched == false` result.
    pub async fn answer(
        &self,
        input: &str,
        context: QueryContext,
    ) -> Result<MatchResult, CacheError> {
        let threshold = self.config.threshold_for(context);
        let index = self.cache.snapshot().await?;
        let best = index.best_match(input);
        let result = MatchResult::evaluate(best, threshold);

        info!(
            "Query [{}] | best_id: {:?} | score: {:.1} | threshold: {:.1} | context: {:?} | matched: {}",
            input,
            best.map(|b| b.entry.id),
            result.score,
            threshold,
            context,
            result.matched
        );

        Ok(result)
    }

    /// Text to send back: the matched answer, or the apology verbatim.
    #[must_use]
    pub fn reply_text<'a>(&'a self, result: &'a MatchResult) -> &'a str {
        result.answer().unwrap_or(&self.config.apology_message)
    }
}
