/// Chat-facing glue between incoming messages and the query engine.
///
/// Decides which threshold applies, whether a miss is worth an apology,
/// and which misses get logged for admin review.
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::cache::CacheError;
use crate::query::{QueryContext, QueryEngine};
use crate::store::UnansweredLog;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+").expect("mention pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatKind,
    pub user_id: Option<i64>,
    pub text: String,
    /// Message contains `@<bot_username>`.
    pub mentions_bot: bool,
    /// Message is a reply to one of the bot's own messages.
    pub reply_to_bot: bool,
}

impl IncomingMessage {
    #[must_use]
    pub fn private(user_id: i64, text: &str) -> Self {
        Self {
            chat: ChatKind::Private,
            user_id: Some(user_id),
            text: text.to_string(),
            mentions_bot: false,
            reply_to_bot: false,
        }
    }

    #[must_use]
    pub fn group(user_id: i64, text: &str) -> Self {
        Self {
            chat: ChatKind::Group,
            user_id: Some(user_id),
            text: text.to_string(),
            mentions_bot: false,
            reply_to_bot: false,
        }
    }

    /// Whether the bot was spoken to directly.
    #[must_use]
    pub fn is_addressed(&self) -> bool {
        self.chat == ChatKind::Private || self.mentions_bot || self.reply_to_bot
    }

    fn context(&self) -> QueryContext {
        match self.chat {
            ChatKind::Group if self.mentions_bot || self.reply_to_bot => QueryContext::Mention,
            _ => QueryContext::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Apology(String),
    Silent,
}

pub struct Responder {
    engine: Arc<QueryEngine>,
    unanswered: Arc<dyn UnansweredLog>,
    bot_username: Option<String>,
}

impl Responder {
    pub fn new(
        engine: Arc<QueryEngine>,
        unanswered: Arc<dyn UnansweredLog>,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            engine,
            unanswered,
            bot_username,
        }
    }

    /// Flag the mention when the text contains `@<bot_username>`.
    #[must_use]
    pub fn detect_mention(&self, mut message: IncomingMessage) -> IncomingMessage {
        if let Some(name) = self.bot_username.as_deref() {
            let name = name.trim_start_matches('@').to_lowercase();
            // Whole handles only: "@faqbot2" is someone else
            if MENTION_RE
                .find_iter(&message.text)
                .any(|m| m.as_str()[1..].to_lowercase() == name)
            {
                message.mentions_bot = true;
            }
        }
        message
    }

    pub async fn handle(&self, message: &IncomingMessage) -> Result<Reply, CacheError> {
        let text = strip_mentions(&message.text);
        if text.is_empty() {
            return Ok(Reply::Silent);
        }

        let result = self.engine.answer(&text, message.context()).await?;
        if let Some(answer) = result.answer() {
            return Ok(Reply::Answer(answer.to_string()));
        }

        if !message.is_addressed() {
            debug!("Unaddressed group message missed (score {:.1})", result.score);
            return Ok(Reply::Silent);
        }

        if let Err(e) = self.unanswered.log_unanswered(message.user_id, &text) {
            warn!("Failed to log unanswered question: {e}");
        }

        Ok(Reply::Apology(self.engine.reply_text(&result).to_string()))
    }
}

/// Remove `@username` tokens and collapse the leftover whitespace.
#[must_use]
pub fn strip_mentions(text: &str) -> String {
    MENTION_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
