//! The kazpaGPT assistant.
//!
//! Turns a browser transcript into one model reply:
//!
//! 1. **Signals**: intent, topic, pivot and multi-question hints
//! 2. **Step memory**: troubleshooting checks the user already confirmed
//! 3. **Client context**: validated widget state sent with the request
//! 4. **Prompt**: canon, brand rules, hints and retrieved knowledge
//! 5. **Assistant**: history trimming, provider call and error mapping

pub mod assistant;
pub mod client_context;
pub mod prompt;
pub mod signals;

#[cfg(test)]
mod test_helpers;

pub use assistant::{
    ChatAssistant, ChatError, ChatReply, ChatRequest, EMPTY_REPLY_FALLBACK, MISSING_KEY_MESSAGE,
    NO_QUESTION_REPLY, PROVIDER_FAILURE_MESSAGE, PreparedTurn, QUOTA_MESSAGE, ReplyOutcome,
    TIMEOUT_MESSAGE,
};
pub use client_context::{ActiveProduct, ClientContext, Stage};
pub use signals::{Intent, Signals, Topic};
