//! `kazpagpt ask`: one question through the full pipeline.

use kazpa_agent::{ChatAssistant, ChatRequest};
use kazpa_core::message::Message;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    question: &str,
    show_prompt: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    if show_prompt {
        let assistant = ChatAssistant::from_config(&config, None)?;
        let snapshot = assistant.snapshot().await?;
        let history = [Message::user(question)];
        let turn = assistant.prepare(question, &history, None, &snapshot);
        println!("{}", turn.system_prompt);
        eprintln!();
        eprintln!(
            "intent: {}  topic: {}  snippets: {}",
            turn.signals.intent, turn.signals.topic, turn.snippet_count
        );
        return Ok(());
    }

    let provider = kazpa_providers::build_from_config(&config)?;
    let assistant = ChatAssistant::from_config(&config, provider)?;

    let request = ChatRequest {
        messages: vec![Message::user(question)],
        client_context: None,
    };

    match assistant.respond(request).await {
        Ok(reply) => {
            println!("{}", reply.text);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Chat turn failed");
            eprintln!("❌ {}", e.user_message());
            Err(e.into())
        }
    }
}
