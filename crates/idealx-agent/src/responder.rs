//! Model-facing operations used by the event router and slash commands.
//!
//! Every operation is a single call (or a short chain of streamed steps) to
//! the configured provider. Failures propagate to the caller unchanged; the
//! caller owns the user-visible apology.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use idealx_core::{ConversationTurn, Role};

use crate::prompt;
use crate::provider::{ChatRequest, LlmProvider, ProviderError, ToolDefinition};
use crate::stream::StreamEvent;

pub const MAX_OUTPUT_TOKENS: u32 = 4096;
/// Upper bound on model steps for one streamed response.
pub const MAX_STEPS: usize = 6;
pub const WEB_SEARCH_MAX_USES: u32 = 5;

const SUMMARY_INSTRUCTION: &str = "以下の会話を簡潔に要約してください。要約のみを出力してください。";
const URL_SUMMARY_INSTRUCTION: &str =
    "メッセージの内容とURLの情報を簡潔にまとめてください。要約のみを出力してください。";

/// Forum thread metadata appended to the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumContext {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Sanitized text fetched from one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlContent {
    pub url: String,
    pub content: String,
}

pub struct ModelResponder {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
}

impl ModelResponder {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, system_prompt: String) -> Self {
        Self {
            provider,
            model,
            system_prompt,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Stream a free-form reply to `turns`, forwarding text deltas to `tx`.
    ///
    /// The web search tool is available. A `pause_turn` stop (the provider
    /// interrupted a long tool-using turn) continues from the text produced so
    /// far, for at most [`MAX_STEPS`] steps in total. A reply that never
    /// produced any text is a [`ProviderError::EmptyResponse`].
    pub async fn respond(
        &self,
        turns: &[ConversationTurn],
        forum: Option<&ForumContext>,
        tx: mpsc::Sender<String>,
    ) -> Result<(), ProviderError> {
        let system = match forum {
            Some(f) => prompt::with_forum_context(
                &self.system_prompt,
                f.title.as_deref(),
                f.description.as_deref(),
            ),
            None => self.system_prompt.clone(),
        };

        let mut messages = turns.to_vec();
        let mut produced = String::new();

        for step in 1..=MAX_STEPS {
            let req = ChatRequest {
                model: self.model.clone(),
                system: system.clone(),
                messages: messages.clone(),
                max_tokens: MAX_OUTPUT_TOKENS,
                tools: vec![ToolDefinition::web_search(WEB_SEARCH_MAX_USES)],
            };

            let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(64);
            let send = self.provider.send_stream(&req, event_tx);
            let forward = async {
                let mut text = String::new();
                let mut stop_reason = String::new();
                let mut error = None;
                while let Some(event) = event_rx.recv().await {
                    match event {
                        StreamEvent::TextDelta { text: delta } => {
                            text.push_str(&delta);
                            // a closed receiver means nobody is posting; keep draining
                            let _ = tx.send(delta).await;
                        }
                        StreamEvent::Done {
                            stop_reason: reason,
                            tokens_in,
                            tokens_out,
                            ..
                        } => {
                            debug!(tokens_in, tokens_out, stop_reason = %reason, "model step finished");
                            stop_reason = reason;
                        }
                        StreamEvent::Error { message } => error = Some(message),
                    }
                }
                (text, stop_reason, error)
            };

            let (sent, (text, stop_reason, error)) = tokio::join!(send, forward);
            sent?;
            if let Some(message) = error {
                return Err(ProviderError::Stream(message));
            }

            produced.push_str(&text);
            if stop_reason != "pause_turn" {
                break;
            }

            info!(step, "model paused its turn, continuing");
            messages = turns.to_vec();
            // a pause before any text (search only) resends the bare conversation
            if !produced.trim().is_empty() {
                messages.push(ConversationTurn {
                    role: Role::Assistant,
                    content: produced.trim_end().to_string(),
                });
            }
        }

        if produced.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(())
    }

    /// Concise summary of a conversation window.
    pub async fn summarize(&self, turns: &[ConversationTurn]) -> Result<String, ProviderError> {
        let transcript = turns
            .iter()
            .map(|t| {
                let speaker = match t.role {
                    Role::User => "ユーザー",
                    Role::Assistant => "ボット",
                };
                format!("{}: {}", speaker, t.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        self.complete(SUMMARY_INSTRUCTION.to_string(), transcript).await
    }

    /// Translate `text` into `language` (a display name such as "フランス語").
    pub async fn translate(&self, text: &str, language: &str) -> Result<String, ProviderError> {
        let system = format!(
            "以下のテキストを{}に翻訳してください。翻訳文のみを出力してください。",
            language
        );
        self.complete(system, text.to_string()).await
    }

    /// Summarize a message together with the content of the URLs it links.
    pub async fn summarize_with_urls(
        &self,
        message_text: &str,
        url_contents: &[UrlContent],
    ) -> Result<String, ProviderError> {
        self.complete(
            URL_SUMMARY_INSTRUCTION.to_string(),
            url_summary_prompt(message_text, url_contents),
        )
        .await
    }

    async fn complete(&self, system: String, prompt: String) -> Result<String, ProviderError> {
        let req = ChatRequest {
            model: self.model.clone(),
            system,
            messages: vec![ConversationTurn {
                role: Role::User,
                content: prompt,
            }],
            max_tokens: MAX_OUTPUT_TOKENS,
            tools: Vec::new(),
        };
        let resp = self.provider.send(&req).await?;
        Ok(resp.content)
    }
}

/// Message text followed by one labeled section per fetched URL.
pub fn url_summary_prompt(message_text: &str, url_contents: &[UrlContent]) -> String {
    let mut prompt = format!(
        "以下のメッセージとURLの内容を要約してください。\n\nメッセージ: {}",
        message_text
    );
    for UrlContent { url, content } in url_contents {
        prompt.push_str(&format!("\n\n--- {} ---\n{}", url, content));
    }
    prompt
}
