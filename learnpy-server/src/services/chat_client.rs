//! Chat-completion client for the tutor assistant
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. The chat
//! endpoint never fails: transport errors and missing credentials fall back
//! to a small table of canned replies.

use crate::config::ChatSettings;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "Bạn là AI trợ lý Python. Trả lời ngắn gọn, không dùng ký tự đặc biệt như * | `. Code phải xuống dòng rõ ràng. Tối đa 3-4 câu.";
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.3;

/// Reply when the API answers with a non-200 status
pub const BUSY_REPLY: &str = "AI đang bận. Thử lại sau!";

/// Canned replies, first case-insensitive substring match wins
const FALLBACK_REPLIES: &[(&str, &str)] = &[
    ("xin chào", "Chào bạn! Tôi giúp học Python."),
    ("hello", "Hi! Tôi giúp học Python."),
    ("python", "Python dễ học. Bạn cần gì?"),
];
const DEFAULT_REPLY: &str = "Tôi giúp học Python.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Clone)]
pub struct ChatClient {
    settings: ChatSettings,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(settings: ChatSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Answer `message`; always produces some reply
    pub async fn reply(&self, message: &str) -> String {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            debug!("No chat API key configured, using fallback reply");
            return fallback_reply(message).to_string();
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": message},
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });

        let response = match self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(self.settings.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Chat API request failed");
                return fallback_reply(message).to_string();
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(status = %response.status(), "Chat API returned an error status");
            return BUSY_REPLY.to_string();
        }

        match response.json::<CompletionResponse>().await {
            Ok(completion) => match completion.choices.into_iter().next() {
                Some(choice) => choice.message.content,
                None => {
                    warn!("Chat API returned no choices");
                    fallback_reply(message).to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Chat API returned an unreadable body");
                fallback_reply(message).to_string()
            }
        }
    }
}

pub fn fallback_reply(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    FALLBACK_REPLIES
        .iter()
        .find(|(needle, _)| lowered.contains(*needle))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_REPLY)
}
