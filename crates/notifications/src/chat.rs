//! Chat-messaging delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{NotificationError, Result};

/// A text message for one chat recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub chat_id: String,
    pub text: String,
}

/// Something that can post a chat message.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<()>;
}

/// Bot API settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API base URL, e.g. `https://api.telegram.org`.
    pub api_url: String,
    pub token: SecretString,
    /// Request timeout of the HTTP client itself.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts messages through a Telegram-style bot API.
pub struct BotApiChatSender {
    client: reqwest::Client,
    api_url: String,
    token: SecretString,
}

impl BotApiChatSender {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_url,
            self.token.expose_secret()
        )
    }
}

#[async_trait]
impl ChatSender for BotApiChatSender {
    async fn send(&self, message: &ChatMessage) -> Result<()> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Http(e.without_url()))?;

        let status = response.status();
        let body: BotResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Http(e.without_url()))?;

        if !status.is_success() || !body.ok {
            return Err(NotificationError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("status {status}")),
            ));
        }

        tracing::info!(chat_id = %message.chat_id, "chat message sent");
        Ok(())
    }
}

/// Chat sender that records messages instead of posting them.
#[derive(Clone, Default)]
pub struct InMemoryChatSender {
    sent: Arc<Mutex<Vec<ChatMessage>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl InMemoryChatSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every post fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A sender that waits `delay` before recording each message.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<ChatMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl ChatSender for InMemoryChatSender {
    async fn send(&self, message: &ChatMessage) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(NotificationError::Rejected("chat: bot was blocked".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_token_and_trims_slash() {
        let sender = BotApiChatSender::new(ChatConfig {
            api_url: "https://api.telegram.org/".into(),
            token: SecretString::from("123:abc".to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            sender.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn config_debug_hides_token() {
        let config = ChatConfig {
            api_url: "https://api.telegram.org".into(),
            token: SecretString::from("123:abc".to_string()),
            timeout: Duration::from_secs(5),
        };
        assert!(!format!("{config:?}").contains("123:abc"));
    }

    #[test]
    fn message_serializes_for_bot_api() {
        let message = ChatMessage {
            chat_id: "-100200".into(),
            text: "hello".into(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["chat_id"], "-100200");
        assert_eq!(json["text"], "hello");
    }

    #[tokio::test]
    async fn unreachable_api_is_an_http_error() {
        let sender = BotApiChatSender::new(ChatConfig {
            api_url: "http://127.0.0.1:9".into(),
            token: SecretString::from("t".to_string()),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let result = sender
            .send(&ChatMessage {
                chat_id: "1".into(),
                text: "hi".into(),
            })
            .await;
        assert!(matches!(result, Err(NotificationError::Http(_))));
    }
}
