use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, Notifier};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Extra slack on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE_SECS: u64 = 10;

/// Longest text `sendMessage` accepts, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Telegram Bot API adapter using `getUpdates` long polling and `sendMessage`.
pub struct TelegramAdapter {
    bot_url: String,
    poll_timeout_secs: u64,
    /// Next `getUpdates` offset. Kept across `run` restarts so processed
    /// updates are not delivered twice.
    next_offset: AtomicI64,
    client: reqwest::Client,
}

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// One entry returned by `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub first_name: String,
}

impl Update {
    /// Convert to a channel message. Non-text updates yield `None`.
    pub fn into_inbound(self) -> Option<ChannelInboundMessage> {
        let message = self.message?;
        let text = message.text?.trim().to_owned();
        if text.is_empty() {
            return None;
        }
        Some(ChannelInboundMessage {
            chat_id: message.chat.id,
            sender_name: message.from.map(|u| u.first_name).unwrap_or_default(),
            text,
        })
    }
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig, bot_token: &str) -> Self {
        let base = config.api_base_url.trim_end_matches('/');
        Self {
            bot_url: format!("{base}/bot{bot_token}"),
            poll_timeout_secs: config.poll_timeout_secs,
            next_offset: AtomicI64::new(0),
            client: reqwest::Client::new(),
        }
    }

    /// Post a text message to a chat, split into several messages when it
    /// exceeds [`MAX_MESSAGE_LEN`].
    pub async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        }
        Ok(())
    }

    /// Fetch pending updates, advancing the stored offset past them.
    pub async fn get_updates(&self) -> anyhow::Result<Vec<Update>> {
        let offset = self.next_offset.load(Ordering::SeqCst);
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if offset > 0 {
            body["offset"] = json!(offset);
        }

        let timeout = Duration::from_secs(self.poll_timeout_secs + POLL_GRACE_SECS);
        let updates: Vec<Update> = self.call("getUpdates", &body, Some(timeout)).await?;
        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.next_offset.fetch_max(last + 1, Ordering::SeqCst);
        }
        Ok(updates)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> anyhow::Result<T> {
        let url = format!("{}/{method}", self.bot_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&text).ok();

        match parsed {
            Some(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Some(ApiResponse { description, .. }) => {
                let reason = description.unwrap_or_else(|| "no description".to_owned());
                anyhow::bail!("telegram {method} failed ({status}): {reason}")
            }
            None => anyhow::bail!("telegram {method} failed ({status}): {text}"),
        }
    }

    /// Describe a transport failure without the request URL, which embeds the bot token.
    fn transport_error(&self, method: &str, err: reqwest::Error) -> anyhow::Error {
        let err = err.without_url();
        let mut reason = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            reason.push_str(": ");
            reason.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        let reason = reason.replace(&self.bot_url, "<bot-url>");
        anyhow::anyhow!("telegram {method} request failed: {reason}")
    }
}

/// Split `text` into pieces of at most `limit` UTF-16 units, preferring line breaks.
pub(crate) fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.encode_utf16().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        for c in line.chars() {
            let width = c.len_utf16();
            if current_len + width > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += width;
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Notifier for TelegramAdapter {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.send_message(chat_id, text).await
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        loop {
            let updates = self.get_updates().await?;
            for update in updates {
                let Some(inbound) = update.into_inbound() else {
                    continue;
                };
                if inbound_tx.send(inbound).await.is_err() {
                    anyhow::bail!("telegram inbound channel closed");
                }
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        let url = format!("{}/getMe", self.bot_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error("getMe", e))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn text_message_becomes_inbound() {
        let inbound = update(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": {"id": 555, "type": "private"},
                "from": {"id": 7, "first_name": "Sara", "is_bot": false},
                "text": "  /show_tasks  "
            }
        }))
        .into_inbound()
        .expect("inbound");

        assert_eq!(inbound.chat_id, 555);
        assert_eq!(inbound.sender_name, "Sara");
        assert_eq!(inbound.text, "/show_tasks");
    }

    #[test]
    fn non_text_updates_are_ignored() {
        assert!(update(json!({"update_id": 1})).into_inbound().is_none());
        assert!(
            update(json!({"update_id": 2, "message": {"chat": {"id": 1}, "photo": []}}))
                .into_inbound()
                .is_none()
        );
        assert!(
            update(json!({"update_id": 3, "message": {"chat": {"id": 1}, "text": "   "}}))
                .into_inbound()
                .is_none()
        );
    }

    #[test]
    fn missing_sender_has_empty_name() {
        let inbound = update(json!({
            "update_id": 4,
            "message": {"chat": {"id": -100}, "text": "/start"}
        }))
        .into_inbound()
        .unwrap();
        assert_eq!(inbound.sender_name, "");
        assert_eq!(inbound.chat_id, -100);
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_token() {
        let adapter = TelegramAdapter::new(
            &TelegramConfig {
                api_base_url: "http://127.0.0.1:1".to_owned(),
                poll_timeout_secs: 0,
            },
            "123456:SECRET-TOKEN",
        );

        let send = adapter.send(1, "hi").await.unwrap_err();
        let updates = adapter.get_updates().await.unwrap_err();
        let health = adapter.health_check().await.unwrap_err();

        for err in [send, updates, health] {
            let text = format!("{err:#}");
            assert!(!text.contains("SECRET-TOKEN"), "token leaked: {text}");
            assert!(text.contains("request failed"), "{text}");
        }
    }

    #[test]
    fn short_messages_are_not_split() {
        assert_eq!(split_message("hello\nworld", 4096), vec!["hello\nworld"]);
    }

    #[test]
    fn long_task_lists_split_on_line_breaks() {
        let text: String = (1..=300)
            .map(|i| format!("🔹 {i}. Task number {i}\n   Due: 2025-07-20\n"))
            .collect();
        let chunks = split_message(&text, MAX_MESSAGE_LEN);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.encode_utf16().count() <= MAX_MESSAGE_LEN);
            assert!(chunk.ends_with('\n'), "chunk cut mid-line");
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn overlong_line_is_hard_split() {
        let text = "x".repeat(10);
        assert_eq!(split_message(&text, 4), vec!["xxxx", "xxxx", "xx"]);
    }

    #[test]
    fn bot_url_strips_trailing_slash() {
        let adapter = TelegramAdapter::new(
            &TelegramConfig {
                api_base_url: "http://localhost:8081/".to_owned(),
                poll_timeout_secs: 1,
            },
            "123:abc",
        );
        assert_eq!(adapter.bot_url, "http://localhost:8081/bot123:abc");
    }
}
