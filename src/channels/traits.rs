use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound text message received from a chat.
#[derive(Debug, Clone)]
pub struct ChannelInboundMessage {
    /// Chat the message was posted in; replies go back here.
    pub chat_id: i64,
    /// Display name of the sender (first name on Telegram).
    pub sender_name: String,
    pub text: String,
}

/// Delivers a text message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to `chat_id`. A single attempt, no retry.
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Chat transport contract. New transports only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Notifier {
    /// Stable channel identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Start receiving inbound messages and forwarding them to the runtime.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health check.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
