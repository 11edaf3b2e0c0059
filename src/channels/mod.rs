//! Chat transports and the inbound command runtime.
//!
//! Adapters receive messages and push them into a bounded queue. The runtime
//! drains the queue, hands each message to the [`CommandHandler`], and sends
//! the reply back through the adapter that owns the chat.

pub mod telegram;
pub mod traits;

pub use telegram::TelegramAdapter;
pub use traits::{ChannelAdapter, ChannelInboundMessage, Notifier};

use crate::commands::CommandHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Smallest accepted inbound queue capacity.
pub const MIN_INBOUND_QUEUE: usize = 8;

const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

/// Run the command loop until the adapter's receive worker stops for good.
///
/// The receive worker is restarted with capped exponential backoff whenever
/// it returns. Messages are handled one at a time on the blocking pool, so
/// store mutations from commands never race each other and file I/O stays off
/// the async workers.
pub async fn run_runtime(
    adapter: Arc<dyn ChannelAdapter>,
    handler: CommandHandler,
    queue_size: usize,
) -> anyhow::Result<()> {
    let (inbound_tx, mut inbound_rx) =
        tokio::sync::mpsc::channel::<ChannelInboundMessage>(queue_size.max(MIN_INBOUND_QUEUE));
    tracing::info!("command runtime started on channel {}", adapter.id());

    let mut workers = JoinSet::new();
    {
        let adapter = Arc::clone(&adapter);
        let tx = inbound_tx.clone();
        workers.spawn(async move {
            let mut backoff_secs = INITIAL_BACKOFF_SECS;
            loop {
                match adapter.run(tx.clone()).await {
                    Ok(()) => {
                        tracing::warn!("channel {} stopped; restarting", adapter.id());
                    }
                    Err(err) => {
                        tracing::warn!(
                            "channel {} failed: {err}; retrying in {backoff_secs}s",
                            adapter.id()
                        );
                    }
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = backoff_secs.saturating_mul(2).min(MAX_BACKOFF_SECS);
            }
        });
    }
    drop(inbound_tx);

    while let Some(message) = inbound_rx.recv().await {
        tracing::debug!(
            "inbound message on {} from {} (chat {})",
            adapter.id(),
            message.sender_name,
            message.chat_id
        );

        let chat_id = message.chat_id;
        let command_handler = handler.clone();
        let reply = match tokio::task::spawn_blocking(move || command_handler.handle(&message)).await
        {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(err) => {
                tracing::error!("command from chat {chat_id} aborted: {err}");
                continue;
            }
        };

        if let Err(err) = adapter.send(chat_id, &reply).await {
            tracing::warn!(
                "failed to send {} reply to chat {chat_id}: {err}",
                adapter.id()
            );
        }
    }

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    Ok(())
}
