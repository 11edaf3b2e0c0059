//! Process composition: wires the store, chat transport, command runtime
//! and reminder scheduler together and runs them until shutdown.

use crate::channels::{self, ChannelAdapter, Notifier, TelegramAdapter};
use crate::commands::CommandHandler;
use crate::config::BotConfig;
use crate::reminder::{ReminderEngine, ReminderService};
use crate::scheduler::{DailyTrigger, ReminderScheduler};
use crate::store::RecordStore;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the bot on Telegram until Ctrl-C, or until the command runtime or
/// scheduler exits.
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let telegram = Arc::new(TelegramAdapter::new(&config.telegram, &config.bot_token));
    let trigger = DailyTrigger::new(config.reminder_time, chrono::Local::now().naive_local());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    serve(&config, telegram, trigger, shutdown).await
}

/// Run the command runtime and reminder scheduler over `adapter` until
/// `shutdown` resolves or either loop exits.
///
/// The adapter is both the inbound transport and the reminder notifier.
pub async fn serve<A>(
    config: &BotConfig,
    adapter: Arc<A>,
    trigger: DailyTrigger,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    A: ChannelAdapter + 'static,
{
    let store = RecordStore::new(&config.data_dir);
    info!(
        "records: {} and {}",
        store.members_path().display(),
        store.tasks_path().display()
    );

    match adapter.health_check().await {
        Ok(true) => info!("{} API reachable", adapter.id()),
        Ok(false) => warn!("{} health check was rejected; check the bot token", adapter.id()),
        Err(e) => warn!("{} health check failed: {e}", adapter.id()),
    }

    let notifier: Arc<dyn Notifier> = adapter.clone();
    let engine = ReminderEngine::new(notifier, config.send_timeout());
    let service = Arc::new(ReminderService::new(store.clone(), engine));
    let mut scheduler = ReminderScheduler::with_trigger(trigger, service)
        .with_poll_interval(config.poll_interval())
        .run();
    info!(
        "reminders will be checked daily at {}",
        config.reminder_time
    );

    let handler = CommandHandler::new(store);
    let channel: Arc<dyn ChannelAdapter> = adapter;
    let commands = channels::run_runtime(channel, handler, config.inbound_queue_size);
    info!("bot is running and accepting commands");

    let result = tokio::select! {
        res = commands => match res {
            Ok(()) => {
                warn!("command runtime stopped");
                Ok(())
            }
            Err(e) => {
                error!("command runtime failed: {e}");
                Err(e)
            }
        },
        res = &mut scheduler => {
            error!("reminder scheduler exited unexpectedly: {res:?}");
            Err(anyhow::anyhow!("reminder scheduler exited"))
        }
        () = shutdown => {
            info!("shutdown requested");
            Ok(())
        }
    };

    scheduler.abort();
    info!("bot stopped");
    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::channels::ChannelInboundMessage;
    use crate::store::{Member, Task};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    /// Chat transport fed by the test. Sends to `stuck_chat` never complete.
    struct LoopbackChannel {
        inbound: Mutex<Option<mpsc::Receiver<ChannelInboundMessage>>>,
        outbox: mpsc::UnboundedSender<(i64, String)>,
        stuck_chat: i64,
    }

    #[async_trait]
    impl Notifier for LoopbackChannel {
        async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
            let _ = self.outbox.send((chat_id, text.to_owned()));
            if chat_id == self.stuck_chat {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelAdapter for LoopbackChannel {
        fn id(&self) -> &'static str {
            "loopback"
        }

        async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
            let inbound = self.inbound.lock().unwrap().take();
            if let Some(mut inbound) = inbound {
                while let Some(message) = inbound.recv().await {
                    inbound_tx.send(message).await?;
                }
            }
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn health_check(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn config(data_dir: PathBuf) -> BotConfig {
        BotConfig {
            bot_token: "test".to_owned(),
            data_dir,
            poll_interval_ms: 10,
            send_timeout_secs: 60,
            ..BotConfig::default()
        }
    }

    async fn next_sent(outbox: &mut mpsc::UnboundedReceiver<(i64, String)>) -> (i64, String) {
        tokio::time::timeout(Duration::from_secs(5), outbox.recv())
            .await
            .expect("timed out waiting for an outbound message")
            .expect("outbox closed")
    }

    #[tokio::test]
    async fn commands_are_answered_while_a_pass_is_stuck() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let today = chrono::Local::now().date_naive();
        store
            .insert_member(Member {
                username: "ahmed".to_owned(),
                chat_id: 555,
            })
            .unwrap();
        store
            .append_task(Task::new("Ship release", today, "ahmed", 555))
            .unwrap();

        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (outbox_tx, mut outbox) = mpsc::unbounded_channel();
        let channel = Arc::new(LoopbackChannel {
            inbound: Mutex::new(Some(inbound_rx)),
            outbox: outbox_tx,
            stuck_chat: 555,
        });

        let config = config(dir.path().to_path_buf());
        let due = today.and_hms_opt(0, 0, 0).unwrap();
        let trigger = DailyTrigger::with_next_fire(config.reminder_time, due);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = tokio::spawn(async move {
            serve(&config, channel, trigger, async {
                let _ = stop_rx.await;
            })
            .await
        });

        let (chat, text) = next_sent(&mut outbox).await;
        assert_eq!(chat, 555);
        assert!(text.contains("Ship release"), "{text}");

        inbound_tx
            .send(ChannelInboundMessage {
                chat_id: 7,
                sender_name: "Lead".to_owned(),
                text: "/show_tasks".to_owned(),
            })
            .await
            .unwrap();

        let (chat, text) = next_sent(&mut outbox).await;
        assert_eq!(chat, 7);
        assert!(text.contains("🔹 1. Ship release"), "{text}");

        stop_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), app)
            .await
            .expect("app did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
