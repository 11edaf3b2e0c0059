//! Task reminder bot binary.
//!
//! Configuration comes from the environment (`BOT_TOKEN`, `REMINDER_TIME`,
//! ...) and an optional TOML file named by `TASKMINDER_CONFIG`.

use taskminder::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the same file, so report directly.
            eprintln!("taskminder: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = taskminder::logging::init(&config.log);
    tracing::info!("taskminder v{} starting", env!("CARGO_PKG_VERSION"));

    taskminder::app::run(config).await.map_err(|e| {
        tracing::error!(error = %e, "taskminder exited with error");
        e
    })
}
