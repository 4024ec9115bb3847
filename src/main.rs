//! Bridge entry point: one Chat<->IRC relay process per config file.

mod bridge;
mod bridge_bot;
mod channel_map;
mod chat_client;
mod command_parser;
mod config;
mod emoji;
mod error;
mod irc_conn;
mod irc_formatting;
mod message_queue;
mod nick_policy;
mod reconnect;
mod shadow;
mod text_transform;
mod types;

use anyhow::Result;
use bridge::Bridge;
use config::Config;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("shadowbridge starting");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = match Config::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load config from {}: {}", config_path, e);
            return Err(e);
        }
    };
    info!("configuration loaded from {}", config_path);

    let (chat_events_tx, chat_events_rx) = mpsc::channel(1024);
    let chat_rtm_config = config.chat.clone();

    let (bridge, irc_events_rx, away_rx) = Bridge::new(config)?;

    let rtm_task = tokio::spawn(async move {
        chat_client::run_rtm(chat_rtm_config, chat_events_tx).await;
    });

    let bridge_task = tokio::spawn(bridge.run(chat_events_rx, irc_events_rx, away_rx));

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received shutdown signal (Ctrl+C)");
        }
        result = bridge_task => {
            if let Err(e) = result {
                error!("bridge task exited with error: {}", e);
            }
            info!("bridge task exited");
        }
    }

    rtm_task.abort();
    info!("shadowbridge shut down");
    Ok(())
}
