//! The bridge's own IRC identity (§4.5): one connection, present in every
//! mapped channel, used for relaying messages from Chat users who don't
//! have (or haven't yet been given) a shadow, channel status notices, and
//! accepting invites into newly mapped channels.

use crate::channel_map::ChannelMap;
use crate::config::Config;
use crate::irc_conn::{self, ConnHandle, ConnOwner, IrcCommand};
use crate::types::IrcEvent;
use tokio::sync::mpsc;

pub struct BridgeBot {
    conn: ConnHandle,
}

impl BridgeBot {
    pub fn spawn(config: &Config, channel_map: &ChannelMap, events_tx: mpsc::Sender<(ConnOwner, IrcEvent)>) -> Self {
        let autojoin = channel_map
            .irc_channels()
            .map(|chan| match channel_map.join_key_for(chan) {
                Some(key) => format!("{chan} {key}"),
                None => chan.to_string(),
            })
            .collect();

        let conn = irc_conn::spawn(
            ConnOwner::Bot,
            config.irc.clone(),
            config.irc.nickname.clone(),
            config.irc.nickname.clone(),
            autojoin,
            config.irc_options.retry_count,
            config.irc_options.flood_protection_delay_ms,
            events_tx,
        );

        for command in &config.auto_send_commands {
            if !command.is_empty() {
                let _ = conn.cmd_tx.try_send(IrcCommand::Raw(command.clone()));
            }
        }

        Self { conn }
    }

    pub async fn say(&self, channel: &str, text: String) {
        let _ = self.conn.cmd_tx.send(IrcCommand::Say { channel: channel.to_string(), text }).await;
    }

    pub async fn notice(&self, channel: &str, text: String) {
        let _ = self.conn.cmd_tx.send(IrcCommand::Notice { channel: channel.to_string(), text }).await;
    }

    pub async fn join(&self, channel_and_key: &str) {
        let _ = self.conn.cmd_tx.send(IrcCommand::Join(channel_and_key.to_string())).await;
    }
}
