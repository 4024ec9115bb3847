use crate::error::BridgeError;
use crate::reconnect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration, immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub irc: IrcConfig,
    pub chat: ChatConfig,
    #[serde(rename = "channelMapping")]
    pub channel_mapping: HashMap<String, String>,

    #[serde(default)]
    pub command_characters: Vec<char>,
    #[serde(default)]
    pub irc_status_notices: IrcStatusNotices,
    #[serde(default = "default_nick_suffix")]
    pub user_nick_suffix: String,
    #[serde(default = "default_irc_timeout")]
    pub irc_timeout_secs: u64,
    #[serde(default)]
    pub irc_options: IrcOptions,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub auto_send_commands: Vec<Vec<String>>,
    #[serde(default)]
    pub mute_slackbot: bool,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
}

fn default_nick_suffix() -> String {
    "-slack".to_string()
}

fn default_irc_timeout() -> u64 {
    120
}

fn default_loglevel() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IrcStatusNotices {
    #[serde(default)]
    pub join: bool,
    #[serde(default)]
    pub leave: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IrcOptions {
    #[serde(default = "default_true")]
    pub flood_protection: bool,
    #[serde(default = "default_flood_delay_ms")]
    pub flood_protection_delay_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

fn default_true() -> bool {
    true
}

fn default_flood_delay_ms() -> u64 {
    reconnect::DEFAULT_FLOOD_DELAY.as_millis() as u64
}

fn default_retry_count() -> u32 {
    10
}

impl Default for IrcOptions {
    fn default() -> Self {
        Self {
            flood_protection: default_true(),
            flood_protection_delay_ms: default_flood_delay_ms(),
            retry_count: default_retry_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IrcConfig {
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    pub token: String,
    /// Base URL for the real-time event socket and web API. Defaults match
    /// the reference implementation's target service but are overridable so
    /// the bridge is not hard-wired to one vendor.
    #[serde(default = "default_rtm_url")]
    pub rtm_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_rtm_url() -> String {
    "wss://chat.example.com/rtm".to_string()
}

fn default_api_base() -> String {
    "https://chat.example.com/api".to_string()
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.irc.server.is_empty() {
            return Err(BridgeError::MissingConfig("irc.server"));
        }
        if self.irc.nickname.is_empty() {
            return Err(BridgeError::MissingConfig("irc.nickname"));
        }
        if self.chat.token.is_empty() {
            return Err(BridgeError::MissingConfig("chat.token"));
        }
        if self.channel_mapping.is_empty() {
            return Err(BridgeError::MissingConfig("channelMapping"));
        }
        Ok(())
    }
}
