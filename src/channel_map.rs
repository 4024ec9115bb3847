use crate::error::BridgeError;
use std::collections::HashMap;

/// Bidirectional, injective mapping between Chat channel names and IRC
/// channel names.
///
/// Passwords supplied as a second space-separated token in the configured
/// IRC-channel value (e.g. `"#irc-room secretkey"`) are stripped from the
/// stored mapping but kept alongside for the join command.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    chat_to_irc: HashMap<String, String>,
    irc_to_chat: HashMap<String, String>,
    irc_join_keys: HashMap<String, String>,
}

impl ChannelMap {
    /// Build a map from the raw `channelMapping` config table.
    ///
    /// Enforces the injectivity invariant: no two Chat channels may map to
    /// the same IRC channel.
    pub fn from_config(raw: &HashMap<String, String>) -> Result<Self, BridgeError> {
        let mut map = ChannelMap::default();
        for (chat_channel, value) in raw {
            let mut parts = value.split_whitespace();
            let irc_channel = parts
                .next()
                .ok_or_else(|| BridgeError::InvalidMapping {
                    key: chat_channel.clone(),
                    value: value.clone(),
                    reason: "empty IRC channel value",
                })?
                .to_lowercase();
            let key = parts.next().map(|s| s.to_string());

            if map.irc_to_chat.contains_key(&irc_channel) {
                return Err(BridgeError::DuplicateMappingTarget(irc_channel));
            }

            map.chat_to_irc.insert(chat_channel.clone(), irc_channel.clone());
            map.irc_to_chat.insert(irc_channel.clone(), chat_channel.clone());
            if let Some(key) = key {
                map.irc_join_keys.insert(irc_channel, key);
            }
        }
        Ok(map)
    }

    pub fn irc_channel_for(&self, chat_channel: &str) -> Option<&str> {
        self.chat_to_irc.get(chat_channel).map(String::as_str)
    }

    pub fn chat_channel_for(&self, irc_channel: &str) -> Option<&str> {
        self.irc_to_chat.get(&irc_channel.to_lowercase()).map(String::as_str)
    }

    pub fn join_key_for(&self, irc_channel: &str) -> Option<&str> {
        self.irc_join_keys.get(&irc_channel.to_lowercase()).map(String::as_str)
    }

    pub fn irc_channels(&self) -> impl Iterator<Item = &str> {
        self.irc_to_chat.keys().map(String::as_str)
    }

    pub fn contains_irc_channel(&self, irc_channel: &str) -> bool {
        self.irc_to_chat.contains_key(&irc_channel.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_directions_and_lowercases_irc_side() {
        let mut raw = HashMap::new();
        raw.insert("#general".to_string(), "#IRC-General".to_string());
        let map = ChannelMap::from_config(&raw).unwrap();

        assert_eq!(map.irc_channel_for("#general"), Some("#irc-general"));
        assert_eq!(map.chat_channel_for("#IRC-General"), Some("#general"));
        assert_eq!(map.chat_channel_for("#irc-general"), Some("#general"));
    }

    #[test]
    fn strips_password_but_keeps_join_key() {
        let mut raw = HashMap::new();
        raw.insert("#secret".to_string(), "#irc-secret hunter2".to_string());
        let map = ChannelMap::from_config(&raw).unwrap();

        assert_eq!(map.irc_channel_for("#secret"), Some("#irc-secret"));
        assert_eq!(map.join_key_for("#irc-secret"), Some("hunter2"));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let mut raw = HashMap::new();
        raw.insert("#one".to_string(), "#irc-room".to_string());
        raw.insert("#two".to_string(), "#irc-room".to_string());
        assert!(ChannelMap::from_config(&raw).is_err());
    }
}
