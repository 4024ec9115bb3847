//! Per-Chat-user shadow IRC clients (§4.3).
//!
//! Each active Chat user who posts into a mapped channel gets their own IRC
//! connection, impersonating them under a nick derived by [`nick_policy`].
//! The registry is owned exclusively by the bridge actor; nothing else
//! mutates it.

use crate::config::{Config, IrcOptions};
use crate::irc_conn::{self, ConnHandle, ConnOwner, IrcCommand};
use crate::nick_policy;
use crate::types::IrcEvent;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct ShadowState {
    pub chat_user_id: String,
    pub display_name: String,
    pub nick: String,
    pub conn: ConnHandle,
    pub joined_channels: HashSet<String>,
    pending_joins: HashSet<String>,
    away_timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct ShadowRegistry {
    by_user: HashMap<String, ShadowState>,
}

impl ShadowRegistry {
    /// Ensure a shadow exists for `chat_user_id`, spawning its IRC
    /// connection if this is the first time it's been seen. Returns the
    /// nick the shadow is using.
    pub fn ensure(
        &mut self,
        chat_user_id: &str,
        display_name: &str,
        config: &Config,
        events_tx: mpsc::Sender<(ConnOwner, IrcEvent)>,
    ) -> String {
        if let Some(state) = self.by_user.get(chat_user_id) {
            return state.nick.clone();
        }

        let nick = nick_policy::derive_nick(display_name, &config.user_nick_suffix);
        let IrcOptions { retry_count, flood_protection_delay_ms, .. } = config.irc_options;

        debug!(chat_user_id, nick, "spawning shadow connection");
        let conn = irc_conn::spawn(
            ConnOwner::Shadow(chat_user_id.to_string()),
            config.irc.clone(),
            nick.clone(),
            nick.clone(),
            vec![],
            retry_count,
            flood_protection_delay_ms,
            events_tx,
        );

        self.by_user.insert(
            chat_user_id.to_string(),
            ShadowState {
                chat_user_id: chat_user_id.to_string(),
                display_name: display_name.to_string(),
                nick: nick.clone(),
                conn,
                joined_channels: HashSet::new(),
                pending_joins: HashSet::new(),
                away_timer: None,
            },
        );
        nick
    }

    pub fn get(&self, chat_user_id: &str) -> Option<&ShadowState> {
        self.by_user.get(chat_user_id)
    }

    pub fn nick_of(&self, chat_user_id: &str) -> Option<&str> {
        self.by_user.get(chat_user_id).map(|s| s.nick.as_str())
    }

    pub fn user_for_nick(&self, nick: &str) -> Option<&str> {
        self.by_user
            .values()
            .find(|s| s.nick == nick)
            .map(|s| s.chat_user_id.as_str())
    }

    /// Request that a shadow join `irc_channel`, unless it's already
    /// joined or already has a join in flight. Membership is only recorded
    /// once the server confirms it via [`ShadowRegistry::mark_joined`].
    pub async fn join(&mut self, chat_user_id: &str, irc_channel: &str, key: Option<&str>) {
        if let Some(state) = self.by_user.get_mut(chat_user_id) {
            if state.joined_channels.contains(irc_channel) || state.pending_joins.contains(irc_channel) {
                return;
            }
            state.pending_joins.insert(irc_channel.to_string());
            let target = match key {
                Some(k) => format!("{irc_channel} {k}"),
                None => irc_channel.to_string(),
            };
            let _ = state.conn.cmd_tx.send(IrcCommand::Join(target)).await;
        }
    }

    /// Record that the server confirmed a shadow's own JOIN to `channel`.
    pub fn mark_joined(&mut self, chat_user_id: &str, channel: &str) -> bool {
        if let Some(state) = self.by_user.get_mut(chat_user_id) {
            state.pending_joins.remove(channel);
            return state.joined_channels.insert(channel.to_string());
        }
        false
    }

    pub fn is_joined(&self, chat_user_id: &str, channel: &str) -> bool {
        self.by_user.get(chat_user_id).map(|s| s.joined_channels.contains(channel)).unwrap_or(false)
    }

    pub async fn say(&self, chat_user_id: &str, channel: &str, text: String) {
        if let Some(state) = self.by_user.get(chat_user_id) {
            let _ = state.conn.cmd_tx.send(IrcCommand::Say { channel: channel.to_string(), text }).await;
        }
    }

    pub async fn action(&self, chat_user_id: &str, channel: &str, text: String) {
        if let Some(state) = self.by_user.get(chat_user_id) {
            let _ = state.conn.cmd_tx.send(IrcCommand::Action { channel: channel.to_string(), text }).await;
        }
    }

    /// Rename a shadow when its Chat display name changes. Returns the new
    /// nick, or `None` if there was no shadow to rename.
    pub async fn rename(&mut self, chat_user_id: &str, new_display_name: &str, suffix: &str) -> Option<String> {
        let new_nick = nick_policy::derive_nick(new_display_name, suffix);
        let state = self.by_user.get_mut(chat_user_id)?;
        if state.nick == new_nick {
            return Some(new_nick);
        }
        let _ = state.conn.cmd_tx.send(IrcCommand::Nick(new_nick.clone())).await;
        state.nick = new_nick.clone();
        state.display_name = new_display_name.to_string();
        Some(new_nick)
    }

    /// Schedule the user's shadow for destruction after `delay` of
    /// continued away presence, cancelling any previous timer for this
    /// user. The spawned task doesn't destroy anything itself; it's purely
    /// a cancellable clock that notifies the caller once it fires, which
    /// then calls `destroy`.
    pub fn schedule_away(&mut self, chat_user_id: &str, delay: Duration, fire: mpsc::Sender<String>) {
        self.cancel_away(chat_user_id);
        if let Some(state) = self.by_user.get_mut(chat_user_id) {
            let user_id = chat_user_id.to_string();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = fire.send(user_id).await;
            });
            state.away_timer = Some(handle);
        }
    }

    pub fn cancel_away(&mut self, chat_user_id: &str) {
        if let Some(state) = self.by_user.get_mut(chat_user_id) {
            if let Some(handle) = state.away_timer.take() {
                handle.abort();
            }
        }
    }

    /// Tear down a shadow entirely: cancel its away timer and disconnect
    /// its IRC connection.
    pub async fn destroy(&mut self, chat_user_id: &str, reason: &str) {
        self.cancel_away(chat_user_id);
        if let Some(state) = self.by_user.remove(chat_user_id) {
            let _ = state.conn.cmd_tx.send(IrcCommand::Disconnect(reason.to_string())).await;
        }
    }

    /// Remove a shadow whose connection task has already ended on its own
    /// (retry budget exhausted). There's nothing left to disconnect.
    pub fn remove_dead(&mut self, chat_user_id: &str) {
        self.cancel_away(chat_user_id);
        self.by_user.remove(chat_user_id);
    }

    pub fn active_users(&self) -> impl Iterator<Item = &str> {
        self.by_user.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[cfg(test)]
impl ShadowRegistry {
    pub fn by_user_mut_for_test(&mut self, chat_user_id: &str) -> &mut ShadowState {
        self.by_user.get_mut(chat_user_id).expect("shadow must exist in test")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_for_nick_reverse_lookup_on_empty_registry() {
        let registry = ShadowRegistry::default();
        assert_eq!(registry.user_for_nick("anyone"), None);
        assert!(registry.is_empty());
    }
}
