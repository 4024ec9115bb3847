//! Per-user outbound message queue and IRC dispatch (§4.4).
//!
//! Chat messages destined for IRC are enqueued as soon as they arrive, but
//! a shadow can only actually say them once its connection has joined the
//! target channel. Ordering is preserved per Chat user across every
//! channel they post to: a flush pass walks the queue strictly in arrival
//! order and stops at the first entry whose channel isn't joined yet,
//! rather than skipping ahead to later entries that happen to be ready.
//! This is a deliberate design choice, not an oversight: unbounded
//! reordering across channels would make this bridge meaningless when
//! several shadows race to relay a conversation.

use crate::irc_formatting;
use crate::shadow::ShadowRegistry;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub enum QueuedBody {
    Privmsg(String),
    Action(String),
}

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub irc_channel: String,
    pub body: QueuedBody,
}

#[derive(Default)]
pub struct MessageQueues {
    by_user: HashMap<String, VecDeque<QueuedMessage>>,
}

impl MessageQueues {
    pub fn enqueue(&mut self, chat_user_id: &str, irc_channel: &str, body: QueuedBody) {
        self.by_user
            .entry(chat_user_id.to_string())
            .or_default()
            .push_back(QueuedMessage { irc_channel: irc_channel.to_string(), body });
    }

    pub fn has_pending(&self, chat_user_id: &str) -> bool {
        self.by_user.get(chat_user_id).map(|q| !q.is_empty()).unwrap_or(false)
    }

    /// Drain as many leading entries as are ready, sending each through
    /// `shadows`. Stops at the first entry whose channel isn't in
    /// `joined_channels`, leaving it (and everything behind it) queued.
    pub async fn flush(&mut self, chat_user_id: &str, shadows: &ShadowRegistry) {
        let Some(queue) = self.by_user.get_mut(chat_user_id) else { return };
        let Some(state) = shadows.get(chat_user_id) else { return };

        while let Some(front) = queue.front() {
            if !state.joined_channels.contains(&front.irc_channel) {
                break;
            }
            let entry = queue.pop_front().expect("front just checked Some");
            match entry.body {
                QueuedBody::Privmsg(text) => {
                    for line in irc_formatting::split_message_smart(&text, irc_formatting::MAX_LINE_LEN) {
                        shadows.say(chat_user_id, &entry.irc_channel, line).await;
                    }
                }
                QueuedBody::Action(text) => {
                    for line in irc_formatting::split_message_smart(&text, irc_formatting::MAX_LINE_LEN) {
                        shadows.action(chat_user_id, &entry.irc_channel, line).await;
                    }
                }
            }
        }
    }

    pub fn drop_user(&mut self, chat_user_id: &str) {
        self.by_user.remove(chat_user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        let mut channel_mapping = std::collections::HashMap::new();
        channel_mapping.insert("#general".to_string(), "#irc-general".to_string());
        Config {
            irc: crate::config::IrcConfig {
                server: "irc.example.com".to_string(),
                port: 6667,
                use_tls: false,
                nickname: "bot".to_string(),
            },
            chat: crate::config::ChatConfig {
                token: "tok".to_string(),
                rtm_url: "wss://chat.example.com/rtm".to_string(),
                api_base: "https://chat.example.com/api".to_string(),
            },
            channel_mapping,
            command_characters: vec!['!'],
            irc_status_notices: Default::default(),
            user_nick_suffix: "-slack".to_string(),
            irc_timeout_secs: 120,
            irc_options: Default::default(),
            avatar_url: None,
            auto_send_commands: vec![],
            mute_slackbot: false,
            loglevel: "info".to_string(),
        }
    }

    #[test]
    fn enqueue_is_fifo_per_user() {
        let mut queues = MessageQueues::default();
        queues.enqueue("U1", "#irc-a", QueuedBody::Privmsg("one".to_string()));
        queues.enqueue("U1", "#irc-b", QueuedBody::Privmsg("two".to_string()));
        let q = queues.by_user.get("U1").unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q[0].irc_channel, "#irc-a");
        assert_eq!(q[1].irc_channel, "#irc-b");
    }

    #[tokio::test]
    async fn flush_stops_at_first_unjoined_channel() {
        let config = test_config();
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        let mut shadows = ShadowRegistry::default();
        shadows.ensure("U1", "alice", &config, tx);

        let mut queues = MessageQueues::default();
        queues.enqueue("U1", "#irc-a", QueuedBody::Privmsg("hi-a".to_string()));
        queues.enqueue("U1", "#irc-b", QueuedBody::Privmsg("hi-b".to_string()));
        queues.enqueue("U1", "#irc-a", QueuedBody::Privmsg("hi-a-again".to_string()));

        // Mark #irc-a joined but not #irc-b.
        {
            let state = shadows.by_user_mut_for_test("U1");
            state.joined_channels.insert("#irc-a".to_string());
        }

        queues.flush("U1", &shadows).await;

        let remaining = queues.by_user.get("U1").unwrap();
        // "hi-a" drained, "hi-b" blocks the rest even though another #irc-a
        // message follows it.
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].irc_channel, "#irc-b");
    }
}
