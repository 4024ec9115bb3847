use shadowbridge::config::{ChatConfig, Config, IrcConfig};
use shadowbridge::message_queue::{MessageQueues, QueuedBody};
use shadowbridge::nick_policy::derive_nick;
use shadowbridge::shadow::ShadowRegistry;
use shadowbridge::text_transform::parse_text;
use shadowbridge::types::ChatDirectory;
use std::collections::HashMap;

fn test_config() -> Config {
    let mut channel_mapping = HashMap::new();
    channel_mapping.insert("#general".to_string(), "#irc-general".to_string());
    Config {
        irc: IrcConfig { server: "irc.example.com".to_string(), port: 6667, use_tls: false, nickname: "bridge-bot".to_string() },
        chat: ChatConfig {
            token: "tok".to_string(),
            rtm_url: "wss://chat.example.com/rtm".to_string(),
            api_base: "https://chat.example.com/api".to_string(),
        },
        channel_mapping,
        command_characters: vec!['/'],
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

/// A Chat message mentioning an active shadow gets text-transformed into
/// that shadow's IRC nick, and the resulting line only reaches IRC once
/// the shadow's join to the target channel is confirmed.
#[tokio::test]
async fn message_waits_for_join_confirmation_before_relay() {
    let config = test_config();
    let directory = ChatDirectory::default();
    let (events_tx, _events_rx) = tokio::sync::mpsc::channel(16);

    let mut shadows = ShadowRegistry::default();
    let nick = shadows.ensure("U1", "alice", &config, events_tx.clone());
    assert_eq!(nick, derive_nick("alice", "-slack"));

    let mut slack_to_nick = HashMap::new();
    slack_to_nick.insert("alice".to_string(), nick.clone());
    let rendered = parse_text("@alice hello", &directory, &slack_to_nick);
    assert_eq!(rendered, format!("{nick} hello"));

    let mut queues = MessageQueues::default();
    queues.enqueue("U1", "#irc-general", QueuedBody::Privmsg(rendered));
    assert!(queues.has_pending("U1"));

    // Not joined yet: flushing does nothing.
    queues.flush("U1", &shadows).await;
    assert!(queues.has_pending("U1"));

    shadows.mark_joined("U1", "#irc-general");
    queues.flush("U1", &shadows).await;
    assert!(!queues.has_pending("U1"));
}
