//! The bridge actor (§4.6 EventRouter): the single task that owns every
//! piece of mutable state (shadows, queues, the Chat directory) and
//! serializes all mutation through one event loop, fed by the Chat
//! socket, the bot's IRC connection, and every shadow's IRC connection
//! (§5, §9).

use crate::bridge_bot::BridgeBot;
use crate::channel_map::ChannelMap;
use crate::chat_client::ChatClient;
use crate::command_parser::{self, BridgeCommand};
use crate::config::Config;
use crate::irc_conn::ConnOwner;
use crate::message_queue::{MessageQueues, QueuedBody};
use crate::shadow::ShadowRegistry;
use crate::text_transform;
use crate::types::{ChatDirectory, ChatEvent, ChatMessage, IrcEvent, MessageSubtype, Presence};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

enum BridgeEvent {
    Chat(ChatEvent),
    Irc(ConnOwner, IrcEvent),
    AwayFired(String),
}

pub struct Bridge {
    config: Config,
    channel_map: ChannelMap,
    directory: ChatDirectory,
    shadows: ShadowRegistry,
    queues: MessageQueues,
    bot: BridgeBot,
    chat: ChatClient,
    irc_events_tx: mpsc::Sender<(ConnOwner, IrcEvent)>,
    away_tx: mpsc::Sender<String>,
}

impl Bridge {
    pub fn new(config: Config) -> anyhow::Result<(Self, mpsc::Receiver<(ConnOwner, IrcEvent)>, mpsc::Receiver<String>)> {
        let channel_map = ChannelMap::from_config(&config.channel_mapping)?;
        let chat = ChatClient::new(&config.chat);

        let (irc_events_tx, irc_events_rx) = mpsc::channel(1024);
        let (away_tx, away_rx) = mpsc::channel(64);

        let bot = BridgeBot::spawn(&config, &channel_map, irc_events_tx.clone());

        Ok((
            Self {
                config,
                channel_map,
                directory: ChatDirectory::default(),
                shadows: ShadowRegistry::default(),
                queues: MessageQueues::default(),
                bot,
                chat,
                irc_events_tx,
                away_tx,
            },
            irc_events_rx,
            away_rx,
        ))
    }

    /// Run the bridge until the Chat event channel closes.
    pub async fn run(mut self, mut chat_events_rx: mpsc::Receiver<ChatEvent>, mut irc_events_rx: mpsc::Receiver<(ConnOwner, IrcEvent)>, mut away_rx: mpsc::Receiver<String>) {
        loop {
            let event = tokio::select! {
                chat = chat_events_rx.recv() => match chat {
                    Some(e) => BridgeEvent::Chat(e),
                    None => { info!("chat event channel closed, shutting down bridge"); return; }
                },
                irc = irc_events_rx.recv() => match irc {
                    Some((owner, e)) => BridgeEvent::Irc(owner, e),
                    None => { warn!("irc event channel closed"); return; }
                },
                fired = away_rx.recv() => match fired {
                    Some(user) => BridgeEvent::AwayFired(user),
                    None => continue,
                },
            };

            match event {
                BridgeEvent::Chat(e) => self.handle_chat_event(e).await,
                BridgeEvent::Irc(owner, e) => self.handle_irc_event(owner, e).await,
                BridgeEvent::AwayFired(user) => {
                    let name = self.directory.user_name(&user).unwrap_or(&user).to_string();
                    self.shadows.destroy(&user, &format!("Chat user {name} went away.")).await;
                    self.queues.drop_user(&user);
                }
            }
        }
    }

    /// The icon to post under when relaying `author`'s IRC activity: the
    /// configured avatar template with `$username` substituted, suppressed
    /// entirely when avatars are off or `author` is the bot's own nick
    /// (§4.5).
    fn icon_url_for(&self, author: &str) -> Option<String> {
        if author == self.config.irc.nickname {
            return None;
        }
        self.config.avatar_url.as_ref().map(|template| template.replace("$username", author))
    }

    fn slack_name_to_nick(&self) -> HashMap<String, String> {
        self.shadows
            .active_users()
            .filter_map(|id| {
                let state = self.shadows.get(id)?;
                Some((state.display_name.clone(), state.nick.clone()))
            })
            .collect()
    }

    async fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            // The socket handshake here carries no member-list snapshot (unlike
            // a full rtm.start dump), so there's nothing to eagerly prime
            // shadows from; they're created lazily as messages and presence
            // changes arrive instead.
            ChatEvent::Open => info!("chat real-time connection established"),
            ChatEvent::Error(message) => warn!("chat transport error: {}", message),
            ChatEvent::UserChange { user } => {
                let had_shadow = self.shadows.nick_of(&user.id).is_some();
                self.directory.upsert_user(user.clone());
                if had_shadow {
                    self.shadows.rename(&user.id, &user.name, &self.config.user_nick_suffix).await;
                }
            }
            ChatEvent::PresenceChange { user, presence } => {
                if let Some(existing) = self.directory.user(&user).cloned() {
                    self.directory.upsert_user(crate::types::ChatUser { presence, ..existing });
                }
                match presence {
                    Presence::Away => {
                        let grace = Duration::from_secs(self.config.irc_timeout_secs);
                        self.shadows.schedule_away(&user, grace, self.away_tx.clone());
                    }
                    Presence::Active => {
                        if self.shadows.nick_of(&user).is_some() {
                            self.shadows.cancel_away(&user);
                        } else if !self.directory.is_bot(&user) {
                            let display_name = self.directory.user_name(&user).unwrap_or(&user).to_string();
                            self.shadows.ensure(&user, &display_name, &self.config, self.irc_events_tx.clone());
                        }
                    }
                }
            }
            ChatEvent::Message(message) => self.handle_chat_message(message).await,
        }
    }

    async fn handle_chat_message(&mut self, message: ChatMessage) {
        if self.directory.is_bot(&message.user) {
            return;
        }
        if self.config.mute_slackbot && self.directory.user_name(&message.user) == Some("slackbot") {
            return;
        }

        let Some(irc_channel) = self.channel_map.irc_channel_for(&message.channel).map(str::to_string) else {
            return;
        };

        if let Some(command) = command_parser::parse(&message.text, &self.config.command_characters) {
            self.handle_bridge_command(&message.channel, command).await;
            return;
        }

        let is_action = matches!(message.subtype, Some(MessageSubtype::MeMessage));
        let relayable = match &message.subtype {
            None => true,
            Some(MessageSubtype::MeMessage) | Some(MessageSubtype::FileShare) => true,
            Some(MessageSubtype::Other(_)) => false,
        };
        if !relayable {
            return;
        }

        let mut body_text = message.text.clone();
        if let Some(file) = &message.file {
            if let Some(comment) = &file.initial_comment {
                body_text = format!("{comment}:\r\n{}", file.permalink);
            } else {
                body_text = file.permalink.clone();
            }
        }

        let slack_to_nick = self.slack_name_to_nick();
        let text = text_transform::parse_text(&body_text, &self.directory, &slack_to_nick);

        let display_name = self.directory.user_name(&message.user).unwrap_or(&message.user).to_string();
        self.shadows.ensure(&message.user, &display_name, &self.config, self.irc_events_tx.clone());
        let key = self.channel_map.join_key_for(&irc_channel).map(str::to_string);
        self.shadows.join(&message.user, &irc_channel, key.as_deref()).await;

        let body = if is_action { QueuedBody::Action(text) } else { QueuedBody::Privmsg(text) };
        self.queues.enqueue(&message.user, &irc_channel, body);
        self.queues.flush(&message.user, &self.shadows).await;
    }

    async fn handle_bridge_command(&self, chat_channel: &str, command: BridgeCommand) {
        let Some(irc_channel) = self.channel_map.irc_channel_for(chat_channel) else { return };
        let reply = match command {
            BridgeCommand::Online { channel } => {
                let target = channel.unwrap_or_else(|| irc_channel.to_string());
                format!("online users for {target}: (names pending)")
            }
            BridgeCommand::Topic => format!("topic for {irc_channel} is not cached"),
            BridgeCommand::Help => "commands: online [channel], topic".to_string(),
        };
        let _ = self.chat.post_message(chat_channel, &reply, &self.config.irc.nickname, None).await;
    }

    async fn handle_irc_event(&mut self, owner: ConnOwner, event: IrcEvent) {
        match owner {
            ConnOwner::Bot => self.handle_bot_event(event).await,
            ConnOwner::Shadow(user_id) => self.handle_shadow_event(user_id, event).await,
        }
    }

    async fn handle_bot_event(&mut self, event: IrcEvent) {
        match event {
            IrcEvent::Registered => info!("bridge bot registered on IRC"),
            IrcEvent::Invite { channel, .. } => {
                if self.channel_map.contains_irc_channel(&channel) {
                    let target = match self.channel_map.join_key_for(&channel) {
                        Some(key) => format!("{channel} {key}"),
                        None => channel,
                    };
                    self.bot.join(&target).await;
                }
            }
            IrcEvent::Kick { channel, nick, by, reason } => {
                if let Some(user_id) = self.shadows.user_for_nick(&nick).map(str::to_string) {
                    self.shadows.destroy(&user_id, "kicked").await;
                }
                if let Some(chat_channel) = self.channel_map.chat_channel_for(&channel) {
                    let text = format!("{by} kicked {nick} from IRC. ({reason})");
                    let _ = self.chat.post_message(chat_channel, &text, &self.config.irc.nickname, None).await;
                }
            }
            IrcEvent::Join { channel, nick } if self.config.irc_status_notices.join => {
                if let Some(chat_channel) = self.channel_map.chat_channel_for(&channel) {
                    let text = format!("{nick} has joined {channel}");
                    let _ = self.chat.post_message(chat_channel, &text, &self.config.irc.nickname, None).await;
                }
            }
            IrcEvent::Part { channel, nick } if self.config.irc_status_notices.leave => {
                if let Some(chat_channel) = self.channel_map.chat_channel_for(&channel) {
                    let text = format!("{nick} has left {channel}");
                    let _ = self.chat.post_message(chat_channel, &text, &self.config.irc.nickname, None).await;
                }
            }
            IrcEvent::Message { from, to, text } => self.relay_irc_message(&to, &from, &text, RelayKind::Message).await,
            IrcEvent::Action { from, to, text } => self.relay_irc_message(&to, &from, &text, RelayKind::Action).await,
            IrcEvent::Notice { from, to, text } => self.relay_irc_message(&to, &from, &text, RelayKind::Notice).await,
            IrcEvent::Error { raw_command } => warn!(raw_command, "bridge bot received an IRC error"),
            IrcEvent::Abort => {
                error!("bridge bot's IRC connection aborted after exhausting its retry budget, shutting down");
                std::process::exit(1);
            }
            _ => {}
        }
    }

    async fn handle_shadow_event(&mut self, user_id: String, event: IrcEvent) {
        match event {
            IrcEvent::Join { channel, nick } => {
                if self.shadows.nick_of(&user_id) == Some(nick.as_str()) {
                    if self.shadows.mark_joined(&user_id, &channel) {
                        self.queues.flush(&user_id, &self.shadows).await;
                    }
                }
            }
            IrcEvent::Error { raw_command } if raw_command == "432" => {
                warn!(user_id, "shadow's derived nick was rejected by the server (432), destroying it");
                self.shadows.destroy(&user_id, "erroneous nickname").await;
                self.queues.drop_user(&user_id);
                if let Ok(dm_channel) = self.chat.open_dm(&user_id).await {
                    let text = "Your IRC nickname was rejected by the server. \
                        Messages from you will not be relayed to IRC until your Chat display name \
                        produces a valid IRC nickname.";
                    let _ = self.chat.post_message(&dm_channel, text, &self.config.irc.nickname, None).await;
                }
            }
            IrcEvent::Abort => {
                self.queues.drop_user(&user_id);
                self.shadows.remove_dead(&user_id);
            }
            // Channel messages are relayed once, by the bot's own connection
            // (§4.5); a shadow only reports error/abort/names (§4.6).
            _ => {}
        }
    }

    /// Relay an IRC message, action, or notice (from the bot's view or
    /// overheard by a shadow) back into the mapped Chat channel, skipping
    /// anything echoed by one of our own nicks.
    async fn relay_irc_message(&self, irc_channel: &str, from_nick: &str, text: &str, kind: RelayKind) {
        if from_nick == self.config.irc.nickname || self.shadows.user_for_nick(from_nick).is_some() {
            return;
        }
        let Some(chat_channel) = self.channel_map.chat_channel_for(irc_channel) else { return };

        let mut nick_to_slack = HashMap::new();
        for id in self.shadows.active_users() {
            if let Some(state) = self.shadows.get(id) {
                nick_to_slack.insert(state.nick.clone(), state.display_name.clone());
            }
        }
        let mut text = text_transform::replace_usernames(text, &self.config.user_nick_suffix, &nick_to_slack);
        text = match kind {
            RelayKind::Message => text,
            RelayKind::Action => format!("_{text}_"),
            RelayKind::Notice => format!("*{text}*"),
        };

        let icon = self.icon_url_for(from_nick);
        let _ = self.chat.post_message(chat_channel, &text, from_nick, icon.as_deref()).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayKind {
    Message,
    Action,
    Notice,
}
