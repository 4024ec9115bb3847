//! Shared domain types flowing between the Chat side and the IRC side of
//! the bridge.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Active,
    Away,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub presence: Presence,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannelKind {
    Channel,
    Group,
    Dm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChannel {
    pub id: String,
    pub name: String,
    pub kind: ChatChannelKind,
    /// Chat user IDs currently members of this channel.
    pub members: Vec<String>,
}

impl ChatChannel {
    /// The display name used when resolving the target IRC channel:
    /// `#name` for public channels, bare name for groups/DMs.
    pub fn display_name(&self) -> String {
        match self.kind {
            ChatChannelKind::Channel => format!("#{}", self.name),
            ChatChannelKind::Group | ChatChannelKind::Dm => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFile {
    pub permalink: String,
    pub initial_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSubtype {
    MeMessage,
    FileShare,
    Other(String),
}

impl MessageSubtype {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "me_message" => MessageSubtype::MeMessage,
            "file_share" => MessageSubtype::FileShare,
            other => MessageSubtype::Other(other.to_string()),
        }
    }

    /// Whether the enqueue rule in §4.4 admits this subtype for relay.
    pub fn is_relayable(&self) -> bool {
        matches!(self, MessageSubtype::MeMessage | MessageSubtype::FileShare)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub channel: String,
    pub text: String,
    pub subtype: Option<MessageSubtype>,
    pub file: Option<ChatFile>,
}

/// Events arriving over the Chat real-time socket (§6).
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Open,
    Message(ChatMessage),
    PresenceChange { user: String, presence: Presence },
    UserChange { user: ChatUser },
    Error(String),
}

/// Events arriving from an IRC connection (bot or shadow).
#[derive(Debug, Clone)]
pub enum IrcEvent {
    Registered,
    Message { from: String, to: String, text: String },
    Notice { from: String, to: String, text: String },
    Action { from: String, to: String, text: String },
    Invite { from: String, channel: String },
    Kick { channel: String, nick: String, by: String, reason: String },
    Join { channel: String, nick: String },
    Part { channel: String, nick: String },
    Quit { nick: String, message: String },
    Names { channel: String },
    Error { raw_command: String },
    Abort,
}

/// Read-only snapshot of Chat-side users and channels, used by
/// [`crate::text_transform`] to resolve IDs to display names. Populated
/// from the `open`/`user_change`/`message` event stream; the core never
/// issues a separate blocking RPC to rebuild it.
#[derive(Debug, Clone, Default)]
pub struct ChatDirectory {
    users: HashMap<String, ChatUser>,
    channels: HashMap<String, ChatChannel>,
    pub bot_user_id: Option<String>,
}

impl ChatDirectory {
    pub fn upsert_user(&mut self, user: ChatUser) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn upsert_channel(&mut self, channel: ChatChannel) {
        self.channels.insert(channel.id.clone(), channel);
    }

    pub fn user(&self, id: &str) -> Option<&ChatUser> {
        self.users.get(id)
    }

    pub fn channel(&self, id: &str) -> Option<&ChatChannel> {
        self.channels.get(id)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&ChatChannel> {
        self.channels.values().find(|c| c.display_name() == name || c.name == name)
    }

    pub fn user_name(&self, id: &str) -> Option<&str> {
        self.user(id).map(|u| u.name.as_str())
    }

    pub fn channel_name(&self, id: &str) -> Option<&str> {
        self.channel(id).map(|c| c.name.as_str())
    }

    pub fn is_bot(&self, id: &str) -> bool {
        self.user(id).map(|u| u.is_bot).unwrap_or(false)
    }

    pub fn users(&self) -> impl Iterator<Item = &ChatUser> {
        self.users.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChatChannel> {
        self.channels.values()
    }
}
