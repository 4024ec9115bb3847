use thiserror::Error;

/// Typed, expected failures surfaced by the bridge.
///
/// Transient network failures from the IRC and Chat clients are logged and
/// retried by [`crate::reconnect`] rather than represented here; this enum
/// covers the failures callers are expected to branch on.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("missing required config field: {0}")]
    MissingConfig(&'static str),

    #[error("invalid channel mapping entry `{key}` -> `{value}`: {reason}")]
    InvalidMapping {
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("channel mapping value `{0}` is used by more than one key")]
    DuplicateMappingTarget(String),

    #[error("chat web api error for {method}: {message}")]
    ChatApi { method: &'static str, message: String },

    #[error("no shadow registered for chat user {0}")]
    NoShadow(String),

    #[error("irc protocol error: {0}")]
    Irc(#[from] irc::error::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
