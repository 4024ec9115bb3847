//! Chat-side transport: the real-time event socket and the web API (§6).
//!
//! Grounded on the Socket-Mode bridge pattern (`connect_async` +
//! `reqwest`, envelope ack, JSON event dispatch), generalized from a
//! single always-on bot connection to a client usable both for the bot's
//! own feed and, if a future Chat backend needs it, a shadow's.

use crate::config::ChatConfig;
use crate::error::BridgeError;
use crate::reconnect;
use crate::types::{ChatEvent, ChatFile, ChatMessage, ChatUser, MessageSubtype, Presence};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl ChatClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: config.token.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Post a message into a Chat channel, impersonating `username` with
    /// `icon_url` the way the bot relays IRC activity back (§4.6).
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        icon_url: Option<&str>,
    ) -> Result<(), BridgeError> {
        let mut body = json!({
            "channel": channel,
            "text": text,
            "as_user": false,
            "username": username,
            "parse": "full",
            "link_names": true,
        });
        if let Some(icon) = icon_url {
            body["icon_url"] = json!(icon);
        }

        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let parsed: Value = resp.json().await.unwrap_or_default();
        if !parsed["ok"].as_bool().unwrap_or(false) {
            return Err(BridgeError::ChatApi {
                method: "chat.postMessage",
                message: parsed["error"].as_str().unwrap_or("unknown").to_string(),
            });
        }
        Ok(())
    }

    /// Open (or fetch) the DM channel id for a given Chat user.
    pub async fn open_dm(&self, user_id: &str) -> Result<String, BridgeError> {
        let resp = self
            .http
            .post(format!("{}/im.open", self.api_base))
            .bearer_auth(&self.token)
            .json(&json!({ "user": user_id }))
            .send()
            .await?;

        let parsed: Value = resp.json().await.unwrap_or_default();
        if !parsed["ok"].as_bool().unwrap_or(false) {
            return Err(BridgeError::ChatApi {
                method: "im.open",
                message: parsed["error"].as_str().unwrap_or("unknown").to_string(),
            });
        }
        parsed["channel"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(BridgeError::ChatApi { method: "im.open", message: "missing channel id".to_string() })
    }
}

/// Run the real-time event socket, reconnecting with the shared backoff
/// policy until `events_tx` is dropped by the bridge shutting down.
pub async fn run_rtm(config: ChatConfig, events_tx: mpsc::Sender<ChatEvent>) {
    let mut delay = reconnect::INITIAL_DELAY;
    loop {
        match run_rtm_once(&config, &events_tx).await {
            Ok(()) => {
                info!("chat rtm socket closed cleanly");
                delay = reconnect::INITIAL_DELAY;
            }
            Err(e) => {
                error!("chat rtm socket error: {}", e);
            }
        }
        if events_tx.is_closed() {
            return;
        }
        info!("reconnecting to chat rtm socket in {:?}", delay);
        tokio::time::sleep(delay).await;
        delay = reconnect::next_delay(delay);
    }
}

async fn run_rtm_once(config: &ChatConfig, events_tx: &mpsc::Sender<ChatEvent>) -> anyhow::Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(&config.rtm_url).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = msg?;
        let text = match msg {
            WsMessage::Text(t) => t,
            WsMessage::Ping(data) => {
                write.send(WsMessage::Pong(data)).await?;
                continue;
            }
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let Ok(envelope) = serde_json::from_str::<Value>(&text) else {
            warn!("unparseable chat rtm envelope");
            continue;
        };

        if let Some(envelope_id) = envelope.get("envelope_id").and_then(Value::as_str) {
            let ack = json!({ "envelope_id": envelope_id });
            let _ = write.send(WsMessage::Text(ack.to_string())).await;
        }

        if let Some(event) = parse_envelope(&envelope) {
            debug!(?event, "chat rtm event");
            if events_tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn parse_envelope(envelope: &Value) -> Option<ChatEvent> {
    let kind = envelope.get("type").and_then(Value::as_str)?;
    match kind {
        "hello" => Some(ChatEvent::Open),
        "message" => parse_message_event(envelope).map(ChatEvent::Message),
        "presence_change" => {
            let user = envelope.get("user")?.as_str()?.to_string();
            let presence = match envelope.get("presence").and_then(Value::as_str) {
                Some("active") => Presence::Active,
                _ => Presence::Away,
            };
            Some(ChatEvent::PresenceChange { user, presence })
        }
        "user_change" => {
            let u = envelope.get("user")?;
            Some(ChatEvent::UserChange {
                user: ChatUser {
                    id: u.get("id")?.as_str()?.to_string(),
                    name: u.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    presence: Presence::Active,
                    is_bot: u.get("is_bot").and_then(Value::as_bool).unwrap_or(false),
                },
            })
        }
        "error" => Some(ChatEvent::Error(
            envelope.get("error").and_then(Value::as_str).unwrap_or("unknown error").to_string(),
        )),
        _ => None,
    }
}

fn parse_message_event(envelope: &Value) -> Option<ChatMessage> {
    let user = envelope.get("user")?.as_str()?.to_string();
    let channel = envelope.get("channel")?.as_str()?.to_string();
    let text = envelope.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
    let subtype = envelope.get("subtype").and_then(Value::as_str).map(MessageSubtype::from_raw);
    let file = envelope.get("file").map(|f| ChatFile {
        permalink: f.get("permalink").and_then(Value::as_str).unwrap_or_default().to_string(),
        initial_comment: f
            .get("initial_comment")
            .and_then(|c| c.get("comment"))
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
    });

    Some(ChatMessage { user, channel, text, subtype, file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_and_message_and_user_change() {
        assert!(matches!(parse_envelope(&json!({"type": "hello"})), Some(ChatEvent::Open)));

        let msg = parse_envelope(&json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
            "text": "hi",
        }));
        assert!(matches!(msg, Some(ChatEvent::Message(m)) if m.user == "U1" && m.text == "hi"));

        let change = parse_envelope(&json!({
            "type": "user_change",
            "user": {"id": "U1", "name": "alice", "is_bot": false},
        }));
        assert!(matches!(change, Some(ChatEvent::UserChange { user }) if user.name == "alice"));
    }

    #[test]
    fn unknown_envelope_type_is_ignored() {
        assert!(parse_envelope(&json!({"type": "reaction_added"})).is_none());
    }

    #[test]
    fn message_with_file_share_subtype_carries_file() {
        let event = parse_envelope(&json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
            "text": "shared a file",
            "subtype": "file_share",
            "file": {"permalink": "https://example.com/f"},
        }));
        match event {
            Some(ChatEvent::Message(m)) => {
                assert_eq!(m.subtype, Some(MessageSubtype::FileShare));
                assert_eq!(m.file.unwrap().permalink, "https://example.com/f");
            }
            _ => panic!("expected a message event"),
        }
    }
}
