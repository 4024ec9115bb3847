//! A single IRC connection, used both by [`crate::bridge_bot::BridgeBot`]
//! and by every per-user shadow client. Adapted from the reference
//! implementation's `IrcClient`/`run_with_reconnect`, generalized to carry
//! an arbitrary nick/username and to report events to a shared bridge
//! channel instead of a single plugin channel.

use crate::config::IrcConfig;
use crate::nick_policy;
use crate::reconnect;
use crate::types::IrcEvent;
use futures::StreamExt;
use irc::client::prelude::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Identifies which logical connection produced an [`IrcEvent`], so the
/// bridge can route it back to the right shadow (or the bot).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnOwner {
    Bot,
    Shadow(String),
}

/// Outbound actions the bridge can ask a connection to perform.
#[derive(Debug, Clone)]
pub enum IrcCommand {
    Join(String),
    Say { channel: String, text: String },
    Action { channel: String, text: String },
    Notice { channel: String, text: String },
    Nick(String),
    Raw(Vec<String>),
    Disconnect(String),
}

pub struct ConnHandle {
    pub cmd_tx: mpsc::Sender<IrcCommand>,
    pub task: tokio::task::JoinHandle<()>,
}

/// Spawn a managed IRC connection that reconnects with exponential backoff
/// (1s initial, doubling, capped at 5 minutes) until told to disconnect.
pub fn spawn(
    owner: ConnOwner,
    server: IrcConfig,
    nickname: String,
    username: String,
    autojoin: Vec<String>,
    retry_count: u32,
    flood_delay_ms: u64,
    events_tx: mpsc::Sender<(ConnOwner, IrcEvent)>,
) -> ConnHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<IrcCommand>(256);

    let task = tokio::spawn(async move {
        let mut delay = reconnect::INITIAL_DELAY;

        loop {
            let irc_config = Config {
                nickname: Some(nickname.clone()),
                username: Some(username.clone()),
                server: Some(server.server.clone()),
                port: Some(server.port),
                use_tls: Some(server.use_tls),
                channels: vec![],
                dangerously_accept_invalid_certs: Some(true),
                ..Default::default()
            };

            let client = match Client::from_config(irc_config).await {
                Ok(client) => client,
                Err(e) => {
                    error!(?owner, "failed to build IRC client: {}", e);
                    tokio::time::sleep(delay).await;
                    delay = reconnect::next_delay(delay);
                    continue;
                }
            };

            if let Err(e) = client.identify() {
                error!(?owner, "failed to identify: {}", e);
                tokio::time::sleep(delay).await;
                delay = reconnect::next_delay(delay);
                continue;
            }

            delay = reconnect::INITIAL_DELAY;
            info!(?owner, "connected to {}:{}", server.server, server.port);

            let mut retries_left = retry_count;
            let disconnected = run_one_connection(
                &owner,
                client,
                &autojoin,
                flood_delay_ms,
                &mut cmd_rx,
                &events_tx,
            )
            .await;

            if disconnected.is_abort() {
                let _ = events_tx.send((owner.clone(), IrcEvent::Abort)).await;
                return;
            }

            retries_left = retries_left.saturating_sub(1);
            if retries_left == 0 {
                warn!(?owner, "retry budget exhausted, giving up");
                let _ = events_tx.send((owner.clone(), IrcEvent::Abort)).await;
                return;
            }

            info!(?owner, "reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
            delay = reconnect::next_delay(delay);
        }
    });

    ConnHandle { cmd_tx, task }
}

enum Disconnected {
    StreamClosed,
    CommandChannelClosed,
    ExplicitQuit,
}

impl Disconnected {
    fn is_abort(&self) -> bool {
        matches!(self, Disconnected::StreamClosed)
    }
}

async fn run_one_connection(
    owner: &ConnOwner,
    mut client: Client,
    autojoin: &[String],
    flood_delay_ms: u64,
    cmd_rx: &mut mpsc::Receiver<IrcCommand>,
    events_tx: &mpsc::Sender<(ConnOwner, IrcEvent)>,
) -> Disconnected {
    let mut stream = match client.stream() {
        Ok(s) => s,
        Err(e) => {
            error!(?owner, "failed to open stream: {}", e);
            return Disconnected::StreamClosed;
        }
    };

    loop {
        tokio::select! {
            result = stream.next() => {
                match result {
                    Some(Ok(message)) => {
                        handle_irc_message(owner, &client, message, autojoin, events_tx).await;
                    }
                    Some(Err(e)) => {
                        error!(?owner, "connection error: {}", e);
                        return Disconnected::StreamClosed;
                    }
                    None => {
                        info!(?owner, "stream closed by server");
                        return Disconnected::StreamClosed;
                    }
                }
            }
            maybe_cmd = cmd_rx.recv() => {
                match maybe_cmd {
                    Some(IrcCommand::Disconnect(reason)) => {
                        let _ = client.send_quit(&reason);
                        return Disconnected::ExplicitQuit;
                    }
                    Some(cmd) => {
                        apply_command(&client, cmd).await;
                        if flood_delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(flood_delay_ms)).await;
                        }
                    }
                    None => return Disconnected::CommandChannelClosed,
                }
            }
        }
    }
}

async fn apply_command(client: &Client, cmd: IrcCommand) {
    let result = match cmd {
        IrcCommand::Join(channel) => client.send_join(&channel),
        IrcCommand::Say { channel, text } => client.send_privmsg(&channel, &text),
        IrcCommand::Action { channel, text } => client.send_action(&channel, &text),
        IrcCommand::Notice { channel, text } => client.send_notice(&channel, &text),
        IrcCommand::Nick(nick) => client.send(Command::NICK(nick)),
        IrcCommand::Raw(parts) => send_raw(client, parts),
        IrcCommand::Disconnect(_) => unreachable!("handled by caller"),
    };
    if let Err(e) = result {
        warn!("failed to apply IRC command: {}", e);
    }
}

fn send_raw(client: &Client, parts: Vec<String>) -> irc::error::Result<()> {
    if parts.is_empty() {
        return Ok(());
    }
    client.send(Command::Raw(parts[0].clone(), parts[1..].to_vec()))
}

async fn handle_irc_message(
    owner: &ConnOwner,
    client: &Client,
    message: irc::proto::Message,
    autojoin: &[String],
    events_tx: &mpsc::Sender<(ConnOwner, IrcEvent)>,
) {
    let prefix_nick = |msg: &irc::proto::Message| match &msg.prefix {
        Some(Prefix::Nickname(nick, _, _)) => Some(nick.clone()),
        _ => None,
    };

    match &message.command {
        Command::PRIVMSG(target, text) => {
            if let Some(from) = prefix_nick(&message) {
                let _ = events_tx
                    .send((
                        owner.clone(),
                        IrcEvent::Message { from, to: target.clone(), text: text.clone() },
                    ))
                    .await;
            }
        }
        Command::NOTICE(target, text) => {
            if let Some(from) = prefix_nick(&message) {
                let _ = events_tx
                    .send((owner.clone(), IrcEvent::Notice { from, to: target.clone(), text: text.clone() }))
                    .await;
            }
        }
        Command::INVITE(_nick, channel) => {
            if let Some(from) = prefix_nick(&message) {
                let _ = events_tx.send((owner.clone(), IrcEvent::Invite { from, channel: channel.clone() })).await;
            }
        }
        Command::KICK(channel, nick, reason) => {
            let by = prefix_nick(&message).unwrap_or_else(|| "unknown".to_string());
            let _ = events_tx
                .send((
                    owner.clone(),
                    IrcEvent::Kick {
                        channel: channel.clone(),
                        nick: nick.clone(),
                        by,
                        reason: reason.clone().unwrap_or_default(),
                    },
                ))
                .await;
        }
        Command::JOIN(channel, _, _) => {
            if let Some(nick) = prefix_nick(&message) {
                let _ = events_tx.send((owner.clone(), IrcEvent::Join { channel: channel.clone(), nick })).await;
            }
        }
        Command::PART(channel, _) => {
            if let Some(nick) = prefix_nick(&message) {
                let _ = events_tx.send((owner.clone(), IrcEvent::Part { channel: channel.clone(), nick })).await;
            }
        }
        Command::QUIT(quit_msg) => {
            if let Some(nick) = prefix_nick(&message) {
                let _ = events_tx
                    .send((owner.clone(), IrcEvent::Quit { nick, message: quit_msg.clone().unwrap_or_default() }))
                    .await;
            }
        }
        Command::Response(Response::RPL_ENDOFNAMES, args) => {
            if let Some(channel) = args.get(1) {
                let _ = events_tx.send((owner.clone(), IrcEvent::Names { channel: channel.clone() })).await;
            }
        }
        Command::Response(Response::RPL_WELCOME, _) => {
            debug!(?owner, "registered as {}", client.current_nickname());
            for channel in autojoin {
                if let Err(e) = client.send_join(channel) {
                    error!(?owner, "failed to join {}: {}", channel, e);
                }
            }
            let _ = events_tx.send((owner.clone(), IrcEvent::Registered)).await;
        }
        Command::Response(Response::ERR_ERRONEOUSNICKNAME, _) => {
            let _ = events_tx
                .send((owner.clone(), IrcEvent::Error { raw_command: "432".to_string() }))
                .await;
        }
        Command::Response(Response::ERR_NICKNAMEINUSE, _) => {
            let alt = format!("{}_", client.current_nickname());
            let _ = client.send(Command::NICK(alt));
        }
        _ => {}
    }
}

/// Nick the server would reject outright under NickPolicy (§4.2) rules,
/// used defensively before attempting a NICK change.
pub fn is_policy_compliant(nick: &str) -> bool {
    nick.chars().count() <= nick_policy::SERVER_NICKLEN && !nick.is_empty()
}
