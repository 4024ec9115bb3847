//! Bidirectional Chat <-> IRC text transformation (§4.1).

use crate::emoji;
use crate::types::ChatDirectory;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref CHANNEL_BROADCAST: Regex =
        Regex::new(r"<!(channel|group|everyone)>").unwrap();
    static ref CHANNEL_REF: Regex = Regex::new(r"<#([^|>]+)(?:\|([^>]+))?>").unwrap();
    static ref USER_REF: Regex = Regex::new(r"<@([^|>]+)(?:\|([^>]+))?>").unwrap();
    static ref RAW_LINK: Regex = Regex::new(r"<([^!#@|<>][^|>]*)>").unwrap();
    static ref COMMAND_TOKEN: Regex = Regex::new(r"<!([^|>]+)(?:\|([^>]+))?>").unwrap();
    static ref EMOJI_SHORTCODE: Regex = Regex::new(r":([a-zA-Z0-9_+-]+):").unwrap();
    static ref MENTION: Regex = Regex::new(r"@([A-Za-z0-9._-]+)").unwrap();
    static ref RESIDUAL_PIPE: Regex = Regex::new(r"<([^|>]*)\|([^>]*)>").unwrap();
}

/// Chat -> IRC text conversion. `directory` resolves channel/user IDs to
/// names; `slack_name_to_nick` is a snapshot of currently active shadows
/// keyed by their Chat display name, used for mention rewriting (rule 9).
pub fn parse_text(
    text: &str,
    directory: &ChatDirectory,
    slack_name_to_nick: &HashMap<String, String>,
) -> String {
    // 1. Collapse newlines to spaces.
    let mut out = text.replace("\r\n", " ").replace(['\n', '\r'], " ");

    // 2. Decode the three HTML entities.
    out = out.replace("&amp;", "&").replace("&lt;", "<").replace("&gt;", ">");

    // 3. Broadcast tokens.
    out = CHANNEL_BROADCAST.replace_all(&out, "@$1").to_string();

    // 4. Channel references.
    out = CHANNEL_REF
        .replace_all(&out, |caps: &regex::Captures| {
            if let Some(alias) = caps.get(2) {
                alias.as_str().to_string()
            } else {
                let id = &caps[1];
                match directory.channel_name(id) {
                    Some(name) => format!("#{name}"),
                    None => caps[0].to_string(),
                }
            }
        })
        .to_string();

    // 5. User references.
    out = USER_REF
        .replace_all(&out, |caps: &regex::Captures| {
            if let Some(alias) = caps.get(2) {
                format!("@{}", alias.as_str())
            } else {
                let id = &caps[1];
                match directory.user_name(id) {
                    Some(name) => format!("@{name}"),
                    None => caps[0].to_string(),
                }
            }
        })
        .to_string();

    // 6. Raw links without a pipe, not a command token.
    out = RAW_LINK.replace_all(&out, "$1").to_string();

    // 7. Remaining command tokens.
    out = COMMAND_TOKEN
        .replace_all(&out, |caps: &regex::Captures| {
            caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_else(|| caps[1].to_string())
        })
        .to_string();

    // 8. Emoji shortcodes.
    out = EMOJI_SHORTCODE
        .replace_all(&out, |caps: &regex::Captures| {
            let shortcode = &caps[1];
            emoji::lookup(shortcode).map(str::to_string).unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    // 9. @mentions matching a known shadow's Chat display name.
    out = MENTION
        .replace_all(&out, |caps: &regex::Captures| {
            let word = &caps[1];
            match slack_name_to_nick.get(word) {
                Some(nick) => nick.clone(),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    // 10. Final residual `<anything|readable>` pass.
    out = RESIDUAL_PIPE.replace_all(&out, "$2").to_string();

    out
}

/// IRC -> Chat: replace `<nick><suffix>[digit]` tokens with the shadow's
/// Chat display name. `nick_to_slack_name` is keyed by the literal current
/// nick of each shadow.
pub fn replace_usernames(
    text: &str,
    suffix: &str,
    nick_to_slack_name: &HashMap<String, String>,
) -> String {
    let pattern = format!(r"@?(\S+{}\d?)", regex::escape(suffix));
    let re = Regex::new(&pattern).expect("nick-suffix pattern is always valid");

    re.replace_all(text, |caps: &regex::Captures| {
        let token = &caps[1];
        match nick_to_slack_name.get(token) {
            Some(slack_name) => slack_name.clone(),
            None => caps[0].to_string(),
        }
    })
    .to_string()
}

/// Wrap occurrences of every Chat-channel member's display name in a
/// highlight form, as used for IRC->Chat bot/notice relays. `highlight`
/// renders a matched name (e.g. wrapping it in `@` or bold markup); it is
/// an external collaborator per §1.
pub fn map_slack_users(text: &str, member_names: &[&str], highlight: impl Fn(&str) -> String) -> String {
    let mut out = text.to_string();
    for name in member_names {
        if name.is_empty() {
            continue;
        }
        let pattern = format!(r"\b{}\b", regex::escape(name));
        if let Ok(re) = Regex::new(&pattern) {
            out = re.replace_all(&out, |_: &regex::Captures| highlight(name)).to_string();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatChannel, ChatChannelKind, ChatUser, Presence};

    fn directory() -> ChatDirectory {
        let mut dir = ChatDirectory::default();
        dir.upsert_channel(ChatChannel {
            id: "C123".to_string(),
            name: "general".to_string(),
            kind: ChatChannelKind::Channel,
            members: vec![],
        });
        dir.upsert_user(ChatUser {
            id: "U1".to_string(),
            name: "alice".to_string(),
            presence: Presence::Active,
            is_bot: false,
        });
        dir
    }

    #[test]
    fn emoji_scenario() {
        let dir = directory();
        let out = parse_text(":+1: works", &dir, &HashMap::new());
        assert_eq!(out, "\u{1F44D} works");
    }

    #[test]
    fn unknown_emoji_is_left_literal() {
        let dir = directory();
        let out = parse_text(":not_a_real_emoji: hi", &dir, &HashMap::new());
        assert_eq!(out, ":not_a_real_emoji: hi");
    }

    #[test]
    fn broadcast_tokens() {
        let dir = directory();
        assert_eq!(parse_text("<!channel>", &dir, &HashMap::new()), "@channel");
        assert_eq!(parse_text("<!everyone>", &dir, &HashMap::new()), "@everyone");
    }

    #[test]
    fn channel_reference_with_alias_and_without() {
        let dir = directory();
        assert_eq!(parse_text("<#C123|general>", &dir, &HashMap::new()), "#general");
        assert_eq!(parse_text("<#C123>", &dir, &HashMap::new()), "#general");
        assert_eq!(parse_text("<#C999>", &dir, &HashMap::new()), "<#C999>");
    }

    #[test]
    fn user_reference_with_alias_and_without() {
        let dir = directory();
        assert_eq!(parse_text("<@U1|alice>", &dir, &HashMap::new()), "@alice");
        assert_eq!(parse_text("<@U1>", &dir, &HashMap::new()), "@alice");
    }

    #[test]
    fn raw_link_is_unwrapped() {
        let dir = directory();
        assert_eq!(
            parse_text("see <https://example.com>", &dir, &HashMap::new()),
            "see https://example.com"
        );
    }

    #[test]
    fn newlines_collapse_to_single_space() {
        let dir = directory();
        assert_eq!(parse_text("a\nb\r\nc\rd", &dir, &HashMap::new()), "a b c d");
    }

    #[test]
    fn html_entities_decode() {
        let dir = directory();
        assert_eq!(parse_text("a &amp;&lt;&gt; b", &dir, &HashMap::new()), "a &<> b");
    }

    #[test]
    fn mention_rewrite_round_trip() {
        let dir = directory();
        let mut slack_to_nick = HashMap::new();
        slack_to_nick.insert("alice".to_string(), "alice-slack".to_string());

        let irc_text = parse_text("@alice hi", &dir, &slack_to_nick);
        assert_eq!(irc_text, "alice-slack hi");

        let mut nick_to_slack = HashMap::new();
        nick_to_slack.insert("alice-slack".to_string(), "alice".to_string());
        let back = replace_usernames(&irc_text, "-slack", &nick_to_slack);
        assert_eq!(back, "alice hi");
    }

    #[test]
    fn unmatched_mention_is_left_as_is() {
        let dir = directory();
        assert_eq!(parse_text("@nobody here", &dir, &HashMap::new()), "@nobody here");
    }

    #[test]
    fn parse_text_is_idempotent_when_no_further_tokens() {
        let dir = directory();
        let once = parse_text(":+1: <!channel> plain text", &dir, &HashMap::new());
        let twice = parse_text(&once, &dir, &HashMap::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn residual_pipe_token_falls_back_to_label() {
        let dir = directory();
        assert_eq!(parse_text("<weirdid|label>", &dir, &HashMap::new()), "label");
    }

    #[test]
    fn map_slack_users_wraps_member_names() {
        let out = map_slack_users("hey alice, see bob", &["alice", "bob"], |n| format!("*{n}*"));
        assert_eq!(out, "hey *alice*, see *bob*");
    }
}
