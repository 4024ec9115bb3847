//! `/`-style (or configurable-prefix) bridge commands typed into a mapped
//! Chat channel (§4.7): `online [channel]`, `topic`, and a help fallback.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMAND_SHAPE: Regex = Regex::new(r"^(\w+)(?:\s+(\w+))?\s*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Online { channel: Option<String> },
    Topic,
    Help,
}

/// Strip a leading command character and parse the remainder. Returns
/// `None` if `text` doesn't start with one of `command_characters`.
pub fn parse(text: &str, command_characters: &[char]) -> Option<BridgeCommand> {
    let first = text.chars().next()?;
    if !command_characters.contains(&first) {
        return None;
    }
    let rest = &text[first.len_utf8()..];
    let caps = COMMAND_SHAPE.captures(rest.trim_start())?;
    let verb = caps.get(1)?.as_str();
    let arg = caps.get(2).map(|m| m.as_str().to_string());

    Some(match verb {
        "online" => BridgeCommand::Online { channel: arg },
        "topic" => BridgeCommand::Topic,
        _ => BridgeCommand::Help,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHARS: &[char] = &['/', '!'];

    #[test]
    fn parses_online_with_and_without_channel() {
        assert_eq!(parse("/online", CHARS), Some(BridgeCommand::Online { channel: None }));
        assert_eq!(
            parse("/online general", CHARS),
            Some(BridgeCommand::Online { channel: Some("general".to_string()) })
        );
    }

    #[test]
    fn parses_topic() {
        assert_eq!(parse("!topic", CHARS), Some(BridgeCommand::Topic));
    }

    #[test]
    fn unknown_verb_falls_back_to_help() {
        assert_eq!(parse("/frobnicate", CHARS), Some(BridgeCommand::Help));
    }

    #[test]
    fn text_without_command_prefix_is_not_a_command() {
        assert_eq!(parse("just chatting", CHARS), None);
    }

    #[test]
    fn unrecognized_prefix_char_is_not_a_command() {
        assert_eq!(parse("#online", CHARS), None);
    }
}
