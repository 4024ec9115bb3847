use lazy_static::lazy_static;
use std::collections::HashMap;

/// Static shortcode -> unicode table, read-only for the lifetime of the
/// process. Covers the shortcodes most commonly seen in practice; an
/// unmatched shortcode is left as its literal `:name:` form by
/// [`crate::text_transform::parse_text`].
const EMOJI_PAIRS: &[(&str, &str)] = &[
    ("+1", "\u{1F44D}"),
    ("-1", "\u{1F44E}"),
    ("thumbsup", "\u{1F44D}"),
    ("thumbsdown", "\u{1F44E}"),
    ("smile", "\u{1F604}"),
    ("smiley", "\u{1F603}"),
    ("grin", "\u{1F601}"),
    ("laughing", "\u{1F606}"),
    ("wink", "\u{1F609}"),
    ("heart", "\u{2764}\u{FE0F}"),
    ("broken_heart", "\u{1F494}"),
    ("tada", "\u{1F389}"),
    ("fire", "\u{1F525}"),
    ("eyes", "\u{1F440}"),
    ("thinking_face", "\u{1F914}"),
    ("joy", "\u{1F602}"),
    ("cry", "\u{1F622}"),
    ("sob", "\u{1F62D}"),
    ("wave", "\u{1F44B}"),
    ("clap", "\u{1F44F}"),
    ("pray", "\u{1F64F}"),
    ("rocket", "\u{1F680}"),
    ("100", "\u{1F4AF}"),
    ("white_check_mark", "\u{2705}"),
    ("x", "\u{274C}"),
    ("warning", "\u{26A0}\u{FE0F}"),
    ("eggplant", "\u{1F346}"),
    ("beers", "\u{1F37B}"),
    ("coffee", "\u{2615}"),
    ("shrug", "\u{1F937}"),
    ("tada2", "\u{1F38A}"),
];

lazy_static! {
    static ref EMOJI_TABLE: HashMap<&'static str, &'static str> =
        EMOJI_PAIRS.iter().copied().collect();
}

/// Look up a shortcode (without surrounding colons). Returns `None` for
/// anything not in the static table.
pub fn lookup(shortcode: &str) -> Option<&'static str> {
    EMOJI_TABLE.get(shortcode).copied()
}
