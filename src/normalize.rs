//! Social-media text cleanup applied before parsing

use regex::Regex;
use std::sync::LazyLock;

static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\p{Emoji_Modifier}\u{FE0F}\u{200D}\u{20E3}]")
        .expect("invalid emoji regex")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("invalid url regex")
});

// "via @theregister" citations at the end of shared links
static VIA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bvia\s*@\w*").expect("invalid citation regex"));

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

/// Clean a tweet-like text for the parser
///
/// Strips emoji, URLs, "via @user" citations and `@`/`#` markers, maps
/// curly apostrophes and ellipsis characters to ASCII, and turns colons
/// into sentence breaks so a "Title: text" prefix parses as its own
/// sentence.
pub fn normalize(text: &str) -> String {
    let text = text.trim().replace('\u{2019}', "'").replace('\u{2026}', "...");
    let text = EMOJI_RE.replace_all(&text, "");
    let text = URL_RE.replace_all(&text, "");
    let text = VIA_RE.replace_all(&text, "");
    let text = text.replace(':', ".").replace(['@', '#'], "");
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}
