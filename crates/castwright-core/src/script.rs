//! Script intake: marker splitting and speech cleanup.

use crate::episode::TextSegment;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid regex"));
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").expect("valid regex"));
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*•]|\d+[.)])[ \t]+").expect("valid regex"));
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{1,3}|_{2,}|`+|~~").expect("valid regex"));
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid regex"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Make narration text safe to read aloud.
///
/// Markdown links keep their label, bare URLs are dropped, heading, bullet
/// and emphasis markers are removed, and inline whitespace is collapsed.
/// Paragraph breaks survive as a single blank line.
#[must_use]
pub fn clean_for_speech(text: &str) -> String {
    let text: String = text.nfc().collect();
    let text = text.replace("\r\n", "\n");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = BARE_URL.replace_all(&text, "");
    let text = HEADING.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = INLINE_SPACE.replace_all(&text, " ");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_RUN.replace_all(joined.trim(), "\n\n").into_owned()
}

/// Split a script on `marker` into cleaned segments.
///
/// Every position is kept, including empty ones, so the raw index of a
/// segment matches the index upstream collaborators tagged their items with.
#[must_use]
pub fn split_script(script: &str, marker: &str) -> Vec<TextSegment> {
    script
        .split(marker)
        .enumerate()
        .map(|(index, raw)| TextSegment {
            index,
            text: clean_for_speech(raw),
        })
        .collect()
}
