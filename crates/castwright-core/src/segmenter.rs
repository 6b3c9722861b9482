//! Text segmentation for synthesis.
//!
//! [`chunk_text`] packs text into bounded chunks, preferring paragraph breaks,
//! then the sentence end nearest the bound, then the last word break, and
//! hard-cutting only a single token longer than the bound. [`split_in_two`]
//! bisects a chunk whose encoded audio came out too large.
//!
//! All lengths are counted in `char`s so CJK and other multi-byte scripts
//! are bounded the same way as ASCII.

/// Half-width of the window searched around the midpoint when bisecting
pub const BISECT_WINDOW_CHARS: usize = 600;

/// Whether `c` ends a sentence. Full-width marks need no following space.
#[must_use]
pub fn is_sentence_end(c: char) -> bool {
    is_ascii_sentence_end(c) || is_wide_sentence_end(c)
}

fn is_ascii_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_wide_sentence_end(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '｡' | '।' | '॥' | '؟' | '։' | '።')
}

/// Whether `c` is a sentence or clause boundary usable as a bisection point
#[must_use]
pub fn is_clause_break(c: char) -> bool {
    is_sentence_end(c) || matches!(c, '\n' | ';' | '；' | ',' | '，' | '、' | ':' | '：' | '،')
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Lines are treated as paragraphs and packed together while they fit. A
/// paragraph that does not fit on its own is cut at the sentence end closest
/// to the bound, falling back to the last whitespace, and finally to a hard
/// cut when a single token is longer than the bound. Chunks are trimmed; the
/// non-whitespace content of the input is preserved in order.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_chars = line.chars().count();

        let joined = if buf.is_empty() { line_chars } else { buf_chars + 1 + line_chars };
        if joined <= max_chars {
            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(line);
            buf_chars = joined;
            continue;
        }

        if !buf.is_empty() {
            chunks.push(std::mem::take(&mut buf));
        }

        if line_chars <= max_chars {
            buf.push_str(line);
            buf_chars = line_chars;
            continue;
        }

        let mut pieces = split_long(line, max_chars);
        // The tail of a long paragraph can still absorb the next short one.
        if let Some(last) = pieces.pop() {
            chunks.extend(pieces);
            buf_chars = last.chars().count();
            buf = last;
        }
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

/// Cut a single paragraph longer than `max_chars` into bounded pieces.
fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = paragraph.trim();

    loop {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            break;
        };
        let window = &rest[..limit];
        let cut = sentence_cut(rest, window)
            .or_else(|| word_cut(window))
            .unwrap_or(limit);

        let head = rest[..cut].trim();
        if !head.is_empty() {
            pieces.push(head.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Byte offset just after the last sentence end inside `window`.
///
/// ASCII marks only count when followed by whitespace or the end of the
/// paragraph, so decimals and abbreviations inside words are not cut.
fn sentence_cut(rest: &str, window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|&(i, c)| {
            if is_wide_sentence_end(c) {
                return true;
            }
            if !is_ascii_sentence_end(c) {
                return false;
            }
            let after = i + c.len_utf8();
            rest[after..].chars().next().map_or(true, char::is_whitespace)
        })
        .last()
        .map(|(i, c)| i + c.len_utf8())
}

/// Byte offset of the last whitespace inside `window`, if it is not leading.
fn word_cut(window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|&(i, c)| i > 0 && c.is_whitespace())
        .last()
        .map(|(i, _)| i)
}

/// Byte offset at which to bisect `text`.
///
/// Searches `min(600, n / 3)` characters either side of the midpoint for the
/// clause break nearest to it and cuts just after it; without one, cuts at
/// the midpoint.
#[must_use]
pub fn pick_split_point(text: &str) -> usize {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    if n < 2 {
        return text.len();
    }

    let mid = n / 2;
    let window = BISECT_WINDOW_CHARS.min(n / 3);
    let left = mid.saturating_sub(window).max(1);
    let right = (mid + window).min(n - 1);

    let best = (left..right)
        .filter(|&i| is_clause_break(chars[i].1))
        .min_by_key(|&i| i.abs_diff(mid));

    let cut = best.map_or(mid, |i| (i + 1).min(n - 1));
    chars[cut].0
}

/// Bisect `text` near its middle. Both halves are trimmed.
///
/// When the preferred cut leaves one side blank the text is cut exactly at
/// its character midpoint instead. For inputs of two or more characters each
/// half is strictly shorter than the input.
#[must_use]
pub fn split_in_two(text: &str) -> (String, String) {
    let cut = pick_split_point(text);
    let (a, b) = (text[..cut].trim(), text[cut..].trim());
    if !a.is_empty() && !b.is_empty() {
        return (a.to_string(), b.to_string());
    }

    let n = text.chars().count();
    let mid = text
        .char_indices()
        .nth(n / 2)
        .map_or(text.len(), |(i, _)| i);
    (text[..mid].trim().to_string(), text[mid..].trim().to_string())
}
