//! Playback timestamps for content items.
//!
//! Speech engines report no timing, so item offsets are reconstructed from
//! group durations, the cue length and the playback tempo, then refined by
//! where the item's title keywords first appear in the segment text.

use crate::episode::{ContentItem, TextSegment, TimestampEntry, TimestampMap};
use std::collections::BTreeMap;

/// Keywords taken from a title
pub const MAX_KEYWORDS: usize = 3;

/// Shortest word considered significant
pub const MIN_KEYWORD_CHARS: usize = 4;

const STOPWORDS: &[&str] = &[
    "about", "after", "against", "also", "among", "based", "been", "before", "being", "between",
    "both", "could", "does", "down", "during", "each", "from", "have", "here", "into", "just",
    "like", "made", "make", "many", "more", "most", "much", "must", "news", "only", "other",
    "over", "same", "says", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "upon", "using",
    "very", "what", "when", "where", "which", "while", "will", "with", "within", "without",
    "would", "your",
];

/// Tempo-adjusted start offset of every group.
///
/// The running raw counter advances by each group's raw duration plus the
/// raw cue duration for every group but the last.
#[must_use]
pub fn group_start_offsets(raw_durations: &[f64], cue_raw_secs: f64, tempo: f64) -> Vec<f64> {
    let mut counter = 0.0;
    raw_durations
        .iter()
        .map(|raw| {
            let start = counter / tempo;
            counter += raw + cue_raw_secs;
            start
        })
        .collect()
}

/// Significant lowercase words of `title`, in order, without duplicates
#[must_use]
pub fn title_keywords(title: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in title
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        if word.chars().count() < MIN_KEYWORD_CHARS
            || STOPWORDS.contains(&word.as_str())
            || keywords.contains(&word)
        {
            continue;
        }
        keywords.push(word);
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// Fraction of `text` preceding the earliest keyword occurrence, compared
/// case-insensitively. `None` when no keyword occurs.
#[must_use]
pub fn intra_segment_fraction(text: &str, keywords: &[String]) -> Option<f64> {
    let haystack = text.to_lowercase();
    let total = haystack.chars().count();
    if total == 0 {
        return None;
    }

    let earliest = keywords
        .iter()
        .filter(|k| !k.is_empty())
        .filter_map(|k| haystack.find(k.as_str()))
        .min()?;
    let chars_before = haystack[..earliest].chars().count();
    Some(chars_before as f64 / total as f64)
}

/// Inputs describing the assembled stream
#[derive(Debug, Clone, Copy)]
pub struct StreamLayout<'a> {
    /// Every raw segment, including empty ones
    pub segments: &'a [TextSegment],
    /// Raw segment index to group index
    pub segment_to_group: &'a BTreeMap<usize, usize>,
    /// Raw duration of each group, in group order
    pub group_raw_durations: &'a [f64],
    /// Raw cue duration
    pub cue_raw_secs: f64,
    /// Playback tempo multiplier
    pub tempo: f64,
}

/// Reconstruct a timestamp for every item.
///
/// Items whose segment produced no group are reported with no timestamp.
/// Every other offset lies within its group's playback window.
#[must_use]
pub fn reconstruct(layout: &StreamLayout<'_>, items: &[ContentItem]) -> TimestampMap {
    let tempo = if layout.tempo > 0.0 { layout.tempo } else { 1.0 };
    let group_starts = group_start_offsets(layout.group_raw_durations, layout.cue_raw_secs, tempo);

    let entries = items
        .iter()
        .map(|item| {
            let timestamp = layout
                .segment_to_group
                .get(&item.segment_index)
                .and_then(|&group| {
                    let start = *group_starts.get(group)?;
                    let duration = layout.group_raw_durations.get(group)? / tempo;
                    let fraction = layout
                        .segments
                        .iter()
                        .find(|s| s.index == item.segment_index)
                        .and_then(|s| intra_segment_fraction(&s.text, &title_keywords(&item.title)))
                        .unwrap_or(0.0);
                    Some((start + fraction * duration).clamp(start, start + duration))
                });

            TimestampEntry {
                title: item.title.clone(),
                url: item.url.clone(),
                source: item.source.clone(),
                segment_index: item.segment_index,
                timestamp,
            }
        })
        .collect();

    TimestampMap {
        group_starts,
        items: entries,
    }
}
