//! Text normalization for provider payloads.
//!
//! Providers hand back semi-structured text: MediaWiki HTML, RSS titles, free
//! text forecasts. The functions here turn that into clean candidate snippets
//! and are free of side effects.
use std::sync::OnceLock;

use html_escape::decode_html_entities;
use regex::Regex;

use crate::model::char_count;
use crate::util::strip_control_chars;

/// Candidates shorter than this (in characters) after cleaning are dropped.
pub const MIN_CANDIDATE_CHARS: usize = 5;

/// Sentence terminators used by Japanese prose (full stop, fullwidth period).
const SENTENCE_TERMINATORS: [char; 2] = ['。', '．'];

/// A cleaned snippet, optionally prefixed by a year in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub year: Option<i32>,
    pub text: String,
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<li(?:\s[^>]*)?>(.*?)</li>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

fn footnote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]").expect("valid regex"))
}

fn year_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(\d+)\s*年?\s*[-–—]\s*(.+)$").expect("valid regex"))
}

/// Extract candidate snippets from every `<li>` element in an HTML fragment.
///
/// Each body is cleaned with [`clean_markup`], then split into an optional
/// leading year and the remaining text. Bodies without a `year - text` shape
/// are kept as plain text with no year.
pub fn extract_list_items(html: &str) -> Vec<Candidate> {
    list_item_re()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .filter_map(|body| split_candidate(&clean_markup(body.as_str())))
        .collect()
}

/// Strip tags, decode entities, drop footnote markers and control characters.
pub fn clean_markup(raw: &str) -> String {
    let without_tags = tag_re().replace_all(raw, "");
    let decoded = decode_html_entities(&without_tags).replace('\u{a0}', " ");
    let without_notes = footnote_re().replace_all(&decoded, "");
    strip_control_chars(&without_notes).into_owned()
}

/// Split a cleaned body into a [`Candidate`], or `None` if it is too short.
pub fn split_candidate(cleaned: &str) -> Option<Candidate> {
    let cleaned = cleaned.trim();
    let candidate = match year_prefix_re().captures(cleaned) {
        Some(caps) => match caps[1].parse::<i32>() {
            Ok(year) => Candidate {
                year: Some(year),
                text: caps[2].trim().to_string(),
            },
            Err(_) => Candidate {
                year: None,
                text: cleaned.to_string(),
            },
        },
        None => Candidate {
            year: None,
            text: cleaned.to_string(),
        },
    };

    (char_count(&candidate.text) >= MIN_CANDIDATE_CHARS).then_some(candidate)
}

/// True if `text` has between `min` and `max` characters, inclusive.
pub fn within_chars(text: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&char_count(text))
}

/// Remove every whitespace character, including newlines and ideographic spaces.
///
/// Forecast prose is Japanese, where whitespace is layout only.
pub fn compact_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split text on sentence terminators, dropping empty fragments.
///
/// The terminators themselves are not included in the returned sentences.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_TERMINATORS)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keep at most `max` characters of `text`.
pub fn take_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
