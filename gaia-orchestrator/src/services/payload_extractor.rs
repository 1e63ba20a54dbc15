//! Wiki payload extraction from free-form text
//!
//! Agents hand us JSON embedded in task descriptions that may be rich text,
//! HTML, or markdown. Extraction is an ordered chain of pure strategies; the
//! first that yields a JSON object containing `pages` wins:
//!
//! 1. Fenced code block (```` ```json ```` or unlabeled)
//! 2. Direct parse of the whole text
//! 3. Substring from the first `{` to the last `}`
//!
//! Each strategy is tried on the raw text, then on a cleaned variant (markup
//! stripped, entities decoded, typographic quotes normalized). Every parse
//! attempt falls back to a repaired candidate (see [`repair_json`]).

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extraction failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no valid wiki JSON found")]
    NoPayload,
}

/// Text variant a strategy ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextVariant {
    Raw,
    Cleaned,
}

/// Extraction strategy, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FencedBlock,
    DirectParse,
    BracketSubstring,
}

const STRATEGIES: [Strategy; 3] = [
    Strategy::FencedBlock,
    Strategy::DirectParse,
    Strategy::BracketSubstring,
];

/// A successful extraction and how it was found
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub strategy: Strategy,
    pub variant: TextVariant,
}

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)```").expect("valid fence pattern")
});

/// Extract a wiki payload from one text
pub fn extract_wiki_json(text: &str) -> Result<Extracted, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::NoPayload);
    }

    let cleaned = clean_rich_text(text);
    let variants = [(TextVariant::Raw, text), (TextVariant::Cleaned, cleaned.as_str())];

    for strategy in STRATEGIES {
        for (variant, candidate) in variants {
            if let Some(value) = apply_strategy(strategy, candidate) {
                debug!(?strategy, ?variant, "Wiki JSON extracted");
                return Ok(Extracted {
                    value,
                    strategy,
                    variant,
                });
            }
        }
    }

    Err(ExtractError::NoPayload)
}

/// Try labelled candidate texts in order; the first extraction wins
pub fn extract_from_candidates<'a, I>(candidates: I) -> Result<(&'a str, Extracted), ExtractError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (label, text) in candidates {
        if text.trim().is_empty() {
            continue;
        }
        debug!(field = label, chars = text.chars().count(), "Scanning candidate text");
        if let Ok(extracted) = extract_wiki_json(text) {
            info!(field = label, strategy = ?extracted.strategy, "Parsed wiki JSON from candidate");
            return Ok((label, extracted));
        }
    }
    warn!("No wiki JSON found in any candidate text");
    Err(ExtractError::NoPayload)
}

fn apply_strategy(strategy: Strategy, text: &str) -> Option<Value> {
    match strategy {
        Strategy::FencedBlock => from_fenced_blocks(text),
        Strategy::DirectParse => parse_wiki_object(text.trim()),
        Strategy::BracketSubstring => bracket_substring(text).and_then(parse_wiki_object),
    }
}

fn from_fenced_blocks(text: &str) -> Option<Value> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter(|caps| {
            let tag = caps.get(1).map_or("", |m| m.as_str());
            tag.is_empty() || tag.eq_ignore_ascii_case("json")
        })
        .filter_map(|caps| caps.get(2))
        .map(|body| body.as_str().trim())
        .filter(|body| !body.is_empty())
        .find_map(parse_wiki_object)
}

fn bracket_substring(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse `candidate` (or its repaired form) into an object with `pages`
fn parse_wiki_object(candidate: &str) -> Option<Value> {
    if candidate.is_empty() {
        return None;
    }
    let parsed = serde_json::from_str::<Value>(candidate).ok().or_else(|| {
        let repaired = repair_json(candidate);
        if repaired == candidate {
            return None;
        }
        let value = serde_json::from_str::<Value>(&repaired).ok()?;
        debug!("Parsed wiki JSON after repair");
        Some(value)
    })?;

    match &parsed {
        Value::Object(map) if map.contains_key("pages") => Some(parsed),
        _ => None,
    }
}

/// Strip rich-text artifacts so embedded JSON becomes parseable.
///
/// Markup tags are dropped and entities decoded by parsing the text as an
/// HTML fragment; typographic quotes and invisible spaces are then mapped to
/// their ASCII equivalents.
pub fn clean_rich_text(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    let plain: String = fragment.root_element().text().collect();

    plain
        .chars()
        .filter_map(|c| match c {
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' | '\u{2033}' => Some('"'),
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}' | '\u{2032}' => Some('\''),
            '\u{00a0}' | '\u{2007}' | '\u{202f}' => Some(' '),
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' => None,
            other => Some(other),
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Repair common corruptions of agent-written JSON.
///
/// - trailing commas before `}` or `]`
/// - raw newlines, carriage returns and tabs inside strings (escaped);
///   other control characters inside strings are dropped
/// - invalid backslash escapes inside strings (`\P` becomes `\\P`)
///
/// The scan tracks string boundaries, so commas and braces inside string
/// literals are never touched.
pub fn repair_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\\' => match chars.peek().copied() {
                    Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                        out.push('\\');
                        out.push(next);
                        chars.next();
                    }
                    _ => out.push_str("\\\\"),
                },
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => {}
                c => out.push(c),
            }
        } else {
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                ',' => {
                    let next_significant = chars.clone().find(|ch| !ch.is_whitespace());
                    if !matches!(next_significant, Some('}') | Some(']')) {
                        out.push(c);
                    }
                }
                c => out.push(c),
            }
        }
    }

    out
}
