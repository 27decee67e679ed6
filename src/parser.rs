//! Split free-text digests into titled bullet sections.
//!
//! A section starts at a short line (3 to 30 characters once trimmed,
//! optionally led by emoji or other symbols) whose very next line starts with
//! the bullet marker `-`. Nothing else marks a title: a short line followed by
//! prose is body text. Every later line that starts with `-` (after trimming)
//! belongs to that section as an entry, until the next title.

use crate::models::Section;
use tracing::debug;

const BULLET: char = '-';
const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 30;

/// Parse `text` into sections, preserving input order.
///
/// Text without any title + bullet pair yields an empty vector. Bullets
/// seen before the first title belong to no section and are dropped.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).copied();

        if is_title_boundary(line, next) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(split_title(line));
            continue;
        }

        let trimmed = line.trim();
        if trimmed.starts_with(BULLET) {
            if let Some(section) = current.as_mut() {
                section.entries.push(trimmed.to_string());
            }
        }
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }

    debug!(count = sections.len(), "Parsed sections");
    sections
}

/// A title candidate of bounded length immediately followed by a bullet line.
fn is_title_boundary(line: &str, next: Option<&str>) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with(BULLET) {
        return false;
    }
    let len = trimmed.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        return false;
    }
    next.is_some_and(|n| n.trim_start().starts_with(BULLET))
}

/// Non-word, non-space symbols: emoji, variation selectors, ZWJ, flags.
fn is_emoji_char(c: char) -> bool {
    !(c.is_alphanumeric() || c == '_' || c.is_whitespace())
}

/// Separate the leading emoji run from the title.
///
/// A line made only of symbols keeps them all as its title, so the title is
/// never empty.
fn split_title(line: &str) -> Section {
    let trimmed = line.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, c)| !is_emoji_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let (emoji, title) = trimmed.split_at(split);
    let title = title.trim();

    if title.is_empty() {
        return Section {
            emoji: String::new(),
            title: trimmed.to_string(),
            entries: Vec::new(),
        };
    }
    Section {
        emoji: emoji.to_string(),
        title: title.to_string(),
        entries: Vec::new(),
    }
}
