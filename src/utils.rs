//! Small string helpers shared across modules.

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped characters appended. Cuts on character boundaries, so
/// Cyrillic or emoji responses never panic.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => {
            let dropped = s[cut..].chars().count();
            format!("{}…(+{} chars)", &s[..cut], dropped)
        }
    }
}

/// Topics with surrounding whitespace removed, empty entries dropped and
/// repeats (ignoring case) removed, in first-seen order.
pub fn clean_topics(topics: &[String]) -> Vec<String> {
    use itertools::Itertools;

    topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .unique_by(|t| t.to_lowercase())
        .map(str::to_string)
        .collect()
}
