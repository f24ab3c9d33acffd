/// Default number of lines in a snippet when no term is found.
pub const DEFAULT_SNIPPET_LINES: usize = 6;

/// Maximum number of characters in a snippet before truncation.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 400;

/// Return at most `max_chars` characters of `text`.
///
/// Counts characters rather than bytes, so the cut never lands inside a
/// multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Prepend line numbers to each line of text.
///
/// `start_line` is the number to assign to the first line (1-indexed).
pub fn add_line_numbers(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Query words worth looking for in a snippet (longer than two characters).
pub fn snippet_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Extract a snippet around the first line mentioning any of `terms`.
///
/// Returns `(snippet_text, start_line_number)` where start_line_number is
/// 1-indexed. If no term is found, returns the first few lines.
/// Returns `None` if the text is empty.
pub fn extract_snippet(text: &str, terms: &[String]) -> Option<(String, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let match_idx = lines.iter().position(|line| {
        let lower = line.to_lowercase();
        terms.iter().any(|t| lower.contains(t.as_str()))
    });

    let (start, end) = if let Some(idx) = match_idx {
        let start = idx.saturating_sub(2);
        let end = (idx + 3).min(lines.len());
        (start, end)
    } else {
        (0, DEFAULT_SNIPPET_LINES.min(lines.len()))
    };

    let joined = lines[start..end].join("\n");
    let mut snippet = truncate_chars(&joined, DEFAULT_SNIPPET_MAX_CHARS).to_string();
    if snippet.len() < joined.len() {
        snippet.push_str("...");
    }

    Some((snippet, start + 1))
}
