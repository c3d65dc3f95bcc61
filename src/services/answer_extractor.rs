//! Best-effort answer extraction from free-form model output.
//!
//! Extraction order:
//! 1. the last `Final Answer: <value>` line (case-insensitive)
//! 2. the first `\boxed{...}` span anywhere in the text
//! 3. the last non-empty line, if it is at most `MAX_FALLBACK_LINE_CHARS` long

use regex::Regex;
use std::sync::LazyLock;

/// Longest trailing line accepted as an answer when nothing better is found.
pub const MAX_FALLBACK_LINE_CHARS: usize = 120;

static FINAL_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)final\s+answer\s*\**\s*[:：]\s*\**\s*(.*)$").expect("valid final answer regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Pull the final answer out of `text`, or `None` when nothing plausible is found.
pub fn extract_answer(text: &str) -> Option<String> {
    extract_final_answer_line(text)
        .or_else(|| extract_boxed(text))
        .or_else(|| extract_short_last_line(text))
}

/// Canonical form used only as a vote key.
pub fn normalize_answer(answer: &str) -> String {
    let stripped: String = answer
        .chars()
        .filter(|c| !matches!(c, '`' | '*' | '$'))
        .collect::<String>()
        .to_lowercase();
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn extract_final_answer_line(text: &str) -> Option<String> {
    text.lines().rev().find_map(|line| {
        let captures = FINAL_ANSWER.captures(line)?;
        let value = captures.get(1)?.as_str().trim().trim_end_matches('*').trim_end();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn extract_boxed(text: &str) -> Option<String> {
    const OPEN: &str = "\\boxed{";
    let start = text.find(OPEN)? + OPEN.len();

    let mut depth = 1usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let value = text[start..start + offset].trim();
                    return (!value.is_empty()).then(|| value.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn extract_short_last_line(text: &str) -> Option<String> {
    let line = text.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    (line.chars().count() <= MAX_FALLBACK_LINE_CHARS).then(|| line.to_string())
}
