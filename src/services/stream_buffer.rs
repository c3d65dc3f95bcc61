//! Line buffering and sanitizing of streamed model output.

use regex::Regex;
use std::sync::LazyLock;

/// A partial line longer than this is flushed without waiting for a newline.
pub const PARTIAL_LINE_FLUSH_CHARS: usize = 400;

/// Longest preview carried by a progress event.
pub const PREVIEW_CHARS: usize = 160;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-Z\\-_])")
        .expect("valid ansi regex")
});

/// Strip ANSI escape sequences and carriage returns.
pub fn sanitize(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").replace('\r', "")
}

/// Cut `text` to `PREVIEW_CHARS` characters on a single line.
pub fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// Splits a chunk stream into sanitized, non-empty lines.
///
/// The trailing partial line is kept across chunks and flushed once it grows
/// past `flush_at` characters.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    pending: String,
    flush_at: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(PARTIAL_LINE_FLUSH_CHARS)
    }
}

impl LineBuffer {
    pub fn new(flush_at: usize) -> Self {
        Self {
            pending: String::new(),
            flush_at,
        }
    }

    /// Feed a chunk; returns the lines it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            Self::keep(&mut lines, &line);
        }

        if self.pending.chars().count() > self.flush_at {
            let line = std::mem::take(&mut self.pending);
            Self::keep(&mut lines, &line);
        }
        lines
    }

    /// Flush whatever partial line remains.
    pub fn finish(&mut self) -> Option<String> {
        let line = sanitize(std::mem::take(&mut self.pending).trim());
        let line = line.trim();
        (!line.is_empty()).then(|| line.to_string())
    }

    fn keep(lines: &mut Vec<String>, raw: &str) {
        let clean = sanitize(raw);
        let clean = clean.trim();
        if !clean.is_empty() {
            lines.push(clean.to_string());
        }
    }
}

/// Decodes a byte stream as UTF-8 across read boundaries.
///
/// An incomplete trailing sequence is held until the next read; invalid bytes
/// become U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        text
    }
}
