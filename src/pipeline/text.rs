//! Text preparation: deterministic cleanup of extracted PDF text, then
//! fixed-size chunking.
//!
//! ## Rule Order
//!
//! Page markers must go before blank lines are collapsed (a marker often
//! sits alone between two blank lines), and lone page numbers must be
//! removed while line structure still exists, i.e. before the final
//! whitespace collapse turns the document into a single line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to raw extracted text.
///
/// Rules (applied in order):
/// 1. Remove "Page N of M" markers
/// 2. Collapse runs of 2+ newlines to one
/// 3. Remove lines that contain only a number (page numbers)
/// 4. Replace each run of non-ASCII characters with one space
/// 5. Collapse all whitespace runs to one space
/// 6. Trim
///
/// The sequence repeats until the text stops changing, which makes
/// `clean(clean(t)) == clean(t)` hold even when removing a marker splices
/// a new one together. No rule ever lengthens the text, so this terminates.
pub fn clean(input: &str) -> String {
    let mut current = clean_pass(input);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(input: &str) -> String {
    let s = remove_page_markers(input);
    let s = collapse_newlines(&s);
    let s = remove_number_lines(&s);
    let s = replace_non_ascii(&s);
    let s = collapse_whitespace(&s);
    s.trim().to_string()
}

// ── Rule 1: Page markers ─────────────────────────────────────────────────────

static RE_PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Page\s*\d+\s*of\s*\d+").expect("valid regex"));

fn remove_page_markers(input: &str) -> String {
    RE_PAGE_MARKER.replace_all(input, "").into_owned()
}

// ── Rule 2: Blank lines ──────────────────────────────────────────────────────

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

fn collapse_newlines(input: &str) -> String {
    RE_NEWLINES.replace_all(input, "\n").into_owned()
}

// ── Rule 3: Lone page numbers ────────────────────────────────────────────────

static RE_NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+\s*$").expect("valid regex"));

fn remove_number_lines(input: &str) -> String {
    RE_NUMBER_LINE.replace_all(input, "").into_owned()
}

// ── Rule 4: Non-ASCII ────────────────────────────────────────────────────────

static RE_NON_ASCII: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"));

fn replace_non_ascii(input: &str) -> String {
    RE_NON_ASCII.replace_all(input, " ").into_owned()
}

// ── Rule 5: Whitespace ───────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").into_owned()
}

// ── Chunking ─────────────────────────────────────────────────────────────────

/// Split `text` into consecutive slices of `size` characters.
///
/// The last slice may be shorter; empty input gives no chunks. Slices are
/// cut on character boundaries. A `size` of 0 is treated as 1.
pub fn chunk(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}
