//! Post-processing: deterministic cleanup of extracted text and completions.
//!
//! Models occasionally wrap the whole answer in a ```markdown fence, use
//! CRLF line endings, or pad the answer with blank lines. The negotiation
//! letter sometimes starts with a `Subject:` line even though the prompt asks
//! for the body only. These rules fix such quirks without touching content,
//! so the prompts can stay about *what* to write.
//!
//! Extracted PDF text gets a lighter pass: line endings, invisible Unicode,
//! and a character cap before it is placed into a prompt.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fences are stripped because the fence
//! pattern expects `\n`; the subject line is stripped after trimming so a
//! leading blank line cannot hide it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean an analysis completion.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer markdown fences
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading and trailing blank space
pub fn clean_completion(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Clean a negotiation-letter completion: [`clean_completion`] plus removal
/// of a leading subject line.
pub fn clean_letter(input: &str) -> String {
    let s = clean_completion(input);
    strip_subject_line(&s).trim().to_string()
}

/// Normalise text extracted from the PDF before it goes into a prompt.
pub fn clean_extracted_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s)
}

/// Cut `input` to at most `max_chars` characters.
///
/// Returns the (possibly shortened) text and whether anything was removed.
/// Cuts on a character boundary, never inside a UTF-8 sequence.
pub fn truncate_chars(input: &str, max_chars: usize) -> (&str, bool) {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&input[..byte_idx], true),
        None => (input, false),
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\n(.*)\n```\s*$")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{4,}").unwrap_or_else(|e| unreachable!("static regex: {e}")));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Letter rule: strip a leading subject line ────────────────────────────────

static RE_SUBJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\**\s*(subject|re|assunto)\s*:[^\n]*\n+")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

fn strip_subject_line(input: &str) -> String {
    RE_SUBJECT_LINE.replace(input, "").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
