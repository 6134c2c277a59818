//! Key Assassin Protocol: strip wrapper artifacts before splitting
//!
//! The original file bytes are never touched; this only shapes the
//! `compound_body` that gets stored and split.

/// Run the full sanitization pipeline: log-prefix stripping, JSON-envelope
/// unwrapping, then trailing-whitespace collapsing.
pub fn sanitize_body(raw: &str) -> String {
    let unwrapped = unwrap_json_envelope(raw);
    let stripped = strip_log_prefixes(&unwrapped);
    let collapsed = collapse_blank_runs(&stripped);
    collapsed.trim_end().to_string()
}

/// If `raw` parses as a JSON object with exactly one string-valued field,
/// treat that field's value as the real payload. Anything else passes
/// through untouched - this only unwraps that single-payload-field case,
/// not arbitrary JSON documents.
fn unwrap_json_envelope(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return raw.to_string();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) if map.len() == 1 => match map.into_values().next() {
            Some(serde_json::Value::String(payload)) => payload,
            _ => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Strip leading `YYYY-MM-DD HH:MM:SS [LEVEL]` prefixes from each line.
fn strip_log_prefixes(text: &str) -> String {
    text.lines()
        .map(strip_log_prefix_from_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_log_prefix_from_line(line: &str) -> &str {
    let bytes = line.as_bytes();
    // "YYYY-MM-DD HH:MM:SS " is exactly 20 bytes of ASCII digits/punctuation.
    const DATE_TIME_LEN: usize = 19;
    if bytes.len() <= DATE_TIME_LEN + 1 {
        return line;
    }
    if !is_log_timestamp(&line[..DATE_TIME_LEN]) {
        return line;
    }
    let rest = line[DATE_TIME_LEN..].trim_start();
    if !rest.starts_with('[') {
        return line;
    }
    match rest.find(']') {
        Some(close) => rest[close + 1..].trim_start(),
        None => line,
    }
}

fn is_log_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    let expect_digit = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15, 17, 18];
    let expect_sep: [(usize, u8); 5] = [(4, b'-'), (7, b'-'), (10, b' '), (13, b':'), (16, b':')];
    expect_digit.iter().all(|&i| bytes[i].is_ascii_digit())
        && expect_sep.iter().all(|&(i, c)| bytes[i] == c)
}

/// Collapse runs of 3+ newlines (more than two blank lines) down to one
/// blank line.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newline_run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out
}
