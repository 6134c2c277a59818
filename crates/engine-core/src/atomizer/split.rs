//! Byte-coordinate splitting into molecules
//!
//! All coordinates are recorded against the sanitized `compound_body`.
//! Overlaps are forbidden; adjacent molecules share a boundary byte.

use crate::model::MoleculeType;

const MIN_PROSE_FRAGMENT_BYTES: usize = 40;

/// A single molecule's byte range and resolved type, before content is
/// sliced out of the compound body.
#[derive(Debug, Clone, Copy)]
pub struct MoleculeSpan {
    pub start: usize,
    pub end: usize,
    pub molecule_type: MoleculeType,
}

/// Split `body` into ordered, non-overlapping spans using the strategy
/// appropriate for `hint` (the caller's best guess at the document's
/// overall type).
pub fn split_molecules(body: &str, hint: MoleculeType) -> Vec<MoleculeSpan> {
    if body.is_empty() {
        return Vec::new();
    }

    let mut spans = match hint {
        MoleculeType::Code => split_code(body),
        MoleculeType::Data => split_data(body),
        MoleculeType::Prose => split_prose(body),
    };

    if spans.is_empty() {
        spans.push(MoleculeSpan {
            start: 0,
            end: body.len(),
            molecule_type: hint,
        });
    }

    spans
}

/// Split at sentence terminators `. ! ?` followed by whitespace, merging
/// fragments shorter than `MIN_PROSE_FRAGMENT_BYTES` into the previous one.
fn split_prose(body: &str) -> Vec<MoleculeSpan> {
    let bytes = body.as_bytes();
    let mut raw_spans = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'.' || b == b'!' || b == b'?') && i + 1 < bytes.len() && bytes[i + 1].is_ascii_whitespace() {
            let end = i + 1;
            raw_spans.push((start, end));
            // Skip the single whitespace byte we matched on; the next
            // molecule starts right after it so no byte is double-counted.
            start = end;
            i = end;
            continue;
        }
        i += char_len(bytes, i);
    }

    if start < bytes.len() {
        raw_spans.push((start, bytes.len()));
    }

    merge_short_fragments(raw_spans, body, MoleculeType::Prose)
}

fn merge_short_fragments(
    raw_spans: Vec<(usize, usize)>,
    body: &str,
    molecule_type: MoleculeType,
) -> Vec<MoleculeSpan> {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in raw_spans {
        // Trim leading whitespace from the boundary so a molecule doesn't
        // begin mid-gap, but keep the byte offset alignment with the
        // previous molecule's end.
        if end - start < MIN_PROSE_FRAGMENT_BYTES {
            if let Some(last) = merged.last_mut() {
                last.1 = end;
                continue;
            }
        }
        merged.push((start, end));
    }

    // A trailing short fragment with no predecessor stands alone rather
    // than being dropped - it is still real content.
    merged
        .into_iter()
        .filter(|&(s, e)| s < e && e <= body.len())
        .map(|(start, end)| MoleculeSpan {
            start,
            end,
            molecule_type,
        })
        .collect()
}

fn char_len(bytes: &[u8], i: usize) -> usize {
    let b = bytes[i];
    if b < 0x80 {
        1
    } else if b >> 5 == 0b110 {
        2
    } else if b >> 4 == 0b1110 {
        3
    } else if b >> 3 == 0b11110 {
        4
    } else {
        1
    }
}

/// Split at logical blocks: consecutive lines sharing the same leading
/// indentation, with triple-backtick fenced blocks kept whole as a single
/// code molecule.
fn split_code(body: &str) -> Vec<MoleculeSpan> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    let mut block_start = 0usize;
    let mut current_indent: Option<usize> = None;
    let mut in_fence = false;
    let mut fence_start = 0usize;

    let mut lines = body.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_end_matches('\n');
        let is_fence_marker = trimmed.trim_start().starts_with("```");

        if in_fence {
            offset += line.len();
            if is_fence_marker {
                spans.push(MoleculeSpan {
                    start: fence_start,
                    end: offset,
                    molecule_type: MoleculeType::Code,
                });
                in_fence = false;
                block_start = offset;
                current_indent = None;
            }
            continue;
        }

        if is_fence_marker {
            if block_start < offset {
                spans.push(MoleculeSpan {
                    start: block_start,
                    end: offset,
                    molecule_type: MoleculeType::Code,
                });
            }
            fence_start = offset;
            in_fence = true;
            offset += line.len();
            continue;
        }

        let indent = trimmed.len() - trimmed.trim_start().len();
        let is_blank = trimmed.trim().is_empty();

        match current_indent {
            None if !is_blank => current_indent = Some(indent),
            Some(existing) if !is_blank && existing != indent => {
                spans.push(MoleculeSpan {
                    start: block_start,
                    end: offset,
                    molecule_type: MoleculeType::Code,
                });
                block_start = offset;
                current_indent = Some(indent);
            }
            _ => {}
        }

        offset += line.len();
    }

    if block_start < offset {
        spans.push(MoleculeSpan {
            start: block_start,
            end: offset,
            molecule_type: MoleculeType::Code,
        });
    }

    spans.into_iter().filter(|s| s.start < s.end).collect()
}

/// Split line-oriented data by line. (Top-level-key splitting for mapping
/// formats is approximated by grouping consecutive indented lines under
/// their preceding unindented key line, which covers YAML's common shape
/// without a full parser.)
fn split_data(body: &str) -> Vec<MoleculeSpan> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    let mut block_start = 0usize;
    let mut lines = body.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_end_matches('\n');
        let starts_new_key = !trimmed.starts_with(char::is_whitespace) && !trimmed.trim().is_empty();

        if starts_new_key && offset > block_start {
            spans.push(MoleculeSpan {
                start: block_start,
                end: offset,
                molecule_type: MoleculeType::Data,
            });
            block_start = offset;
        }

        offset += line.len();
    }

    if block_start < offset {
        spans.push(MoleculeSpan {
            start: block_start,
            end: offset,
            molecule_type: MoleculeType::Data,
        });
    }

    spans.into_iter().filter(|s| s.start < s.end).collect()
}
