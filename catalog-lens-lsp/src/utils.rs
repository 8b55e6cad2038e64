//! Common utility functions used across the LSP implementation.

use chrono::{DateTime, Utc};

/// Length of a string in UTF-16 code units (the LSP column unit).
pub fn utf16_len(s: &str) -> u32 {
    s.encode_utf16().count() as u32
}

/// Convert a byte index inside `line` to a UTF-16 column.
///
/// Indices past the end or inside a multi-byte character are clamped to
/// the previous character boundary.
pub fn utf16_column(line: &str, byte_idx: usize) -> u32 {
    let mut idx = byte_idx.min(line.len());
    while !line.is_char_boundary(idx) {
        idx -= 1;
    }
    utf16_len(&line[..idx])
}

/// Convert a UTF-16 column inside `line` back to a byte index.
///
/// Returns `None` for columns past the end or inside a surrogate pair.
pub fn byte_index(line: &str, column: u32) -> Option<usize> {
    let mut units = 0;
    for (idx, c) in line.char_indices() {
        if units == column {
            return Some(idx);
        }
        if units > column {
            return None;
        }
        units += c.len_utf16() as u32;
    }
    (units == column).then_some(line.len())
}

/// Convert a byte offset in `text` to a `(line, column)` pair.
///
/// The line is 0-based, the column is in UTF-16 code units.
pub fn offset_to_line_column(text: &str, offset: usize) -> (u32, u32) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, utf16_len(&text[line_start..offset]))
}

/// Format the age of a release relative to now ("3 days ago").
pub fn format_release_age(date: DateTime<Utc>) -> String {
    format_release_age_from(date, Utc::now())
}

fn format_release_age_from(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(date);
    if delta.num_seconds() < 0 {
        return "just now".to_string();
    }

    let (amount, unit) = if delta.num_days() >= 365 {
        (delta.num_days() / 365, "year")
    } else if delta.num_days() >= 30 {
        (delta.num_days() / 30, "month")
    } else if delta.num_days() >= 7 {
        (delta.num_weeks(), "week")
    } else if delta.num_days() >= 1 {
        (delta.num_days(), "day")
    } else if delta.num_hours() >= 1 {
        (delta.num_hours(), "hour")
    } else if delta.num_minutes() >= 1 {
        (delta.num_minutes(), "minute")
    } else {
        return "just now".to_string();
    };

    if amount == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{amount} {unit}s ago")
    }
}
