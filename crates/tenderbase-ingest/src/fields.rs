//! Text-field cleaning and validation shared by both parser variants.

use csv::StringRecord;

use crate::error::SkipReason;

/// Trim whitespace and stray literal quotes. The extracts wrap some values
/// in a second layer of quotes beyond the csv quoting.
pub(crate) fn clean_text(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// Length ceilings count characters, not bytes; the source is Russian text.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// A required text column: cleaned, non-blank, within its ceiling.
pub(crate) fn required_text(
    row: &StringRecord,
    index: usize,
    max_len: usize,
) -> Result<String, SkipReason> {
    let text = clean_text(row.get(index).unwrap_or(""));
    if text.is_empty() {
        return Err(SkipReason::MissingField);
    }
    if char_len(text) > max_len {
        return Err(SkipReason::TooLong);
    }
    Ok(text.to_string())
}
