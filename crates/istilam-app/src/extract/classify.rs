//! Shape classification of untyped row and block text.
//!
//! A cell is classified by its lexical shape, never by column position.
//! Dates and times are unambiguous shapes and are tested first; numeric and
//! long-text shapes are ambiguous, so the first cell of each wins and later
//! lookalikes are dropped. Dropped cells are never guessed at.

use std::sync::LazyLock;

use istilam_server::ViolationRecord;
use regex::Regex;
use serde::Deserialize;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+/\d+/\d+$").expect("date shape regex"));
static TIME_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\d+$").expect("time shape regex"));
static NUMERIC_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("numeric shape regex"));
static DIGITS_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("digits shape regex"));

static BLOCK_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}").expect("block date regex"));
static BLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}").expect("block time regex"));
// Amount must be anchored to a currency suffix; a bare number inside free
// text is anything at all.
static BLOCK_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:د\.ك|(?i:kd))").expect("block amount regex")
});

/// Cells longer than this are taken as the violation description.
const LONG_TEXT_MIN_CHARS: usize = 10;

/// Tuning for record emission.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum number of populated core fields (`id`, `date`, `type`) a
    /// row-classified record needs before it is emitted. The rule is inferred
    /// from source behavior, hence configurable rather than a constant.
    #[serde(default = "ClassifierConfig::default_min_core_fields")]
    pub min_core_fields: usize,
}

impl ClassifierConfig {
    fn default_min_core_fields() -> usize {
        1
    }

    /// Emission check for shape-classified rows.
    pub fn should_emit(&self, record: &ViolationRecord) -> bool {
        !record.is_empty() && record.core_field_count() >= self.min_core_fields
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_core_fields: Self::default_min_core_fields(),
        }
    }
}

/// Classifies one row of raw cell text by shape, in fixed priority order.
///
/// Each cell is consumed by the first shape that matches it; if that shape's
/// attribute is already set for the row, the cell is dropped silently. The
/// result may be partial or entirely empty; emission is the caller's call
/// via [`ClassifierConfig::should_emit`].
pub fn classify_row(cells: &[String]) -> ViolationRecord {
    let mut record = ViolationRecord::default();

    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        if DATE_SHAPE.is_match(cell) {
            set_once(&mut record.date, cell);
        } else if TIME_SHAPE.is_match(cell) {
            set_once(&mut record.time, cell);
        } else if NUMERIC_SHAPE.is_match(cell) {
            set_once(&mut record.amount, cell);
        } else if cell.chars().count() > LONG_TEXT_MIN_CHARS {
            set_once(&mut record.kind, cell);
        } else if DIGITS_SHAPE.is_match(cell) {
            set_once(&mut record.id, cell);
        } else {
            set_once(&mut record.location, cell);
        }
    }

    record
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

/// Degraded classification for one free-text block (a result element without
/// cell structure). The patterns are applied independently, since matches in
/// unstructured text are not mutually exclusive. Callers emit the record if
/// anything matched at all.
pub fn classify_block(text: &str) -> ViolationRecord {
    let mut record = ViolationRecord::default();

    if let Some(found) = BLOCK_DATE.find(text) {
        record.date = Some(found.as_str().to_string());
    }
    if let Some(found) = BLOCK_TIME.find(text) {
        record.time = Some(found.as_str().to_string());
    }
    if let Some(captures) = BLOCK_AMOUNT.captures(text) {
        record.amount = Some(captures[1].to_string());
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn classification_is_deterministic() {
        let cells = row(&["15/02/2025", "14:30", "20", "وقوف في مكان ممنوع"]);
        assert_eq!(classify_row(&cells), classify_row(&cells));
    }

    #[test]
    fn date_cell_is_kept_verbatim() {
        let record = classify_row(&row(&["15/02/2025"]));
        assert_eq!(record.date.as_deref(), Some("15/02/2025"));
    }

    #[test]
    fn second_numeric_cell_is_dropped() {
        let record = classify_row(&row(&["20", "35"]));
        assert_eq!(record.amount.as_deref(), Some("20"));
        assert_eq!(record.id, None);
        assert_eq!(record.location, None);
    }

    #[test]
    fn long_text_becomes_type_short_text_location() {
        let record = classify_row(&row(&["تجاوز السرعة المقررة", "Salmiya"]));
        assert_eq!(record.kind.as_deref(), Some("تجاوز السرعة المقررة"));
        assert_eq!(record.location.as_deref(), Some("Salmiya"));
    }

    #[test]
    fn long_text_threshold_counts_chars_not_bytes() {
        // Eleven Arabic letters: well over 10 chars, far more bytes.
        let record = classify_row(&row(&["مخالفةمرورية"]));
        assert!(record.kind.is_some());
    }

    #[test]
    fn empty_and_unmatched_cells_yield_empty_record() {
        let record = classify_row(&row(&["", "   "]));
        assert!(record.is_empty());
    }

    #[test]
    fn emission_requires_a_core_field() {
        let config = ClassifierConfig::default();
        let amount_only = classify_row(&row(&["14:30", "20"]));
        assert!(!amount_only.is_empty());
        assert!(!config.should_emit(&amount_only));

        let with_date = classify_row(&row(&["15/02/2025", "20"]));
        assert!(config.should_emit(&with_date));
    }

    #[test]
    fn emission_threshold_is_configurable() {
        let strict = ClassifierConfig { min_core_fields: 2 };
        let record = classify_row(&row(&["15/02/2025", "20"]));
        assert!(!strict.should_emit(&record));

        let record = classify_row(&row(&["15/02/2025", "تجاوز السرعة المقررة"]));
        assert!(strict.should_emit(&record));
    }

    #[test]
    fn block_extracts_date_time_and_suffixed_amount() {
        let record = classify_block("مخالفة بتاريخ 15/02/2025 الساعة 14:30 بمبلغ 20 KD");
        assert_eq!(record.date.as_deref(), Some("15/02/2025"));
        assert_eq!(record.time.as_deref(), Some("14:30"));
        assert_eq!(record.amount.as_deref(), Some("20"));
    }

    #[test]
    fn block_amount_accepts_arabic_currency_and_mixed_case() {
        let record = classify_block("الغرامة 12.5 د.ك");
        assert_eq!(record.amount.as_deref(), Some("12.5"));
        let record = classify_block("fine of 10 Kd due");
        assert_eq!(record.amount.as_deref(), Some("10"));
    }

    #[test]
    fn block_without_currency_suffix_has_no_amount() {
        let record = classify_block("reference 20 issued 15/02/2025");
        assert_eq!(record.amount, None);
        assert_eq!(record.date.as_deref(), Some("15/02/2025"));
    }
}
