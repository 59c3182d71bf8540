//! Ordered extraction strategies over one rendered-page snapshot.
//!
//! Each strategy either yields structured data or passes to the next: tables
//! first, then named result elements, then the explicit "no violations"
//! phrases. When everything comes up empty the result stays marked uncertain
//! so callers can tell a markup change from a genuinely clean record.

use istilam_server::{ExtractionResult, ViolationRecord};

use crate::extract::classify::{ClassifierConfig, classify_block, classify_row};

/// Well-known class names the portal has used for result containers.
pub const RESULT_CONTAINER_CLASSES: &[&str] = &["violation", "result-item", "record"];

/// Rows with fewer cells are captions or layout filler, not data.
const MIN_DATA_CELLS: usize = 4;

/// A header row needs at least this many recognized labels before cells are
/// mapped by column instead of by shape.
const MIN_RECOGNIZED_HEADERS: usize = 2;

const NO_VIOLATION_PHRASES_AR: &[&str] = &["لا توجد مخالفات", "لم يتم العثور على مخالفات"];
const NO_VIOLATION_PHRASES_EN: &[&str] = &["no violations", "no records found"];

/// One table, rows of raw cell text, exactly as rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub rows: Vec<Vec<String>>,
}

/// Sub-elements of a result container that carried semantic class names.
/// These are read directly, no shape inference needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledFields {
    pub id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub amount: Option<String>,
    pub kind: Option<String>,
    pub location: Option<String>,
}

impl LabeledFields {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.amount.is_none()
            && self.kind.is_none()
            && self.location.is_none()
    }

    fn into_record(self) -> ViolationRecord {
        ViolationRecord {
            id: self.id,
            date: self.date,
            time: self.time,
            amount: self.amount,
            kind: self.kind,
            location: self.location,
        }
    }
}

/// One element under a known result-container class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultElementSnapshot {
    /// Full text content of the element.
    pub text: String,
    /// Values read from semantically-named sub-elements, when present.
    pub labeled: LabeledFields,
}

/// Read-only snapshot of the rendered page, materialized once per query by
/// the browser collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub tables: Vec<TableSnapshot>,
    pub result_elements: Vec<ResultElementSnapshot>,
    pub body_text: String,
}

/// Attribute a recognized header label maps its column onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Id,
    Date,
    Time,
    Amount,
    Kind,
    Location,
}

pub fn extract(page: &PageSnapshot, config: &ClassifierConfig) -> ExtractionResult {
    let records = extract_from_tables(&page.tables, config);
    if !records.is_empty() {
        return ExtractionResult::from_records(records);
    }

    let records = extract_from_result_elements(&page.result_elements);
    if !records.is_empty() {
        return ExtractionResult::from_records(records);
    }

    if no_violations_confirmed(&page.body_text) {
        return ExtractionResult::confirmed_zero();
    }

    ExtractionResult::unrecognized()
}

fn extract_from_tables(tables: &[TableSnapshot], config: &ClassifierConfig) -> Vec<ViolationRecord> {
    let mut records = Vec::new();

    for table in tables {
        // Row 0 is the header. When its labels are recognizable they beat
        // shape inference; otherwise it is simply skipped.
        let columns = table.rows.first().and_then(|header| header_columns(header));

        for row in table.rows.iter().skip(1) {
            if row.len() < MIN_DATA_CELLS {
                continue;
            }
            let record = match &columns {
                Some(columns) => map_by_columns(row, columns),
                None => classify_row(row),
            };
            if config.should_emit(&record) {
                records.push(record);
            }
        }
    }

    records
}

/// Maps a recognized header row to column attributes. Returns `None` unless
/// enough labels are recognized to trust the header over shape matching.
fn header_columns(header: &[String]) -> Option<Vec<Option<Column>>> {
    let columns: Vec<Option<Column>> = header
        .iter()
        .map(|label| recognize_header_label(label))
        .collect();
    let recognized = columns.iter().filter(|column| column.is_some()).count();
    (recognized >= MIN_RECOGNIZED_HEADERS).then_some(columns)
}

fn recognize_header_label(label: &str) -> Option<Column> {
    let lowered = label.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    // Arabic checks run on the raw label; lowercasing is a no-op there.
    // `رقم` is tested before `مخالفة` so that "رقم المخالفة" lands on Id.
    if lowered.contains("date") || lowered.contains("تاريخ") {
        Some(Column::Date)
    } else if lowered.contains("time") || lowered.contains("وقت") {
        Some(Column::Time)
    } else if lowered.contains("amount") || lowered.contains("مبلغ") || lowered.contains("قيمة")
    {
        Some(Column::Amount)
    } else if lowered.contains("location") || lowered.contains("موقع") || lowered.contains("مكان")
    {
        Some(Column::Location)
    } else if lowered.contains("id") || lowered.contains("رقم") {
        Some(Column::Id)
    } else if lowered.contains("type") || lowered.contains("نوع") || lowered.contains("مخالفة")
    {
        Some(Column::Kind)
    } else {
        None
    }
}

fn map_by_columns(row: &[String], columns: &[Option<Column>]) -> ViolationRecord {
    let mut record = ViolationRecord::default();

    for (cell, column) in row.iter().zip(columns) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let slot = match column {
            Some(Column::Id) => &mut record.id,
            Some(Column::Date) => &mut record.date,
            Some(Column::Time) => &mut record.time,
            Some(Column::Amount) => &mut record.amount,
            Some(Column::Kind) => &mut record.kind,
            Some(Column::Location) => &mut record.location,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(cell.to_string());
        }
    }

    record
}

fn extract_from_result_elements(elements: &[ResultElementSnapshot]) -> Vec<ViolationRecord> {
    let mut records = Vec::new();

    for element in elements {
        let record = if element.labeled.is_empty() {
            classify_block(&element.text)
        } else {
            element.labeled.clone().into_record()
        };
        // Free-text blocks carry no core-field guarantee; any match counts.
        if !record.is_empty() {
            records.push(record);
        }
    }

    records
}

fn no_violations_confirmed(body_text: &str) -> bool {
    if NO_VIOLATION_PHRASES_AR
        .iter()
        .any(|phrase| body_text.contains(phrase))
    {
        return true;
    }
    let lowered = body_text.to_lowercase();
    NO_VIOLATION_PHRASES_EN
        .iter()
        .any(|phrase| lowered.contains(phrase))
}
