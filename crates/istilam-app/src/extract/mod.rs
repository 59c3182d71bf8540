//! Heuristic extraction engine kept pure for reuse and testing.
//!
//! Everything here operates on already-materialized snapshots (element
//! descriptors, table rows, body text) and must remain side-effect free; the
//! document-reading step lives entirely in `crate::browser`.

pub mod classify;
pub mod element;
pub mod strategy;

pub use classify::{ClassifierConfig, classify_block, classify_row};
pub use element::{
    ElementDescriptor, ElementKind, FieldBindings, FieldRole, fallback_submit, locate_fields,
    nth_text_input,
};
pub use strategy::{
    LabeledFields, PageSnapshot, ResultElementSnapshot, TableSnapshot, extract,
};
