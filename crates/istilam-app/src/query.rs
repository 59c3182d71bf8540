//! Query orchestration: one enquiry end to end.
//!
//! The orchestrator sequences the browser collaborator and the pure
//! extraction engine; it contains no page-reading logic of its own.

use async_trait::async_trait;
use istilam_server::{EnquiryError, EnquiryRequest, ExtractionResult, ViolationProvider};
use thiserror::Error;

use crate::browser::{BrowserError, PortalBrowser};
use crate::config::PortalConfig;
use crate::extract::{
    ClassifierConfig, ElementDescriptor, extract, fallback_submit, locate_fields, nth_text_input,
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("could not locate the {0} field on the enquiry page")]
    MissingField(&'static str),
}

impl From<QueryError> for EnquiryError {
    fn from(error: QueryError) -> Self {
        match &error {
            QueryError::Browser(source) => {
                EnquiryError::collaborator(source.stage(), error.to_string())
            }
            QueryError::MissingField(_) => EnquiryError::internal(error.to_string()),
        }
    }
}

/// Runs one enquiry against the portal. Blocking; callers on an async
/// runtime go through [`PortalViolationProvider`].
pub fn run_query(
    portal: &PortalConfig,
    classifier: &ClassifierConfig,
    request: &EnquiryRequest,
) -> Result<ExtractionResult, QueryError> {
    let browser = PortalBrowser::launch(portal)?;
    browser.open_enquiry_page()?;

    let inventory = browser.element_inventory()?;
    let bindings = locate_fields(&inventory);

    // A missing plate field skips the optional input; a missing civil-ID
    // field fails the query, since the portal cannot answer without it.
    if let Some(plate) = &request.plate_number {
        match selector_for(bindings.plate_number, || nth_text_input(&inventory, 0)) {
            Some(selector) => browser.fill_input(&selector, plate)?,
            None => tracing::warn!("no plate-number field found; submitting without it"),
        }
    }
    let civil_selector = selector_for(bindings.civil_id, || nth_text_input(&inventory, 1))
        .ok_or(QueryError::MissingField("civil ID"))?;
    browser.fill_input(&civil_selector, &request.civil_id)?;
    browser.screenshot("filled-form");

    let submit_selector = selector_for(bindings.submit, || fallback_submit(&inventory))
        .ok_or(QueryError::MissingField("submit"))?;
    browser.click_submit(&submit_selector)?;

    let snapshot = browser.snapshot()?;
    let result = extract(&snapshot, classifier);
    tracing::info!(
        records = result.records.len(),
        confirmed_zero = result.confirmed_zero,
        "enquiry extracted"
    );
    Ok(result)
}

fn selector_for<'a>(
    primary: Option<&'a ElementDescriptor>,
    fallback: impl FnOnce() -> Option<&'a ElementDescriptor>,
) -> Option<String> {
    primary.or_else(fallback).and_then(ElementDescriptor::selector)
}

/// [`ViolationProvider`] backed by a fresh headless browser per enquiry.
pub struct PortalViolationProvider {
    portal: PortalConfig,
    classifier: ClassifierConfig,
}

impl PortalViolationProvider {
    pub fn new(portal: PortalConfig, classifier: ClassifierConfig) -> Self {
        Self { portal, classifier }
    }
}

#[async_trait]
impl ViolationProvider for PortalViolationProvider {
    async fn enquire(&self, request: EnquiryRequest) -> Result<ExtractionResult, EnquiryError> {
        let portal = self.portal.clone();
        let classifier = self.classifier;
        // Browser automation is synchronous; keep it off the runtime workers.
        let outcome =
            tokio::task::spawn_blocking(move || run_query(&portal, &classifier, &request))
                .await
                .map_err(|error| EnquiryError::internal(format!("query task failed: {error}")))?;
        outcome.map_err(EnquiryError::from)
    }
}
