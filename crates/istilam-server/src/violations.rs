use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One normalized violation as presented by the source portal.
///
/// Every field is optional: values are inferred heuristically from untyped
/// page content, and a field is populated only when a classification rule
/// matched. Absent fields are omitted from the serialized record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ViolationRecord {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.amount.is_none()
            && self.kind.is_none()
            && self.location.is_none()
    }

    /// Number of populated core fields (`id`, `date`, `type`); the emission
    /// threshold is measured against these.
    pub fn core_field_count(&self) -> usize {
        [&self.id, &self.date, &self.kind]
            .into_iter()
            .filter(|field| field.is_some())
            .count()
    }
}

/// Ordered records plus the signal distinguishing "the portal explicitly said
/// there are none" from "no structure was recognized on the page".
///
/// Callers must not collapse the two empty cases: an uncertain empty result
/// is the cue that the portal markup may have changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub records: Vec<ViolationRecord>,
    pub confirmed_zero: bool,
}

impl ExtractionResult {
    pub fn from_records(records: Vec<ViolationRecord>) -> Self {
        Self {
            records,
            confirmed_zero: false,
        }
    }

    /// The portal explicitly reported no matching violations.
    pub fn confirmed_zero() -> Self {
        Self {
            records: Vec::new(),
            confirmed_zero: true,
        }
    }

    /// Every extraction strategy came up empty and no "no violations" phrase
    /// was found.
    pub fn unrecognized() -> Self {
        Self {
            records: Vec::new(),
            confirmed_zero: false,
        }
    }
}

/// Identity token for one enquiry. Which fields are present depends on the
/// deployment variant; the provider only fills the form roles it can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnquiryRequest {
    pub plate_number: Option<String>,
    pub civil_id: String,
}

#[derive(Debug, Clone)]
pub struct EnquiryError {
    pub kind: EnquiryErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum EnquiryErrorKind {
    /// The browser-automation collaborator failed (navigation timeout,
    /// element missing at fill/click time, browser crash).
    Collaborator { stage: String },
    Internal,
}

impl EnquiryError {
    pub fn collaborator(stage: impl Into<String>, message: impl Into<String>) -> Self {
        EnquiryError {
            kind: EnquiryErrorKind::Collaborator {
                stage: stage.into(),
            },
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EnquiryError {
            kind: EnquiryErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl fmt::Display for EnquiryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EnquiryError {}

/// Seam between the HTTP surface and the scraping orchestrator.
#[async_trait]
pub trait ViolationProvider: Send + Sync + 'static {
    async fn enquire(&self, request: EnquiryRequest) -> Result<ExtractionResult, EnquiryError>;
}
