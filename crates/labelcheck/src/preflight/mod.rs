//! The label preflight pipeline.
//!
//! A request moves through fixed stages: evidence assembly, model-assisted
//! extraction, deterministic enforcement, scoring, rendering and delivery.
//! The model proposes; the deterministic layer disposes.

pub mod documents;
pub mod domain;
pub mod enforcement;
pub mod evidence;
pub mod extraction;
mod halal;
pub mod router;
pub mod scoring;
mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CanonicalCheck, Check, CheckStatus, OverallStatus, PreflightRequest, ProductFields, Report,
    ReportProduct, Severity, UploadedFile,
};
pub use enforcement::EnforcementEngine;
pub use evidence::{BundleSources, EvidenceBundle};
pub use extraction::{CandidateReport, ModelExtractor, RetryPolicy};
pub use router::preflight_router;
pub use service::{
    LabelPreflightService, PreflightOutcome, ServiceInitError, ATTACHMENT_FILENAME,
};
