//! Core library for the AVA LabelCheck service: a preflight review of
//! consumer food labels against the mandatory particulars of EU Regulation
//! 1169/2011, with an optional Halal pre-audit, rendered as a PDF report
//! and optionally delivered by email.

pub mod config;
pub mod error;
pub mod gateways;
pub mod knowledge;
pub mod preflight;
pub mod render;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{AppError, PipelineStage};
pub use knowledge::KnowledgeBase;
pub use preflight::{LabelPreflightService, PreflightOutcome, PreflightRequest};
