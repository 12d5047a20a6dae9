use crate::config::ConfigError;
use crate::preflight::ServiceInitError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Pipeline stage markers carried on unexpected-failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Assembly,
    Extraction,
    Enforcement,
    Scoring,
    Rendering,
    Delivery,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            PipelineStage::Assembly => "assembly",
            PipelineStage::Extraction => "extraction",
            PipelineStage::Enforcement => "enforcement",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Rendering => "rendering",
            PipelineStage::Delivery => "delivery",
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Init(ServiceInitError),
    Io(std::io::Error),
    Server(axum::Error),
    /// Request carries neither a label image nor a label PDF.
    MissingEvidence,
    /// Unclassified failure inside the pipeline; the only class that aborts
    /// a request.
    Internal {
        stage: PipelineStage,
        message: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Init(err) => write!(f, "initialization error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::MissingEvidence => {
                write!(f, "label_image_data_url or label_pdf_file is required")
            }
            AppError::Internal { stage, message } => {
                write!(f, "{} stage failed: {}", stage.label(), message)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Init(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::MissingEvidence | AppError::Internal { .. } => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MissingEvidence => {
                let body = Json(json!({ "error": self.to_string() }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            AppError::Internal { stage, ref message } => {
                let body = Json(json!({ "error": message, "stage": stage.label() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Init(_)
            | AppError::Io(_)
            | AppError::Server(_) => {
                let body = Json(json!({ "error": self.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<ServiceInitError> for AppError {
    fn from(value: ServiceInitError) -> Self {
        Self::Init(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}
