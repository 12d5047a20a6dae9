use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use super::domain::PreflightRequest;
use super::service::LabelPreflightService;
use crate::error::AppError;
use crate::gateways::mail::MailGateway;
use crate::gateways::model::ModelGateway;

/// Router builder exposing the preflight endpoint.
pub fn preflight_router<M, D>(service: Arc<LabelPreflightService<M, D>>) -> Router
where
    M: ModelGateway + 'static,
    D: MailGateway + 'static,
{
    Router::new()
        .route("/api/v1/labels/preflight", post(preflight_handler::<M, D>))
        .with_state(service)
}

pub(crate) async fn preflight_handler<M, D>(
    State(service): State<Arc<LabelPreflightService<M, D>>>,
    axum::Json(request): axum::Json<PreflightRequest>,
) -> Response
where
    M: ModelGateway + 'static,
    D: MailGateway + 'static,
{
    if !request.has_label_evidence() {
        return AppError::MissingEvidence.into_response();
    }

    let outcome = service.run(request).await;
    (StatusCode::OK, axum::Json(outcome)).into_response()
}
