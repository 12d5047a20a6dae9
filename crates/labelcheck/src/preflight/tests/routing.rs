use super::common::*;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::preflight::domain::PreflightRequest;
use crate::preflight::router;

#[tokio::test]
async fn missing_evidence_is_rejected_before_the_pipeline() {
    let model = ScriptedModel::silent();
    let service = Arc::new(service_with(model.clone(), RecordingMailer::unconfigured()));

    let response = router::preflight_handler::<ScriptedModel, RecordingMailer>(
        State(service),
        axum::Json(PreflightRequest::default()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    let message = payload
        .get("error")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    assert!(message.contains("label_image_data_url"));
    assert!(message.contains("label_pdf_file"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn whitespace_evidence_counts_as_missing() {
    let service = Arc::new(service_with(
        ScriptedModel::silent(),
        RecordingMailer::unconfigured(),
    ));
    let request = PreflightRequest {
        label_image_data_url: Some("   ".to_string()),
        ..PreflightRequest::default()
    };

    let response = router::preflight_handler::<ScriptedModel, RecordingMailer>(
        State(service),
        axum::Json(request),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preflight_route_accepts_label_payloads() {
    let model = ScriptedModel::single(&all_ok_model_reply(ITALIAN_LABEL));
    let router = preflight_router_with_service(service_with(
        model,
        RecordingMailer::unconfigured(),
    ));

    let request = image_request(pistachio_fields());
    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/labels/preflight")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&request).expect("request serializes"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("ok"), Some(&json!(true)));
    assert_eq!(
        payload["report"]["checks"].as_array().map(Vec::len),
        Some(11)
    );
    assert_eq!(payload.get("email_status"), Some(&json!("skipped")));
    assert!(payload["pdf_base64"]
        .as_str()
        .is_some_and(|pdf| !pdf.is_empty()));
}

#[tokio::test]
async fn method_mismatch_is_rejected() {
    let router = preflight_router_with_service(service_with(
        ScriptedModel::silent(),
        RecordingMailer::unconfigured(),
    ));

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/labels/preflight")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
