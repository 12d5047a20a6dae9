use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateways::mail::{MailError, MailGateway, MailMessage};
use crate::gateways::model::{ChatPrompt, ModelCallError, ModelGateway};
use crate::knowledge::KnowledgeBase;
use crate::preflight::domain::{CanonicalCheck, PreflightRequest, ProductFields};
use crate::preflight::evidence::{BundleSources, EvidenceBundle};
use crate::preflight::extraction::RetryPolicy;
use crate::preflight::router::preflight_router;
use crate::preflight::LabelPreflightService;
use crate::render::{PdfReportRenderer, RenderError, RenderInput, ReportRenderer};

pub(super) const IMAGE_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

/// A plausible Italian spread label. Carries every mandatory particular
/// except allergen emphasis: "pistacchio" and "latte" appear in plain
/// casing only.
pub(super) const ITALIAN_LABEL: &str = concat!(
    "Crema di Pistacchio\n",
    "Ingredienti: pistacchio 60%, zucchero, olio di semi di girasole, ",
    "latte scremato in polvere.\n",
    "Peso netto: 200 g\n",
    "Da consumarsi preferibilmente entro: 12/2026\n",
    "Conservare in luogo fresco e asciutto.\n",
    "Prodotto da Dolci Fratelli SRL, Via Etnea 42, 95100 Catania, Italia.\n",
    "Valori nutrizionali medi per 100 g: energia 2280 kJ / 546 kcal.",
);

pub(super) fn pistachio_fields() -> ProductFields {
    ProductFields {
        product_name: "Pistachio Cream".to_string(),
        company_name: "Dolci Fratelli SRL".to_string(),
        company_email: "qa@dolcifratelli.example".to_string(),
        country_of_sale: "Italy".to_string(),
        languages_provided: vec!["it".to_string()],
        shipping_scope: "eu".to_string(),
        product_category: "spreads".to_string(),
    }
}

pub(super) fn image_request(fields: ProductFields) -> PreflightRequest {
    PreflightRequest {
        fields,
        label_image_data_url: Some(IMAGE_URL.to_string()),
        ..PreflightRequest::default()
    }
}

pub(super) fn evidence_bundle() -> EvidenceBundle {
    EvidenceBundle::assemble(
        pistachio_fields(),
        BundleSources {
            label_image_data_url: Some(IMAGE_URL.to_string()),
            ..BundleSources::default()
        },
        &KnowledgeBase::empty(),
    )
}

pub(super) fn blank_bundle() -> EvidenceBundle {
    EvidenceBundle::assemble(
        ProductFields::default(),
        BundleSources::default(),
        &KnowledgeBase::empty(),
    )
}

/// A complete, well-formed model reply: all checks ok, with the given
/// label transcription.
pub(super) fn all_ok_model_reply(label_text: &str) -> String {
    let checks: Vec<Value> = CanonicalCheck::ALL
        .iter()
        .map(|&check| {
            json!({
                "id": check.id(),
                "title": check.title(),
                "status": "ok",
                "severity": "low",
                "detail": "verified against the label artwork",
                "fix": "",
                "sources": ["Art. 9"],
            })
        })
        .collect();

    json!({
        "version": "1.0",
        "product": {
            "name": "Crema di Pistacchio",
            "country_of_sale": "Italy",
            "languages_provided": ["it"],
        },
        "label_text": label_text,
        "overall_status": "pass",
        "summary": "Label presents the mandatory particulars.",
        "checks": checks,
    })
    .to_string()
}

/// Millisecond-scale retry budget so retry tests finish instantly.
pub(super) fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_jitter: Duration::from_millis(1),
        attempt_timeout: Duration::from_secs(5),
    }
}

pub(super) fn service_with(
    model: ScriptedModel,
    mailer: RecordingMailer,
) -> LabelPreflightService<ScriptedModel, RecordingMailer> {
    LabelPreflightService::new(
        model,
        fast_policy(),
        mailer,
        "AVA LabelCheck <onboarding@resend.dev>",
        Arc::new(KnowledgeBase::empty()),
    )
}

pub(super) fn preflight_router_with_service(
    service: LabelPreflightService<ScriptedModel, RecordingMailer>,
) -> axum::Router {
    preflight_router(Arc::new(service))
}

/// Body limit is generous: outcomes embed a base64 PDF.
pub(super) async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Model gateway replaying scripted replies in order; exhausted scripts
/// fail the call. Clones share the reply queue and call counter.
#[derive(Clone)]
pub(super) struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub(super) fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn single(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub(super) fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedModel {
    async fn complete(&self, _prompt: &ChatPrompt) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().expect("reply queue").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ModelCallError::Transport(message)),
            None => Err(ModelCallError::Transport("no scripted reply left".to_string())),
        }
    }
}

/// Mail gateway capturing every accepted message. Clones share the log.
#[derive(Clone)]
pub(super) struct RecordingMailer {
    is_configured: bool,
    fail_with: Option<String>,
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub(super) fn configured() -> Self {
        Self {
            is_configured: true,
            fail_with: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(super) fn unconfigured() -> Self {
        Self {
            is_configured: false,
            ..Self::configured()
        }
    }

    pub(super) fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::configured()
        }
    }

    pub(super) fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("sent log").clone()
    }
}

#[async_trait]
impl MailGateway for RecordingMailer {
    fn configured(&self) -> bool {
        self.is_configured
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if let Some(reason) = &self.fail_with {
            return Err(MailError::Transport(reason.clone()));
        }
        self.sent.lock().expect("sent log").push(message.clone());
        Ok(())
    }
}

/// Renderer whose primary path always fails; the fallback can be broken
/// too, to exercise the double-failure branch.
pub(super) struct BrokenRenderer {
    pub(super) fail_fallback: bool,
}

impl ReportRenderer for BrokenRenderer {
    fn render(&self, _input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Failed("primary renderer out of order".to_string()))
    }

    fn fallback(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        if self.fail_fallback {
            Err(RenderError::Failed("fallback renderer out of order".to_string()))
        } else {
            PdfReportRenderer::new().fallback(input)
        }
    }
}

/// Renderer returning output too small to be a real document.
pub(super) struct TinyRenderer;

impl ReportRenderer for TinyRenderer {
    fn render(&self, _input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        Ok(b"%PDF-tiny".to_vec())
    }

    fn fallback(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        PdfReportRenderer::new().fallback(input)
    }
}
