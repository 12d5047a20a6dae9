use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use labelcheck::gateways::{
    ChatPrompt, MailError, MailGateway, MailMessage, ModelCallError, ModelGateway,
};
use labelcheck::preflight::{
    CanonicalCheck, CheckStatus, LabelPreflightService, OverallStatus, PreflightRequest,
    ProductFields, RetryPolicy, Severity,
};
use labelcheck::KnowledgeBase;

const LABEL_TEXT: &str = concat!(
    "Crema di Pistacchio\n",
    "Ingredienti: pistacchio 60%, zucchero, olio di semi di girasole, ",
    "latte scremato in polvere.\n",
    "Peso netto: 200 g\n",
    "Da consumarsi preferibilmente entro: 12/2026\n",
    "Conservare in luogo fresco e asciutto.\n",
    "Prodotto da Dolci Fratelli SRL, Via Etnea 42, 95100 Catania, Italia.\n",
    "Valori nutrizionali medi per 100 g: energia 2280 kJ / 546 kcal.",
);

struct FixedModel {
    reply: String,
}

#[async_trait]
impl ModelGateway for FixedModel {
    async fn complete(&self, _prompt: &ChatPrompt) -> Result<String, ModelCallError> {
        Ok(self.reply.clone())
    }
}

#[derive(Clone, Default)]
struct CapturingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

#[async_trait]
impl MailGateway for CapturingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent.lock().expect("sent log").push(message.clone());
        Ok(())
    }
}

fn model_reply() -> String {
    let checks: Vec<serde_json::Value> = CanonicalCheck::ALL
        .iter()
        .map(|&check| {
            json!({
                "id": check.id(),
                "status": "ok",
                "severity": "low",
                "detail": "verified against the label artwork",
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
        "label_text": LABEL_TEXT,
        "overall_status": "pass",
        "summary": "Label presents the mandatory particulars.",
        "checks": checks,
    })
    .to_string()
}

fn request() -> PreflightRequest {
    PreflightRequest {
        fields: ProductFields {
            product_name: "Pistachio Cream".to_string(),
            company_name: "Dolci Fratelli SRL".to_string(),
            company_email: "qa@dolcifratelli.example".to_string(),
            country_of_sale: "Italy".to_string(),
            languages_provided: vec!["it".to_string()],
            shipping_scope: "eu".to_string(),
            product_category: "spreads".to_string(),
        },
        halal_audit: true,
        label_image_data_url: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
        ..PreflightRequest::default()
    }
}

fn service(
    mailer: CapturingMailer,
) -> LabelPreflightService<FixedModel, CapturingMailer> {
    LabelPreflightService::new(
        FixedModel { reply: model_reply() },
        RetryPolicy::standard(Duration::from_secs(5)),
        mailer,
        "AVA LabelCheck <onboarding@resend.dev>",
        Arc::new(KnowledgeBase::empty()),
    )
}

#[tokio::test]
async fn full_pipeline_produces_an_enforced_scored_delivered_report() {
    let mailer = CapturingMailer::default();
    let outcome = service(mailer.clone()).run(request()).await;

    assert!(outcome.ok);

    // Deterministic enforcement drives the verdict even though the model
    // declared everything ok: the allergens are not emphasised.
    let allergen = outcome
        .report
        .checks
        .iter()
        .find(|check| check.id == "allergen_emphasis")
        .expect("allergen check present");
    assert_eq!(allergen.status, CheckStatus::Issue);
    assert_eq!(allergen.severity, Severity::Medium);

    let quid = outcome
        .report
        .checks
        .iter()
        .find(|check| check.id == "quid")
        .expect("quid check present");
    assert_eq!(quid.status, CheckStatus::Ok, "pistacchio 60% satisfies QUID");

    assert_eq!(outcome.score, 92);
    assert_eq!(outcome.report.overall_status, OverallStatus::Caution);

    // The Halal pre-audit rides alongside without touching the EU score.
    assert_eq!(outcome.halal_checks.len(), 5);
    assert!(outcome
        .report
        .checks
        .iter()
        .all(|check| !check.id.starts_with("halal")));

    let pdf = outcome.pdf_base64.expect("pdf returned");
    assert!(!pdf.is_empty());

    assert_eq!(outcome.email_status, "sent");
    let sent = mailer.sent.lock().expect("sent log");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "AVA LabelCheck Report — Crema di Pistacchio");
}

#[tokio::test]
async fn identical_requests_fold_to_identical_reports() {
    let first = service(CapturingMailer::default()).run(request()).await;
    let second = service(CapturingMailer::default()).run(request()).await;

    assert_eq!(first.score, second.score);
    assert_eq!(first.report.overall_status, second.report.overall_status);
    let statuses = |checks: &[labelcheck::preflight::Check]| {
        checks
            .iter()
            .map(|check| (check.id.clone(), check.status))
            .collect::<Vec<_>>()
    };
    assert_eq!(statuses(&first.report.checks), statuses(&second.report.checks));
}
