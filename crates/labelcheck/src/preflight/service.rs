//! Pipeline orchestration.
//!
//! One request runs the stages strictly in order: evidence assembly,
//! model-assisted extraction, deterministic enforcement, scoring, then
//! rendering and delivery. The last two are fault-isolated; once a report
//! exists the request always completes with it.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Check, PreflightRequest, Report};
use super::enforcement::{EnforcementEngine, ScanCorpus};
use super::evidence::{BundleSources, EvidenceBundle};
use super::extraction::{ModelExtractor, RetryPolicy};
use super::{halal, scoring};
use crate::config::AppConfig;
use crate::gateways::mail::{MailAttachment, MailError, MailGateway, MailMessage, ResendMailer};
use crate::gateways::model::{ModelCallError, ModelGateway, OpenAiChatClient};
use crate::knowledge::KnowledgeBase;
use crate::render::{is_plausible, PdfReportRenderer, RenderInput, ReportRenderer};

pub const ATTACHMENT_FILENAME: &str = "AVA_LabelCheck_Report.pdf";

/// Completed preflight run. `ok` is true whenever a report was computed,
/// including degraded renders and failed deliveries.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightOutcome {
    pub ok: bool,
    pub report: Report,
    pub score: u8,
    pub halal_audit: bool,
    pub halal_checks: Vec<Check>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_error: Option<String>,
    pub email_status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceInitError {
    #[error("model client: {0}")]
    Model(#[from] ModelCallError),
    #[error("mail client: {0}")]
    Mail(#[from] MailError),
}

/// The preflight pipeline with its collaborators. Generic over the model
/// and mail gateways so tests can script both; the renderer is boxed for
/// the same reason.
pub struct LabelPreflightService<M, D> {
    extractor: ModelExtractor<M>,
    engine: EnforcementEngine,
    renderer: Box<dyn ReportRenderer>,
    mailer: D,
    mail_from: String,
    knowledge: Arc<KnowledgeBase>,
}

impl LabelPreflightService<OpenAiChatClient, ResendMailer> {
    /// Production wiring from environment configuration.
    pub fn from_config(
        config: &AppConfig,
        knowledge: Arc<KnowledgeBase>,
    ) -> Result<Self, ServiceInitError> {
        let gateway = OpenAiChatClient::new(&config.model)?;
        let mailer = ResendMailer::new(&config.mail)?;
        Ok(Self::new(
            gateway,
            RetryPolicy::standard(config.model.timeout),
            mailer,
            config.mail.from.clone(),
            knowledge,
        ))
    }
}

impl<M: ModelGateway, D: MailGateway> LabelPreflightService<M, D> {
    pub fn new(
        gateway: M,
        policy: RetryPolicy,
        mailer: D,
        mail_from: impl Into<String>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            extractor: ModelExtractor::new(gateway, policy),
            engine: EnforcementEngine::standard(),
            renderer: Box::new(PdfReportRenderer::new()),
            mailer,
            mail_from: mail_from.into(),
            knowledge,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub async fn run(&self, request: PreflightRequest) -> PreflightOutcome {
        let halal_audit = request.halal_audit;
        let include_halal_page = request.include_halal_page;
        let return_pdf = request.return_pdf;
        let attach_pdf = request.attach_pdf;
        let recipient = request.fields.company_email.trim().to_string();
        let company_name = request.fields.company_name.clone();
        let shipping_scope = request.fields.shipping_scope.clone();

        let sources = BundleSources {
            label_image_data_url: request.label_image_data_url,
            label_pdf: request.label_pdf_file,
            tds: request.tds_file,
            extra_rules: request.reference_docs_text,
        };
        let bundle = EvidenceBundle::assemble(request.fields, sources, &self.knowledge);

        let candidate = self.extractor.extract(&bundle, halal_audit).await;
        let mut report = self.engine.enforce(&bundle, &candidate);

        let halal_checks = if halal_audit {
            let corpus = ScanCorpus::build(&bundle, Some(candidate.label_text.as_str()));
            halal::audit(self.engine.lexicon(), &corpus, &candidate)
        } else {
            Vec::new()
        };

        scoring::finalize(&mut report);
        info!(
            score = report.score,
            status = report.overall_status.label(),
            halal = halal_audit,
            "preflight report finalized"
        );

        let mut pdf_bytes: Option<Vec<u8>> = None;
        let mut pdf_error: Option<String> = None;
        if return_pdf || attach_pdf {
            let input = RenderInput {
                report: &report,
                halal_checks: &halal_checks,
                company_name: &company_name,
                shipping_scope: &shipping_scope,
                include_halal_page,
            };
            match self.render_with_fallback(&input) {
                Ok(bytes) => pdf_bytes = Some(bytes),
                Err(message) => {
                    warn!(%message, "report rendering failed with no fallback");
                    pdf_error = Some(message);
                }
            }
        }

        let email_status = self
            .deliver(
                &report,
                &recipient,
                &company_name,
                attach_pdf,
                pdf_bytes.as_deref(),
            )
            .await;

        let pdf_base64 = match (&pdf_bytes, return_pdf) {
            (Some(bytes), true) => Some(BASE64.encode(bytes)),
            _ => None,
        };

        PreflightOutcome {
            ok: true,
            score: report.score,
            halal_audit,
            halal_checks,
            pdf_base64,
            pdf_error,
            email_status,
            report,
        }
    }

    /// Primary render, degrading to the minimal fallback document when the
    /// renderer errors or produces an implausibly small output. Only a
    /// double failure surfaces as an error string.
    fn render_with_fallback(&self, input: &RenderInput<'_>) -> Result<Vec<u8>, String> {
        match self.renderer.render(input) {
            Ok(bytes) if is_plausible(&bytes) => return Ok(bytes),
            Ok(bytes) => {
                warn!(len = bytes.len(), "rendered document implausibly small, using fallback")
            }
            Err(err) => warn!(%err, "primary render failed, using fallback"),
        }
        self.renderer.fallback(input).map_err(|err| err.to_string())
    }

    async fn deliver(
        &self,
        report: &Report,
        recipient: &str,
        company_name: &str,
        attach_pdf: bool,
        pdf: Option<&[u8]>,
    ) -> String {
        if !self.mailer.configured() {
            return "skipped".to_string();
        }
        if recipient.is_empty() {
            return "skipped: no recipient".to_string();
        }

        let message = MailMessage {
            from: self.mail_from.clone(),
            to: recipient.to_string(),
            subject: format!(
                "AVA LabelCheck Report — {}",
                non_empty_or(&report.product.name, "Your Product")
            ),
            html: greeting_html(company_name, &report.product.name),
            attachment: pdf.filter(|_| attach_pdf).map(|bytes| MailAttachment {
                filename: ATTACHMENT_FILENAME.to_string(),
                content_base64: BASE64.encode(bytes),
            }),
        };

        match self.mailer.send(&message).await {
            Ok(()) => "sent".to_string(),
            Err(err) => {
                warn!(%err, "report delivery failed");
                format!("failed: {err}")
            }
        }
    }
}

fn greeting_html(company_name: &str, product_name: &str) -> String {
    format!(
        "<p>Hello {},</p><p>Attached is your preliminary compliance report for \
         <strong>{}</strong>.</p><p>Best,<br/>AVA LabelCheck</p>",
        company_name.trim(),
        non_empty_or(product_name, "your product")
    )
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
