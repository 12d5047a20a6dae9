//! Model-assisted extraction.
//!
//! Obtains a first-pass candidate report from the hosted model, tolerant
//! of malformed output. Nothing here is authoritative: the candidate is
//! raw material for the enforcement stage, which recomputes every
//! canonical check. Model-declared scores and verdicts are discarded on
//! principle.

pub(crate) mod recovery;

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::gateways::{ChatPrompt, ModelGateway};
use crate::preflight::domain::{CanonicalCheck, CheckStatus, ReportProduct, Severity};
use crate::preflight::evidence::EvidenceBundle;

const SYSTEM_PROMPT: &str = "You are AVA LabelCheck, an EU food label compliance assistant \
focused on Regulation (EU) No 1169/2011 and related guidance. Read the label evidence (image \
and/or extracted text), the provided fields and the house rules, then output STRICT JSON.\n\n\
JSON schema keys: version, product, label_text, overall_status, summary, checks.\n\
Each check: { id, title, status: ok|issue|missing, severity: low|medium|high, detail, fix, \
sources }.\n\
label_text is a faithful transcription of every piece of text readable on the label; use an \
empty string when nothing is readable.\n\n\
Rules: Be precise and practical. Do not invent facts; mark unknowns missing or unclear. Keep \
fixes actionable. Scope: packaged foods B2C in EU. If outside scope, say so in summary.";

const HALAL_PROMPT: &str = "Additionally return halal_checks: the same check shape, auditing \
pork and lard derivatives, alcohol carriers, animal gelatine, questionable additives (E120, \
E441, E542, E904, E920) and halal certification wording.";

/// Summary used when the model answered but its reply carried no JSON.
const PARSE_FAILURE_SUMMARY: &str = "Parsing error; partial output.";

/// Citation tags carried per check are capped at this many entries.
const MAX_SOURCES: usize = 3;

/// Unvalidated check as proposed by the model, statuses already resolved
/// pessimistically (unknown status is an issue, unknown severity medium).
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCheck {
    pub id: String,
    pub title: String,
    pub status: CheckStatus,
    pub severity: Severity,
    pub detail: String,
    pub fix: String,
    pub sources: Vec<String>,
}

/// First-pass report material taken from the model. `label_text` is the
/// model's transcription of the label and joins the enforcement scan
/// corpus; `score`/`overall_status` from the model are never represented
/// here at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateReport {
    pub product: ReportProduct,
    pub summary: String,
    pub label_text: String,
    pub checks: Vec<CandidateCheck>,
    pub halal_checks: Vec<CandidateCheck>,
}

/// Retry budget for the model call. Delays grow exponentially from
/// `base_delay`, capped at `max_delay`, with uniform jitter added so
/// concurrent retries spread out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn standard(attempt_timeout: Duration) -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            max_jitter: Duration::from_millis(250),
            attempt_timeout,
        }
    }

    fn backoff(&self, finished_attempt: u32) -> Duration {
        let factor = 1u32 << finished_attempt.min(10);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

pub struct ModelExtractor<M> {
    gateway: M,
    policy: RetryPolicy,
}

impl<M: ModelGateway> ModelExtractor<M> {
    pub fn new(gateway: M, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    /// Runs the model call with the retry budget. Blank bundles skip the
    /// model entirely; exhausted retries degrade to the shell candidate.
    /// Never returns an error.
    pub async fn extract(&self, bundle: &EvidenceBundle, halal: bool) -> CandidateReport {
        if bundle.is_blank() {
            debug!("blank bundle, skipping model call");
            return shell_candidate("no label evidence was provided");
        }

        let prompt = build_prompt(bundle, halal);
        for attempt in 0..self.policy.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
            }
            match tokio::time::timeout(self.policy.attempt_timeout, self.gateway.complete(&prompt))
                .await
            {
                Ok(Ok(reply)) => return parse_candidate(&reply),
                Ok(Err(err)) => warn!(attempt, %err, "model call failed"),
                Err(_) => warn!(attempt, "model call exceeded the attempt timeout"),
            }
        }

        warn!("model retry budget exhausted, degrading to shell candidate");
        shell_candidate("the analysis service could not be reached")
    }
}

fn build_prompt(bundle: &EvidenceBundle, halal: bool) -> ChatPrompt {
    let ids = CanonicalCheck::ALL
        .iter()
        .map(|check| format!("{} ({})", check.id(), check.title()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut system = format!(
        "{SYSTEM_PROMPT}\n\nchecks must contain exactly one entry per id: {ids}."
    );
    if halal {
        system.push('\n');
        system.push_str(HALAL_PROMPT);
    }

    let fields_json =
        serde_json::to_string(&bundle.fields).unwrap_or_else(|_| "{}".to_string());
    let mut user_parts = vec![format!("Provided fields (JSON): {fields_json}")];
    for block in bundle.blocks() {
        user_parts.push(format!(
            "{} ({}):\n{}",
            block.kind.heading(),
            block.label,
            block.text
        ));
    }
    let mut closing =
        "Return ONLY valid JSON with keys: version, product, label_text, overall_status, \
         summary, checks"
            .to_string();
    if halal {
        closing.push_str(", halal_checks");
    }
    closing.push('.');
    user_parts.push(closing);

    ChatPrompt {
        system,
        user_parts,
        image_data_url: bundle.image_data_url().map(str::to_string),
    }
}

fn parse_candidate(reply: &str) -> CandidateReport {
    match recovery::recover_json(reply) {
        Ok(value) => normalize_candidate(&value),
        Err(err) => {
            warn!(%err, "model reply carried no recoverable JSON");
            CandidateReport {
                summary: PARSE_FAILURE_SUMMARY.to_string(),
                ..CandidateReport::default()
            }
        }
    }
}

/// Tolerant walk over whatever JSON the model produced. Missing or
/// mistyped fields resolve to empty values; model `score` and
/// `overall_status` are deliberately not read.
fn normalize_candidate(value: &Value) -> CandidateReport {
    CandidateReport {
        product: ReportProduct {
            name: str_field(&value["product"]["name"]),
            country_of_sale: str_field(&value["product"]["country_of_sale"]),
            languages_provided: string_list(&value["product"]["languages_provided"]),
        },
        summary: str_field(&value["summary"]),
        label_text: str_field(&value["label_text"]),
        checks: check_list(&value["checks"]),
        halal_checks: check_list(&value["halal_checks"]),
    }
}

fn str_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().trim().to_string()
}

/// Accepts both `["it", "en"]` and a bare `"it"`.
fn string_list(value: &Value) -> Vec<String> {
    if let Some(single) = value.as_str() {
        let single = single.trim();
        if single.is_empty() {
            return Vec::new();
        }
        return vec![single.to_string()];
    }
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn check_list(value: &Value) -> Vec<CandidateCheck> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(normalize_check).collect())
        .unwrap_or_default()
}

fn normalize_check(item: &Value) -> Option<CandidateCheck> {
    let id = str_field(&item["id"]);
    let title = str_field(&item["title"]);
    if id.is_empty() && title.is_empty() {
        return None;
    }

    let status = item["status"]
        .as_str()
        .and_then(CheckStatus::parse)
        .unwrap_or(CheckStatus::Issue);
    let severity = item["severity"]
        .as_str()
        .and_then(Severity::parse)
        .unwrap_or(Severity::Medium);

    let mut sources = Vec::new();
    for source in string_list(&item["sources"]) {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources.truncate(MAX_SOURCES);

    Some(CandidateCheck {
        id,
        title,
        status,
        severity,
        detail: str_field(&item["detail"]),
        fix: str_field(&item["fix"]),
        sources,
    })
}

/// Deterministic stand-in when the model is unavailable: every canonical
/// check missing at medium severity, pending manual review.
pub(crate) fn shell_candidate(reason: &str) -> CandidateReport {
    let checks = CanonicalCheck::ALL
        .iter()
        .map(|&canonical| CandidateCheck {
            id: canonical.id().to_string(),
            title: canonical.title().to_string(),
            status: CheckStatus::Missing,
            severity: Severity::Medium,
            detail: "automated analysis was not available for this check".to_string(),
            fix: "re-run the preflight or review this particular manually".to_string(),
            sources: Vec::new(),
        })
        .collect();

    CandidateReport {
        summary: format!(
            "Automated analysis unavailable: {reason}. Every check requires manual review."
        ),
        checks,
        ..CandidateReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::preflight::domain::ProductFields;
    use crate::preflight::evidence::BundleSources;
    use serde_json::json;

    fn bundle_with_name() -> EvidenceBundle {
        EvidenceBundle::assemble(
            ProductFields {
                product_name: "Pistachio Cream".to_string(),
                ..ProductFields::default()
            },
            BundleSources::default(),
            &KnowledgeBase::empty(),
        )
    }

    #[test]
    fn prompt_names_every_canonical_id() {
        let prompt = build_prompt(&bundle_with_name(), false);
        for check in CanonicalCheck::ALL {
            assert!(
                prompt.system.contains(check.id()),
                "prompt must name {}",
                check.id()
            );
        }
        assert!(!prompt.system.contains("halal_checks"));
    }

    #[test]
    fn halal_request_extends_prompt_and_closing() {
        let prompt = build_prompt(&bundle_with_name(), true);
        assert!(prompt.system.contains("halal"));
        let closing = prompt.user_parts.last().expect("closing part");
        assert!(closing.contains("halal_checks"));
    }

    #[test]
    fn unparseable_status_becomes_issue_never_ok() {
        let value = json!({
            "checks": [
                { "id": "quid", "status": "excellent", "severity": "unsure" },
            ]
        });
        let candidate = normalize_candidate(&value);
        assert_eq!(candidate.checks.len(), 1);
        assert_eq!(candidate.checks[0].status, CheckStatus::Issue);
        assert_eq!(candidate.checks[0].severity, Severity::Medium);
    }

    #[test]
    fn checks_without_identity_are_dropped() {
        let value = json!({
            "checks": [
                { "detail": "anonymous claim" },
                { "title": "Net quantity", "status": "ok", "severity": "low" },
            ]
        });
        let candidate = normalize_candidate(&value);
        assert_eq!(candidate.checks.len(), 1);
        assert_eq!(candidate.checks[0].title, "Net quantity");
    }

    #[test]
    fn model_score_and_verdict_are_not_represented() {
        let value = json!({
            "score": 100,
            "overall_status": "pass",
            "summary": "all good",
        });
        let candidate = normalize_candidate(&value);
        assert_eq!(candidate.summary, "all good");
        // CandidateReport has no field to carry either value.
    }

    #[test]
    fn sources_are_deduplicated_and_capped() {
        let value = json!({
            "checks": [{
                "id": "quid",
                "status": "issue",
                "severity": "high",
                "sources": ["Art. 22", "Art. 22", "Art. 9(1)(d)", "Annex VIII", "Art. 17"],
            }]
        });
        let candidate = normalize_candidate(&value);
        assert_eq!(
            candidate.checks[0].sources,
            vec!["Art. 22", "Art. 9(1)(d)", "Annex VIII"]
        );
    }

    #[test]
    fn bare_string_language_list_is_accepted() {
        let value = json!({ "product": { "languages_provided": "it" } });
        let candidate = normalize_candidate(&value);
        assert_eq!(candidate.product.languages_provided, vec!["it"]);
    }

    #[test]
    fn parse_failure_yields_empty_candidate_with_marker_summary() {
        let candidate = parse_candidate("I could not find anything useful to say.");
        assert_eq!(candidate.summary, PARSE_FAILURE_SUMMARY);
        assert!(candidate.checks.is_empty());
    }

    #[test]
    fn fenced_reply_is_recovered() {
        let reply = "Here you go:\n```json\n{\"summary\": \"fenced\"}\n```";
        let candidate = parse_candidate(reply);
        assert_eq!(candidate.summary, "fenced");
    }

    #[test]
    fn shell_candidate_covers_every_canonical_check() {
        let shell = shell_candidate("downstream outage");
        assert_eq!(shell.checks.len(), CanonicalCheck::ALL.len());
        assert!(shell
            .checks
            .iter()
            .all(|check| check.status == CheckStatus::Missing
                && check.severity == Severity::Medium));
        assert!(shell.summary.contains("downstream outage"));
        assert!(shell.label_text.is_empty());
    }

    #[test]
    fn backoff_grows_and_respects_jitter_bounds() {
        let policy = RetryPolicy::standard(Duration::from_secs(5));
        let first = policy.backoff(0);
        let second = policy.backoff(1);
        assert!(first >= Duration::from_millis(500));
        assert!(first <= Duration::from_millis(750));
        assert!(second >= Duration::from_millis(1000));
        assert!(second <= Duration::from_millis(1250));
    }

    #[test]
    fn deep_backoff_caps_at_max_delay() {
        let policy = RetryPolicy::standard(Duration::from_secs(5));
        let deep = policy.backoff(9);
        assert!(deep <= policy.max_delay + policy.max_jitter);
    }
}
