//! Deterministic enforcement: the authoritative rule engine.
//!
//! The model proposes, this module disposes. Every canonical check is
//! recomputed from the evidence text by [`rules`], then merged with
//! whatever the model emitted for the same particular. A deterministic
//! non-ok finding always overrides an optimistic model claim; a
//! deterministic ok never rescues a check the model flagged.

pub mod lexicon;
pub(crate) mod rules;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::preflight::domain::{
    CanonicalCheck, Check, CheckStatus, ProductFields, Report, ReportProduct, Severity,
};
use crate::preflight::evidence::EvidenceBundle;
use crate::preflight::extraction::{CandidateCheck, CandidateReport};

pub use lexicon::Lexicon;
pub(crate) use rules::ScanCorpus;

/// Citation tags carried per check are capped at this many entries.
const MAX_SOURCES: usize = 3;

pub(crate) const BLANK_SUMMARY: &str =
    "No usable label evidence was provided. All mandatory particulars are reported as missing \
     until label artwork or text is supplied.";

pub struct EnforcementEngine {
    lexicon: Lexicon,
}

impl EnforcementEngine {
    pub fn standard() -> Self {
        Self::new(Lexicon::standard())
    }

    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub(crate) fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Produces the draft report: canonical checks in canonical order,
    /// exactly one per id, scoring still pending.
    pub fn enforce(&self, bundle: &EvidenceBundle, candidate: &CandidateReport) -> Report {
        if bundle.is_blank() {
            info!("blank evidence bundle, forcing all checks to missing");
            return blank_report(&bundle.fields);
        }

        let corpus = ScanCorpus::build(bundle, Some(candidate.label_text.as_str()));

        let mut folded: BTreeMap<CanonicalCheck, Check> = BTreeMap::new();
        for raw in &candidate.checks {
            let canonical = CanonicalCheck::classify(&raw.id)
                .or_else(|| CanonicalCheck::classify(&raw.title));
            let Some(canonical) = canonical else {
                debug!(id = %raw.id, title = %raw.title, "dropping unclassifiable model check");
                continue;
            };
            match folded.entry(canonical) {
                Entry::Vacant(slot) => {
                    slot.insert(first_contribution(canonical, raw));
                }
                Entry::Occupied(mut slot) => combine(slot.get_mut(), raw),
            }
        }

        let mut checks = Vec::with_capacity(CanonicalCheck::ALL.len());
        for canonical in CanonicalCheck::ALL {
            let preferred = rules::derive_check(canonical, &self.lexicon, &bundle.fields, &corpus);
            checks.push(merge_canonical(folded.remove(&canonical), preferred));
        }

        let product = resolve_product(&bundle.fields, &candidate.product);
        let summary = if candidate.summary.trim().is_empty() {
            default_summary(&checks)
        } else {
            candidate.summary.trim().to_string()
        };
        Report::draft(product, summary, checks)
    }
}

/// Every canonical check forced missing: quid high, the rest medium. The
/// model is never a source of truth for an empty submission.
fn blank_report(fields: &ProductFields) -> Report {
    let checks = CanonicalCheck::ALL
        .iter()
        .map(|&canonical| {
            let severity = if canonical == CanonicalCheck::Quid {
                Severity::High
            } else {
                Severity::Medium
            };
            let mut check = Check::new(canonical, CheckStatus::Missing, severity);
            check.detail = "no label evidence was provided".to_string();
            check.fix = "supply the label artwork or its text so this particular can be verified"
                .to_string();
            check
        })
        .collect();

    let product = ReportProduct {
        name: fields.product_name.clone(),
        country_of_sale: fields.country_of_sale.clone(),
        languages_provided: fields.languages_provided.clone(),
    };
    Report::draft(product, BLANK_SUMMARY.to_string(), checks)
}

fn first_contribution(canonical: CanonicalCheck, raw: &CandidateCheck) -> Check {
    let mut check = Check::new(canonical, raw.status, raw.severity);
    check.detail = raw.detail.trim().to_string();
    check.fix = raw.fix.trim().to_string();
    for source in &raw.sources {
        push_unique(&mut check.sources, source);
    }
    check
}

/// Fold rules for a further model check landing on an already-seen id:
/// ok only if all ok, missing beats issue, severity is the maximum,
/// free text bullet-joined, sources unioned.
pub(crate) fn combine(folded: &mut Check, raw: &CandidateCheck) {
    folded.status = match (folded.status, raw.status) {
        (CheckStatus::Ok, CheckStatus::Ok) => CheckStatus::Ok,
        (a, b) if a == CheckStatus::Missing || b == CheckStatus::Missing => CheckStatus::Missing,
        _ => CheckStatus::Issue,
    };
    folded.severity = folded.severity.max(raw.severity);
    folded.detail = bullet_join(&folded.detail, raw.detail.trim());
    folded.fix = bullet_join(&folded.fix, raw.fix.trim());
    for source in &raw.sources {
        push_unique(&mut folded.sources, source);
    }
}

pub(crate) fn merge_canonical(folded: Option<Check>, preferred: Check) -> Check {
    let mut merged = match folded {
        None => preferred,
        Some(mut folded) => {
            if !preferred.is_ok() {
                folded.status = preferred.status;
                folded.severity = preferred.severity;
                folded.detail = preferred.detail;
                folded.fix = preferred.fix;
                for source in &preferred.sources {
                    push_unique(&mut folded.sources, source);
                }
                folded
            } else {
                if folded.is_ok() {
                    if folded.detail.trim().is_empty() {
                        folded.detail = preferred.detail;
                    }
                    for source in &preferred.sources {
                        push_unique(&mut folded.sources, source);
                    }
                }
                folded
            }
        }
    };

    if merged.is_ok() {
        merged.fix.clear();
    }
    merged.sources.truncate(MAX_SOURCES);
    merged
}

/// Model-reported product facts win only when non-empty.
fn resolve_product(fields: &ProductFields, model: &ReportProduct) -> ReportProduct {
    let pick = |candidate: &str, fallback: &str| {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            fallback.trim().to_string()
        } else {
            candidate.to_string()
        }
    };

    ReportProduct {
        name: pick(&model.name, &fields.product_name),
        country_of_sale: pick(&model.country_of_sale, &fields.country_of_sale),
        languages_provided: if model.languages_provided.is_empty() {
            fields.languages_provided.clone()
        } else {
            model.languages_provided.clone()
        },
    }
}

fn default_summary(checks: &[Check]) -> String {
    let total = checks.len();
    let ok = checks.iter().filter(|check| check.is_ok()).count();
    format!(
        "Preliminary label review: {ok} of {total} mandatory particulars verified, {} flagged for follow-up.",
        total - ok
    )
}

fn bullet_join(left: &str, right: &str) -> String {
    match (left.trim().is_empty(), right.is_empty()) {
        (true, true) => String::new(),
        (true, false) => right.to_string(),
        (false, true) => left.to_string(),
        (false, false) => format!("{left} • {right}"),
    }
}

fn push_unique(sources: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !sources.iter().any(|existing| existing == value) {
        sources.push(value.to_string());
    }
}
