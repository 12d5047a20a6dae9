//! Optional Halal pre-audit.
//!
//! An open check set, unlike the fixed EU profile: five deterministic
//! substance checks are always present, and model-proposed extras survive
//! under their slugified titles. Halal findings never feed the EU score.

use crate::preflight::domain::{Check, CheckStatus, Severity};
use crate::preflight::enforcement::{combine, merge_canonical, Lexicon, ScanCorpus};
use crate::preflight::extraction::{CandidateCheck, CandidateReport};

/// A gelatine mention within this many bytes of the word "halal" counts as
/// qualified.
const QUALIFIER_WINDOW: usize = 40;

const HOUSE_SOURCE: &str = "house_rules.md";

/// Runs the deterministic substance scan and folds in the model's halal
/// checks. Deterministic findings override on slug conflict; model-only
/// checks are appended in arrival order.
pub(crate) fn audit(
    lexicon: &Lexicon,
    corpus: &ScanCorpus,
    candidate: &CandidateReport,
) -> Vec<Check> {
    let mut extras: Vec<(String, Check)> = Vec::new();
    for raw in &candidate.halal_checks {
        let key = if raw.id.trim().is_empty() { &raw.title } else { &raw.id };
        let slug = slugify(key);
        if slug.is_empty() {
            continue;
        }
        match extras.iter_mut().find(|(existing, _)| *existing == slug) {
            Some((_, folded)) => combine(folded, raw),
            None => extras.push((slug, model_check(raw))),
        }
    }

    let mut checks = Vec::new();
    for preferred in deterministic_checks(lexicon, corpus) {
        let folded = extras
            .iter()
            .position(|(slug, _)| *slug == preferred.id)
            .map(|idx| extras.remove(idx).1);
        checks.push(merge_canonical(folded, preferred));
    }
    checks.extend(extras.into_iter().map(|(_, check)| check));
    checks
}

fn model_check(raw: &CandidateCheck) -> Check {
    let title = if raw.title.trim().is_empty() {
        titleize(&slugify(&raw.id))
    } else {
        raw.title.trim().to_string()
    };
    Check {
        id: slugify(if raw.id.trim().is_empty() { &raw.title } else { &raw.id }),
        title,
        status: raw.status,
        severity: raw.severity,
        detail: raw.detail.trim().to_string(),
        fix: raw.fix.trim().to_string(),
        sources: raw.sources.clone(),
    }
}

fn deterministic_checks(lexicon: &Lexicon, corpus: &ScanCorpus) -> Vec<Check> {
    if !corpus.has_text() {
        return unverifiable_set();
    }

    vec![
        substance_check(
            "pork_derivatives",
            "Pork and lard derivatives",
            Severity::High,
            corpus.find_terms(lexicon.halal_pork),
            "no pork or lard derivative vocabulary found",
            "remove or substitute the pork-derived ingredient",
        ),
        substance_check(
            "alcohol_presence",
            "Alcohol presence",
            Severity::High,
            corpus.find_terms(lexicon.halal_alcohol),
            "no alcohol carrier vocabulary found",
            "remove the alcohol carrier or reformulate with a permitted solvent",
        ),
        gelatine_check(lexicon, corpus),
        substance_check(
            "questionable_additives",
            "Questionable additives",
            Severity::Medium,
            corpus.find_terms(lexicon.halal_additives),
            "none of the commonly questioned E-numbers found",
            "confirm the additive's source with the supplier or replace it",
        ),
        certification_check(corpus),
    ]
}

/// Every substance check reads the same way: vocabulary present flags an
/// issue, absence confirms.
fn substance_check(
    id: &str,
    title: &str,
    severity: Severity,
    hits: Vec<&str>,
    clean_detail: &str,
    fix: &str,
) -> Check {
    let mut check = Check {
        id: id.to_string(),
        title: title.to_string(),
        status: CheckStatus::Ok,
        severity: Severity::Low,
        detail: clean_detail.to_string(),
        fix: String::new(),
        sources: vec![HOUSE_SOURCE.to_string()],
    };
    if !hits.is_empty() {
        check.status = CheckStatus::Issue;
        check.severity = severity;
        check.detail = format!("flagged vocabulary found: {}", hits.join(", "));
        check.fix = fix.to_string();
    }
    check
}

fn gelatine_check(lexicon: &Lexicon, corpus: &ScanCorpus) -> Check {
    let mentions = corpus.term_offsets(lexicon.halal_gelatine);
    if mentions.is_empty() {
        return substance_check(
            "animal_gelatine",
            "Animal gelatine",
            Severity::Medium,
            Vec::new(),
            "no gelatine mention found",
            "",
        );
    }

    let qualifiers = corpus.term_offsets(&["halal"]);
    let qualified = mentions.iter().all(|&mention| {
        qualifiers
            .iter()
            .any(|&qualifier| mention.abs_diff(qualifier) <= QUALIFIER_WINDOW)
    });

    let mut check = Check {
        id: "animal_gelatine".to_string(),
        title: "Animal gelatine".to_string(),
        status: CheckStatus::Ok,
        severity: Severity::Low,
        detail: "every gelatine mention carries a halal qualifier".to_string(),
        fix: String::new(),
        sources: vec![HOUSE_SOURCE.to_string()],
    };
    if !qualified {
        check.status = CheckStatus::Issue;
        check.severity = Severity::Medium;
        check.detail = "gelatine mentioned without a halal qualifier".to_string();
        check.fix = "state the gelatine's species and certification, e.g. 'halal bovine gelatine'"
            .to_string();
    }
    check
}

fn certification_check(corpus: &ScanCorpus) -> Check {
    let mentioned = !corpus.find_terms(&["halal", "halal certified", "certified halal"]).is_empty();
    let mut check = Check {
        id: "halal_certification".to_string(),
        title: "Halal certification".to_string(),
        status: CheckStatus::Missing,
        severity: Severity::Low,
        detail: "no halal certification wording found on the label".to_string(),
        fix: "obtain certification from a recognised body and print its mark".to_string(),
        sources: vec![HOUSE_SOURCE.to_string()],
    };
    if mentioned {
        check.status = CheckStatus::Ok;
        check.severity = Severity::Low;
        check.detail =
            "halal wording present; verify the certificate and issuing body".to_string();
        check.fix = String::new();
    }
    check
}

/// Textless evidence makes every substance scan unverifiable.
fn unverifiable_set() -> Vec<Check> {
    let missing = |id: &str, title: &str, severity: Severity| Check {
        id: id.to_string(),
        title: title.to_string(),
        status: CheckStatus::Missing,
        severity,
        detail: "no machine-readable text available to audit".to_string(),
        fix: "provide label text or a readable scan so ingredients can be audited".to_string(),
        sources: vec![HOUSE_SOURCE.to_string()],
    };
    vec![
        missing("pork_derivatives", "Pork and lard derivatives", Severity::Medium),
        missing("alcohol_presence", "Alcohol presence", Severity::Medium),
        missing("animal_gelatine", "Animal gelatine", Severity::Medium),
        missing("questionable_additives", "Questionable additives", Severity::Medium),
        missing("halal_certification", "Halal certification", Severity::Low),
    ]
}

/// Lowercase, non-alphanumerics collapsed to single underscores.
fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

fn titleize(slug: &str) -> String {
    let spaced = slug.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::preflight::domain::ProductFields;
    use crate::preflight::evidence::{BundleSources, EvidenceBundle};

    fn corpus_of(text: &str) -> ScanCorpus {
        let bundle = EvidenceBundle::assemble(
            ProductFields::default(),
            BundleSources::default(),
            &KnowledgeBase::empty(),
        );
        ScanCorpus::build(&bundle, Some(text))
    }

    fn empty_candidate() -> CandidateReport {
        CandidateReport::default()
    }

    fn by_id<'a>(checks: &'a [Check], id: &str) -> &'a Check {
        checks
            .iter()
            .find(|check| check.id == id)
            .unwrap_or_else(|| panic!("missing halal check {id}"))
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Pork / Lard derivatives"), "pork_lard_derivatives");
        assert_eq!(slugify("  Alcohol  "), "alcohol");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn clean_label_passes_substance_checks() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("Ingredients: chickpeas, water, salt. Halal certified.");
        let checks = audit(&lexicon, &corpus, &empty_candidate());

        assert_eq!(by_id(&checks, "pork_derivatives").status, CheckStatus::Ok);
        assert_eq!(by_id(&checks, "alcohol_presence").status, CheckStatus::Ok);
        assert_eq!(by_id(&checks, "halal_certification").status, CheckStatus::Ok);
    }

    #[test]
    fn lard_flags_high_issue() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("Ingredients: flour, lard, salt");
        let checks = audit(&lexicon, &corpus, &empty_candidate());

        let pork = by_id(&checks, "pork_derivatives");
        assert_eq!(pork.status, CheckStatus::Issue);
        assert_eq!(pork.severity, Severity::High);
        assert!(pork.detail.contains("lard"));
    }

    #[test]
    fn unqualified_gelatine_is_an_issue_qualified_is_not() {
        let lexicon = Lexicon::standard();

        let bare = corpus_of("Ingredients: sugar, gelatine, citric acid");
        let checks = audit(&lexicon, &bare, &empty_candidate());
        assert_eq!(by_id(&checks, "animal_gelatine").status, CheckStatus::Issue);

        let qualified = corpus_of("Ingredients: sugar, halal bovine gelatine, citric acid");
        let checks = audit(&lexicon, &qualified, &empty_candidate());
        assert_eq!(by_id(&checks, "animal_gelatine").status, CheckStatus::Ok);
    }

    #[test]
    fn e120_flags_questionable_additive() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("Colour: E120 (cochineal)");
        let checks = audit(&lexicon, &corpus, &empty_candidate());

        let additives = by_id(&checks, "questionable_additives");
        assert_eq!(additives.status, CheckStatus::Issue);
        assert_eq!(additives.severity, Severity::Medium);
    }

    #[test]
    fn textless_corpus_reports_everything_unverifiable() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("");
        let checks = audit(&lexicon, &corpus, &empty_candidate());

        assert_eq!(checks.len(), 5);
        assert!(checks.iter().all(|check| check.status == CheckStatus::Missing));
    }

    #[test]
    fn model_extras_survive_under_slug() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("Ingredients: chickpeas, water");
        let mut candidate = empty_candidate();
        candidate.halal_checks.push(CandidateCheck {
            id: String::new(),
            title: "Cross contamination".to_string(),
            status: CheckStatus::Issue,
            severity: Severity::Medium,
            detail: "shared line with pork products".to_string(),
            fix: "segregate production lines".to_string(),
            sources: Vec::new(),
        });

        let checks = audit(&lexicon, &corpus, &candidate);
        let extra = by_id(&checks, "cross_contamination");
        assert_eq!(extra.status, CheckStatus::Issue);
        assert_eq!(extra.title, "Cross contamination");
    }

    #[test]
    fn deterministic_finding_overrides_model_ok() {
        let lexicon = Lexicon::standard();
        let corpus = corpus_of("Ingredients: flour, lard");
        let mut candidate = empty_candidate();
        candidate.halal_checks.push(CandidateCheck {
            id: "pork_derivatives".to_string(),
            title: "Pork and lard derivatives".to_string(),
            status: CheckStatus::Ok,
            severity: Severity::Low,
            detail: "looks fine".to_string(),
            fix: String::new(),
            sources: Vec::new(),
        });

        let checks = audit(&lexicon, &corpus, &candidate);
        let pork = by_id(&checks, "pork_derivatives");
        assert_eq!(pork.status, CheckStatus::Issue);
        assert_eq!(pork.severity, Severity::High);
    }
}
