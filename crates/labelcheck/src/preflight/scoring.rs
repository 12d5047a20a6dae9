//! Deterministic scoring of the final check list.
//!
//! Pure arithmetic over statuses and severities. The model never
//! contributes here; identical check lists always produce identical
//! scores and verdicts.

use crate::preflight::domain::{Check, CheckStatus, OverallStatus, Report, Severity};

const HIGH_PENALTY: i32 = 15;
const MEDIUM_PENALTY: i32 = 8;
const LOW_PENALTY: i32 = 3;

/// Score and verdict for a check list: start at 100, subtract per non-ok
/// finding, clamp to 0..=100. Two high findings fail the label outright,
/// one high or any medium demands caution, low-only degradation passes.
pub fn score_checks(checks: &[Check]) -> (u8, OverallStatus) {
    let mut score: i32 = 100;
    let mut high = 0usize;
    let mut medium = 0usize;

    for check in checks {
        if check.status == CheckStatus::Ok {
            continue;
        }
        match check.severity {
            Severity::High => {
                score -= HIGH_PENALTY;
                high += 1;
            }
            Severity::Medium => {
                score -= MEDIUM_PENALTY;
                medium += 1;
            }
            Severity::Low => score -= LOW_PENALTY,
        }
    }

    let overall = if high >= 2 {
        OverallStatus::Fail
    } else if high >= 1 || medium >= 1 {
        OverallStatus::Caution
    } else {
        OverallStatus::Pass
    };

    (score.clamp(0, 100) as u8, overall)
}

/// Writes the derived score and verdict onto a draft report.
pub fn finalize(report: &mut Report) {
    let (score, overall) = score_checks(&report.checks);
    report.score = score;
    report.overall_status = overall;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::domain::CanonicalCheck;

    fn all_ok() -> Vec<Check> {
        CanonicalCheck::ALL
            .iter()
            .map(|&id| Check::new(id, CheckStatus::Ok, Severity::Low))
            .collect()
    }

    fn set(checks: &mut [Check], idx: usize, status: CheckStatus, severity: Severity) {
        checks[idx].status = status;
        checks[idx].severity = severity;
    }

    #[test]
    fn clean_list_scores_perfect_pass() {
        let (score, overall) = score_checks(&all_ok());
        assert_eq!(score, 100);
        assert_eq!(overall, OverallStatus::Pass);
    }

    #[test]
    fn scoring_is_deterministic() {
        let mut checks = all_ok();
        set(&mut checks, 0, CheckStatus::Issue, Severity::Medium);
        set(&mut checks, 3, CheckStatus::Missing, Severity::High);
        assert_eq!(score_checks(&checks), score_checks(&checks));
    }

    #[test]
    fn penalties_subtract_by_severity() {
        let mut checks = all_ok();
        set(&mut checks, 0, CheckStatus::Missing, Severity::High);
        set(&mut checks, 1, CheckStatus::Issue, Severity::Medium);
        set(&mut checks, 2, CheckStatus::Issue, Severity::Low);
        let (score, overall) = score_checks(&checks);
        assert_eq!(score, 100 - 15 - 8 - 3);
        assert_eq!(overall, OverallStatus::Caution);
    }

    #[test]
    fn two_highs_fail() {
        let mut checks = all_ok();
        set(&mut checks, 3, CheckStatus::Issue, Severity::High);
        set(&mut checks, 4, CheckStatus::Missing, Severity::High);
        let (score, overall) = score_checks(&checks);
        assert_eq!(score, 70);
        assert_eq!(overall, OverallStatus::Fail);
    }

    #[test]
    fn low_only_degradation_still_passes() {
        let mut checks = all_ok();
        set(&mut checks, 5, CheckStatus::Missing, Severity::Low);
        set(&mut checks, 6, CheckStatus::Issue, Severity::Low);
        let (score, overall) = score_checks(&checks);
        assert_eq!(score, 94);
        assert_eq!(overall, OverallStatus::Pass);
    }

    #[test]
    fn score_clamps_at_zero() {
        let mut checks = all_ok();
        for idx in 0..checks.len() {
            set(&mut checks, idx, CheckStatus::Missing, Severity::High);
        }
        let (score, overall) = score_checks(&checks);
        assert_eq!(score, 0);
        assert_eq!(overall, OverallStatus::Fail);
    }

    #[test]
    fn extra_high_finding_strictly_decreases_score_and_never_improves_verdict() {
        let mut checks = all_ok();
        let (base_score, base_overall) = score_checks(&checks);
        assert_eq!(base_overall, OverallStatus::Pass);

        set(&mut checks, 3, CheckStatus::Issue, Severity::High);
        let (one_high, one_overall) = score_checks(&checks);
        assert!(one_high < base_score);
        assert_eq!(one_overall, OverallStatus::Caution);

        set(&mut checks, 9, CheckStatus::Missing, Severity::High);
        let (two_high, two_overall) = score_checks(&checks);
        assert!(two_high < one_high);
        assert_eq!(two_overall, OverallStatus::Fail);
    }

    #[test]
    fn finalize_writes_score_onto_report() {
        let mut checks = all_ok();
        set(&mut checks, 0, CheckStatus::Issue, Severity::Medium);
        let mut report = Report::draft(Default::default(), "summary".to_string(), checks);
        finalize(&mut report);
        assert_eq!(report.score, 92);
        assert_eq!(report.overall_status, OverallStatus::Caution);
    }
}
