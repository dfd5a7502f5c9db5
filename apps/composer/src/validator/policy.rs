use crate::models::SubScore;

const PENALTY_PER_VIOLATION: f64 = 10.0;

/// Policy sub-score plus what it was built from.
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub sub_score: SubScore,
    pub term_violations: usize,
    pub logo_violation: bool,
}

/// Case-insensitive substring scan of rendered copy for forbidden terms,
/// plus the logo safe-zone check.
///
/// A term counts once per copy field it appears in. A logo that broke its
/// safe zone is one more violation; `None` means no logo was placed. The
/// score drops by 10 per violation, floored at 0.
pub fn score_policy(
    copy: &[(String, String)],
    forbidden_terms: &[String],
    logo_safe_zone: Option<bool>,
    safe_zone_px: u32,
    weight: f64,
) -> PolicyOutcome {
    let mut findings = Vec::new();
    for (field, text) in copy {
        let haystack = text.to_lowercase();
        for term in forbidden_terms {
            let needle = term.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            if haystack.contains(&needle) {
                findings.push(format!("Forbidden term '{}' found in {field}", term.trim()));
            }
        }
    }
    let term_violations = findings.len();

    let logo_violation = logo_safe_zone == Some(false);
    if logo_violation {
        findings.push(format!("Logo placement breaks the {safe_zone_px}px safe zone"));
    }

    let score = (100.0 - PENALTY_PER_VIOLATION * findings.len() as f64).max(0.0);
    PolicyOutcome {
        sub_score: SubScore::new(score, weight, findings),
        term_violations,
        logo_violation,
    }
}
