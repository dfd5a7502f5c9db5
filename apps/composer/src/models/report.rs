use serde::{Deserialize, Serialize};

/// One weighted dimension of the compliance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    /// 0 – 100.
    pub score: f64,
    /// Fraction of the overall score, e.g. 0.4.
    pub weight: f64,
    /// False when the analysis could not run; the score is then full credit.
    pub available: bool,
    pub findings: Vec<String>,
}

impl SubScore {
    pub fn new(score: f64, weight: f64, findings: Vec<String>) -> Self {
        Self {
            score: score.clamp(0.0, 100.0),
            weight,
            available: true,
            findings,
        }
    }

    /// Fail-open result for an analysis that could not run.
    pub fn unavailable(weight: f64, reason: impl Into<String>) -> Self {
        Self {
            score: 100.0,
            weight,
            available: false,
            findings: vec![format!("analysis unavailable: {}", reason.into())],
        }
    }

    pub fn weighted(&self) -> f64 {
        self.score * self.weight
    }
}

/// Full compliance verdict for a finished graphic.
///
/// A failing score is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// 0 – 100.
    pub overall_score: f64,
    pub passed: bool,
    pub threshold: f64,
    pub color: SubScore,
    pub contrast: SubScore,
    pub policy: SubScore,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ComplianceReport {
    pub fn sub_scores(&self) -> [(&'static str, &SubScore); 3] {
        [
            ("color", &self.color),
            ("contrast", &self.contrast),
            ("policy", &self.policy),
        ]
    }

    pub fn all_findings(&self) -> impl Iterator<Item = &String> {
        self.color
            .findings
            .iter()
            .chain(self.contrast.findings.iter())
            .chain(self.policy.findings.iter())
    }
}
