//! Verification results.

use serde::{Deserialize, Serialize};

/// Result of one check of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Scenario (or streams check) name.
    pub case_name: String,
    /// Which check produced this result: `model`, `process` or `streams`.
    pub check: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// Diff if the case failed.
    pub diff: Option<String>,
}

impl VerificationResult {
    /// Compare `expected` with `actual` and attach a diff on mismatch.
    #[must_use]
    pub fn compare(
        case_name: impl Into<String>,
        check: impl Into<String>,
        expected: String,
        actual: String,
    ) -> Self {
        let passed = expected == actual;
        let diff = (!passed).then(|| crate::diff::render_diff(&expected, &actual));
        Self {
            case_name: case_name.into(),
            check: check.into(),
            passed,
            expected,
            actual,
            diff,
        }
    }
}

/// Aggregate verification summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Failing results only.
    pub fn failures(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_attaches_diff_only_on_mismatch() {
        let ok = VerificationResult::compare("a", "model", "x".into(), "x".into());
        assert!(ok.passed);
        assert!(ok.diff.is_none());

        let bad = VerificationResult::compare("b", "model", "x".into(), "y".into());
        assert!(!bad.passed);
        assert!(bad.diff.unwrap().contains("-x"));
    }

    #[test]
    fn summary_counts() {
        let summary = VerificationSummary::from_results(vec![
            VerificationResult::compare("a", "model", "x".into(), "x".into()),
            VerificationResult::compare("b", "process", "x".into(), "z".into()),
        ]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures().next().unwrap().case_name, "b");
    }
}
