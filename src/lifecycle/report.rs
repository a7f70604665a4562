//! Batch result of a lifecycle sweep.

use crate::errors::CertKeeperError;

/// Outcome of one sweep.
///
/// `skipped` lists domains that needed no change: not revoked, or deleted
/// or renewed by another operation before their lock was acquired.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, CertKeeperError)>,
    pub skipped: Vec<String>,
}

/// Per-domain result fed into a report
#[derive(Debug)]
pub(crate) enum Outcome {
    Succeeded,
    Skipped,
    Failed(CertKeeperError),
}

impl SweepReport {
    pub(crate) fn record(&mut self, domain: String, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded.push(domain),
            Outcome::Skipped => self.skipped.push(domain),
            Outcome::Failed(err) => self.failed.push((domain, err)),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Sort every list by domain name
    pub fn sorted(mut self) -> Self {
        self.succeeded.sort();
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    /// Fold another sweep's results into this one
    pub fn merge(&mut self, other: SweepReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_sort() {
        let mut report = SweepReport::default();
        report.record("b.example.com".to_string(), Outcome::Succeeded);
        report.record("a.example.com".to_string(), Outcome::Succeeded);
        report.record("c.example.com".to_string(), Outcome::Skipped);
        report.record(
            "d.example.com".to_string(),
            Outcome::Failed(CertKeeperError::issuance("d.example.com", "CA unavailable")),
        );

        let report = report.sorted();
        assert_eq!(report.succeeded, vec!["a.example.com", "b.example.com"]);
        assert_eq!(report.skipped, vec!["c.example.com"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.total(), 4);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_merge() {
        let mut first = SweepReport { succeeded: vec!["a".into()], ..Default::default() };
        let second = SweepReport { skipped: vec!["b".into()], ..Default::default() };
        first.merge(second);
        assert_eq!(first.total(), 2);
        assert!(first.is_clean());
    }
}
