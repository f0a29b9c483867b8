//! Structured findings
//!
//! A Finding is an immutable record of a deviation from expected
//! behavior. The collector is passed by reference through the
//! coordinator; there is no process-wide list.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

/// Severity of a finding. Ordering is most-severe-first so that sorting
/// a findings list yields the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed deviation. Fields are private; the record cannot be
/// mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    severity: Severity,
    description: String,
    location: String,
    impact: String,
    suggested_remedy: String,
}

impl Finding {
    pub fn new(
        severity: Severity,
        description: impl Into<String>,
        location: impl Into<String>,
        impact: impl Into<String>,
        suggested_remedy: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            description: description.into(),
            location: location.into(),
            impact: impact.into(),
            suggested_remedy: suggested_remedy.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn impact(&self) -> &str {
        &self.impact
    }

    pub fn suggested_remedy(&self) -> &str {
        &self.suggested_remedy
    }
}

/// Accumulates findings during a run. Created once per run and handed
/// down by mutable reference.
#[derive(Debug, Default)]
pub struct FindingsCollector {
    findings: Vec<Finding>,
}

impl FindingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, finding: Finding) {
        match finding.severity() {
            Severity::Critical | Severity::High => error!(
                severity = finding.severity().as_str(),
                location = finding.location(),
                "{}",
                finding.description()
            ),
            Severity::Medium | Severity::Low => warn!(
                severity = finding.severity().as_str(),
                location = finding.location(),
                "{}",
                finding.description()
            ),
        }
        self.findings.push(finding);
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity() == severity).count()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Consume the collector, returning findings sorted most severe
    /// first while preserving discovery order within a severity.
    pub fn into_sorted(self) -> Vec<Finding> {
        let mut findings = self.findings;
        findings.sort_by_key(|f| f.severity());
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, description: &str) -> Finding {
        Finding::new(severity, description, "test", "none", "none")
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
    }

    #[test]
    fn collector_counts_by_severity() {
        let mut collector = FindingsCollector::new();
        collector.record(finding(Severity::High, "a"));
        collector.record(finding(Severity::Low, "b"));
        collector.record(finding(Severity::High, "c"));

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.count(Severity::High), 2);
        assert_eq!(collector.count(Severity::Low), 1);
        assert_eq!(collector.count(Severity::Critical), 0);
    }

    #[test]
    fn into_sorted_is_severity_ordered_and_stable() {
        let mut collector = FindingsCollector::new();
        collector.record(finding(Severity::Low, "first low"));
        collector.record(finding(Severity::Critical, "the critical"));
        collector.record(finding(Severity::Low, "second low"));
        collector.record(finding(Severity::High, "the high"));

        let sorted = collector.into_sorted();
        let descriptions: Vec<&str> = sorted.iter().map(|f| f.description()).collect();
        assert_eq!(descriptions, vec!["the critical", "the high", "first low", "second low"]);
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        let back: Severity = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }
}
