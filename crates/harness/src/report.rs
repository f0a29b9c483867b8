//! Run report aggregation and persistence

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::HarnessResult;
use crate::findings::{Finding, Severity};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Aggregate of one full workflow execution. Created once at the end of
/// the run and written in a single pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: i64,
    pub duration_ms: u64,
    pub success: bool,
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
}

impl RunReport {
    /// Build a report from severity-sorted findings.
    pub fn new(findings: Vec<Finding>, duration: Duration) -> Self {
        let mut counts = SeverityCounts::default();
        for finding in &findings {
            match finding.severity() {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            duration_ms: duration.as_millis() as u64,
            success: findings.is_empty(),
            counts,
            findings,
        }
    }

    /// Write the report as JSON into `dir`, returning the file path.
    pub fn write_json(&self, dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("run-report.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!("Run report written to {}", path.display());
        Ok(path)
    }

    /// Human-readable summary, severity-sorted.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.success {
            let _ = writeln!(out, "Run passed: no findings ({} ms)", self.duration_ms);
            return out;
        }
        let _ = writeln!(
            out,
            "Run finished with {} finding(s) in {} ms ({} critical, {} high, {} medium, {} low)",
            self.counts.total(),
            self.duration_ms,
            self.counts.critical,
            self.counts.high,
            self.counts.medium,
            self.counts.low,
        );
        for (i, finding) in self.findings.iter().enumerate() {
            let _ = writeln!(out, "\n#{} [{}] {}", i + 1, finding.severity(), finding.description());
            let _ = writeln!(out, "  location: {}", finding.location());
            let _ = writeln!(out, "  impact:   {}", finding.impact());
            let _ = writeln!(out, "  remedy:   {}", finding.suggested_remedy());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::FindingsCollector;

    #[test]
    fn empty_findings_mean_success() {
        let report = RunReport::new(Vec::new(), Duration::from_millis(1200));
        assert!(report.success);
        assert_eq!(report.counts.total(), 0);
        assert!(report.render_text().contains("no findings"));
    }

    #[test]
    fn counts_track_severities() {
        let mut collector = FindingsCollector::new();
        collector.record(Finding::new(Severity::Critical, "a", "x", "i", "r"));
        collector.record(Finding::new(Severity::High, "b", "x", "i", "r"));
        collector.record(Finding::new(Severity::High, "c", "x", "i", "r"));
        collector.record(Finding::new(Severity::Low, "d", "x", "i", "r"));

        let report = RunReport::new(collector.into_sorted(), Duration::from_secs(3));
        assert!(!report.success);
        assert_eq!(report.counts.critical, 1);
        assert_eq!(report.counts.high, 2);
        assert_eq!(report.counts.medium, 0);
        assert_eq!(report.counts.low, 1);
        assert_eq!(report.counts.total(), 4);
    }

    #[test]
    fn report_round_trips_through_json_file() {
        let mut collector = FindingsCollector::new();
        collector.record(Finding::new(
            Severity::High,
            "state never advanced",
            "waiter dashboard",
            "desync",
            "check backend workers",
        ));
        let report = RunReport::new(collector.into_sorted(), Duration::from_millis(500));

        let dir = tempfile::tempdir().unwrap();
        let path = report.write_json(dir.path()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: RunReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.counts.high, 1);
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].description(), "state never advanced");
    }
}
