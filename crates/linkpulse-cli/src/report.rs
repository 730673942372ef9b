use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use linkpulse_core::RunSummary;
use linkpulse_core::models::Outcome;

/// Human-readable run summary for stdout.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let elapsed = (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0;

    let _ = writeln!(out, "Run {}", summary.run_id);
    let _ = writeln!(
        out,
        "  started:  {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "  duration: {elapsed:.1}s");

    let _ = writeln!(out, "\nSources:");
    for source in &summary.sources {
        match (&source.error, source.total) {
            (Some(error), _) => {
                let _ = writeln!(out, "  {:<20} FAILED ({error})", source.name);
            }
            (None, Some(total)) => {
                let _ = writeln!(
                    out,
                    "  {:<20} {total} records, {} queued",
                    source.name, source.fetched
                );
            }
            (None, None) => {
                let _ = writeln!(out, "  {:<20} {} queued", source.name, source.fetched);
            }
        }
    }

    let _ = writeln!(
        out,
        "\nBatch: {} records in {} waves",
        summary.batch_size, summary.waves
    );

    let _ = writeln!(out, "\nOutcomes:");
    for outcome in [
        Outcome::Valid,
        Outcome::Expired,
        Outcome::Preserved,
        Outcome::Skipped,
        Outcome::Error,
    ] {
        let _ = writeln!(
            out,
            "  {:<10} {}",
            outcome.as_str(),
            summary.counts.get(outcome)
        );
    }

    if summary.tripped_providers.is_empty() {
        let _ = writeln!(out, "\nTripped providers: none");
    } else {
        let _ = writeln!(
            out,
            "\nTripped providers: {}",
            summary.tripped_providers.join(", ")
        );
    }

    out
}

/// Write one CSV row per processed record.
pub fn write_csv(summary: &RunSummary, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;

    for record in &summary.records {
        writer
            .serialize(record)
            .context("Failed to write report row")?;
    }
    writer.flush().context("Failed to flush report")?;

    tracing::info!(path = %path.display(), rows = summary.records.len(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use linkpulse_core::orchestrator::{OutcomeCounts, RecordOutcome};
    use linkpulse_core::scheduler::SourceReport;

    use super::*;

    fn summary() -> RunSummary {
        let started_at = Utc.with_ymd_and_hms(2024, 8, 1, 3, 0, 0).unwrap();
        let mut counts = OutcomeCounts::default();
        counts.add(Outcome::Valid);
        counts.add(Outcome::Skipped);

        RunSummary {
            run_id: "run-test".into(),
            started_at,
            finished_at: started_at + Duration::milliseconds(2500),
            sources: vec![
                SourceReport {
                    name: "links".into(),
                    total: Some(120),
                    fetched: 2,
                    error: None,
                },
                SourceReport {
                    name: "resources".into(),
                    total: None,
                    fetched: 0,
                    error: Some("HTTP 503".into()),
                },
            ],
            batch_size: 2,
            waves: 1,
            counts,
            tripped_providers: vec!["baidu".into()],
            records: vec![
                RecordOutcome {
                    id: "1".into(),
                    source: "links".into(),
                    url: "https://pan.quark.cn/s/a".into(),
                    provider: Some("quark".into()),
                    outcome: Outcome::Valid,
                    reason: "share ok, 3 entries".into(),
                },
                RecordOutcome {
                    id: "2".into(),
                    source: "links".into(),
                    url: "https://example.com/x".into(),
                    provider: None,
                    outcome: Outcome::Skipped,
                    reason: "provider tripped".into(),
                },
            ],
        }
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&summary());

        assert!(text.contains("Run run-test"));
        assert!(text.contains("2024-08-01 03:00:00 UTC"));
        assert!(text.contains("duration: 2.5s"));
        assert!(text.contains("120 records, 2 queued"));
        assert!(text.contains("FAILED (HTTP 503)"));
        assert!(text.contains("Batch: 2 records in 1 waves"));
        assert!(text.contains("valid      1"));
        assert!(text.contains("expired    0"));
        assert!(text.contains("Tripped providers: baidu"));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        write_csv(&summary(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,source,url,provider,outcome,reason");
        assert_eq!(
            lines[1],
            "1,links,https://pan.quark.cn/s/a,quark,valid,\"share ok, 3 entries\""
        );
        assert_eq!(lines[2], "2,links,https://example.com/x,,skipped,provider tripped");
    }

    #[test]
    fn test_write_csv_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.csv");
        assert!(write_csv(&summary(), &path).is_err());
    }
}
