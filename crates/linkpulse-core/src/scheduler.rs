//! Work selection and wave planning.
//!
//! Every source is read page by page in staleness order until it is
//! exhausted or the run cap is collected. Candidates from all sources are
//! merged, re-sorted globally and truncated, so repeated runs always reach
//! the records that have gone unchecked the longest.

use serde::Serialize;

use crate::error::AppError;
use crate::models::LinkRecord;
use crate::traits::RecordSource;

/// Limits applied while building the work queue.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of records checked per run.
    pub run_cap: usize,
    /// Records requested per page from a source.
    pub page_size: usize,
    /// Records probed concurrently in one wave.
    pub wave_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_cap: 500,
            page_size: 1000,
            wave_size: 20,
        }
    }
}

/// What was read from one source while building the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub name: String,
    /// Records in the source, if the count query succeeded.
    pub total: Option<u64>,
    /// Candidates read from the source.
    pub fetched: usize,
    /// Set when the source could not be read.
    pub error: Option<String>,
}

impl SourceReport {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Build the ordered, truncated work queue from all sources.
///
/// A failing source is reported and skipped. Only when every source fails
/// does this return [`AppError::SourceUnavailable`].
pub async fn build_queue<S: RecordSource>(
    sources: &[S],
    config: &SchedulerConfig,
) -> Result<(Vec<LinkRecord>, Vec<SourceReport>), AppError> {
    let mut queue = Vec::new();
    let mut reports = Vec::with_capacity(sources.len());

    for source in sources {
        let report = match read_source(source, config).await {
            Ok((records, total)) => {
                tracing::info!(
                    source = %source.name(),
                    total,
                    fetched = records.len(),
                    "Read candidates from source"
                );
                let fetched = records.len();
                queue.extend(records);
                SourceReport {
                    name: source.name().to_string(),
                    total: Some(total),
                    fetched,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(source = %source.name(), error = %e, "Failed to read source");
                SourceReport {
                    name: source.name().to_string(),
                    total: None,
                    fetched: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    if !reports.is_empty() && reports.iter().all(SourceReport::is_failed) {
        let reasons = reports
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| format!("{}: {e}", r.name)))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::SourceUnavailable(reasons));
    }

    queue.sort_by(LinkRecord::staleness_cmp);
    queue.truncate(config.run_cap);

    Ok((queue, reports))
}

async fn read_source<S: RecordSource>(
    source: &S,
    config: &SchedulerConfig,
) -> Result<(Vec<LinkRecord>, u64), AppError> {
    let total = source.count().await?;
    let page_size = config.page_size.max(1);
    let mut records = Vec::new();
    let mut offset = 0u64;

    while records.len() < config.run_cap {
        let page = source.page(offset, page_size as u64).await?;
        let skipped = page.rows.saturating_sub(page.records.len() as u64);
        if skipped > 0 {
            tracing::warn!(
                source = %source.name(),
                offset,
                skipped,
                "Undecodable rows left out of the queue"
            );
        }
        records.extend(page.records);
        offset += page.rows;

        if page.rows < page_size as u64 {
            break;
        }
    }

    records.truncate(config.run_cap);
    Ok((records, total))
}

/// Split the queue into consecutive waves of at most `wave_size` records.
pub fn plan_waves(queue: Vec<LinkRecord>, wave_size: usize) -> Vec<Vec<LinkRecord>> {
    let wave_size = wave_size.max(1);
    let mut waves = Vec::with_capacity(queue.len().div_ceil(wave_size));
    let mut current = Vec::with_capacity(wave_size);

    for record in queue {
        current.push(record);
        if current.len() == wave_size {
            waves.push(std::mem::replace(&mut current, Vec::with_capacity(wave_size)));
        }
    }
    if !current.is_empty() {
        waves.push(current);
    }
    waves
}
