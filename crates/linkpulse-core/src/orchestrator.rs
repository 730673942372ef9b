use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::applier::{apply, outcome_for};
use crate::circuit_breaker::{BreakerConfig, BreakerState};
use crate::error::AppError;
use crate::models::{LinkRecord, Outcome, ProbeResult};
use crate::pacer::Pacer;
use crate::provider::{ProviderRegistry, UNRECOGNIZED_LINK_REASON};
use crate::scheduler::{SchedulerConfig, SourceReport, build_queue, plan_waves};
use crate::traits::RecordSource;

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Started {
        run_id: &'a str,
        started_at: DateTime<Utc>,
    },
    QueueBuilt {
        sources: &'a [SourceReport],
        batch_size: usize,
        waves: usize,
    },
    WaveStarted {
        index: usize,
        total: usize,
        size: usize,
    },
    RecordChecked {
        record: &'a LinkRecord,
        provider: Option<&'a str>,
        result: &'a ProbeResult,
        outcome: Outcome,
    },
    RecordSkipped {
        record: &'a LinkRecord,
        provider: &'a str,
    },
    ProviderTripped {
        provider: &'a str,
        failures: u32,
        last_reason: Option<&'a str>,
    },
    WaveFinished {
        index: usize,
        counts: &'a OutcomeCounts,
    },
    Finished {
        summary: &'a RunSummary,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started { run_id, started_at } => {
                tracing::info!(%run_id, %started_at, "Run started");
            }
            RunEvent::QueueBuilt {
                sources,
                batch_size,
                waves,
            } => {
                for source in sources {
                    match &source.error {
                        None => tracing::info!(
                            source = %source.name,
                            total = ?source.total,
                            fetched = source.fetched,
                            "Records found"
                        ),
                        Some(error) => tracing::warn!(
                            source = %source.name,
                            %error,
                            "Source skipped for this run"
                        ),
                    }
                }
                tracing::info!(%batch_size, %waves, "Work queue ready");
            }
            RunEvent::WaveStarted { index, total, size } => {
                tracing::debug!(%index, %total, %size, "Wave started");
            }
            RunEvent::RecordChecked {
                record,
                provider,
                result,
                outcome,
            } => {
                tracing::info!(
                    id = %record.id,
                    source = %record.source,
                    provider = provider.unwrap_or("-"),
                    verdict = %result.verdict,
                    reason = %result.reason,
                    %outcome,
                    "Checked {}",
                    record.url
                );
            }
            RunEvent::RecordSkipped { record, provider } => {
                tracing::debug!(id = %record.id, %provider, "Skipped, provider breaker open");
            }
            RunEvent::ProviderTripped {
                provider,
                failures,
                last_reason,
            } => {
                tracing::warn!(
                    %provider,
                    failures,
                    last_reason = last_reason.unwrap_or("-"),
                    "Provider tripped, remaining links will be skipped"
                );
            }
            RunEvent::WaveFinished { index, counts } => {
                tracing::debug!(%index, processed = counts.total(), "Wave finished");
            }
            RunEvent::Finished { summary } => {
                tracing::info!(
                    run_id = %summary.run_id,
                    checked = summary.counts.total(),
                    valid = summary.counts.valid,
                    expired = summary.counts.expired,
                    preserved = summary.counts.preserved,
                    skipped = summary.counts.skipped,
                    error = summary.counts.error,
                    "Run finished"
                );
            }
        }
    }
}

/// Per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub valid: usize,
    pub expired: usize,
    pub preserved: usize,
    pub skipped: usize,
    pub error: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Valid => self.valid += 1,
            Outcome::Expired => self.expired += 1,
            Outcome::Preserved => self.preserved += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Error => self.error += 1,
        }
    }

    pub fn get(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::Valid => self.valid,
            Outcome::Expired => self.expired,
            Outcome::Preserved => self.preserved,
            Outcome::Skipped => self.skipped,
            Outcome::Error => self.error,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.expired + self.preserved + self.skipped + self.error
    }
}

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub id: String,
    pub source: String,
    pub url: String,
    pub provider: Option<String>,
    pub outcome: Outcome,
    pub reason: String,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub batch_size: usize,
    pub waves: usize,
    pub counts: OutcomeCounts,
    pub tripped_providers: Vec<String>,
    pub records: Vec<RecordOutcome>,
}

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_id: String,
    pub scheduler: SchedulerConfig,
    pub breaker: BreakerConfig,
    /// Probe without writing results back.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: format!("run-{}", &Uuid::new_v4().to_string()[..8]),
            scheduler: SchedulerConfig::default(),
            breaker: BreakerConfig::default(),
            dry_run: false,
        }
    }
}

impl RunConfig {
    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = id.into();
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Drives scheduler, probes, breaker and applier for one run.
pub struct RunOrchestrator<S, P>
where
    S: RecordSource,
    P: Pacer,
{
    sources: Vec<S>,
    registry: ProviderRegistry,
    pacer: P,
    config: RunConfig,
}

impl<S, P> RunOrchestrator<S, P>
where
    S: RecordSource,
    P: Pacer,
{
    pub fn new(sources: Vec<S>, registry: ProviderRegistry, pacer: P, config: RunConfig) -> Self {
        Self {
            sources,
            registry,
            pacer,
            config,
        }
    }

    /// Execute one full run.
    ///
    /// Fails when two sources share a name or when no source could be read;
    /// every per-record failure is counted in the summary instead.
    pub async fn run<R: RunReporter>(&self, reporter: &R) -> Result<RunSummary, AppError> {
        // Write-backs are routed by source name.
        let mut sources: HashMap<&str, &S> = HashMap::with_capacity(self.sources.len());
        for source in &self.sources {
            if sources.insert(source.name(), source).is_some() {
                return Err(AppError::ConfigError(format!(
                    "Source '{}' is configured more than once",
                    source.name()
                )));
            }
        }

        let started_at = Utc::now();
        reporter.report(RunEvent::Started {
            run_id: &self.config.run_id,
            started_at,
        });

        let breaker = BreakerState::new(self.config.breaker.clone());

        let (queue, source_reports) = build_queue(&self.sources, &self.config.scheduler).await?;
        let batch_size = queue.len();
        let waves = plan_waves(queue, self.config.scheduler.wave_size);
        let wave_count = waves.len();

        reporter.report(RunEvent::QueueBuilt {
            sources: &source_reports,
            batch_size,
            waves: wave_count,
        });

        let mut counts = OutcomeCounts::default();
        let mut records = Vec::with_capacity(batch_size);

        for (index, wave) in waves.iter().enumerate() {
            if index > 0 {
                self.pacer.pause(index + 1).await;
            }
            reporter.report(RunEvent::WaveStarted {
                index: index + 1,
                total: wave_count,
                size: wave.len(),
            });

            let tasks = wave
                .iter()
                .map(|record| self.process_record(record, &sources, &breaker, reporter));
            let mut wave_counts = OutcomeCounts::default();
            for result in join_all(tasks).await {
                wave_counts.add(result.outcome);
                counts.add(result.outcome);
                records.push(result);
            }

            reporter.report(RunEvent::WaveFinished {
                index: index + 1,
                counts: &wave_counts,
            });
        }

        let summary = RunSummary {
            run_id: self.config.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            sources: source_reports,
            batch_size,
            waves: wave_count,
            counts,
            tripped_providers: breaker.tripped_providers(),
            records,
        };
        reporter.report(RunEvent::Finished { summary: &summary });

        Ok(summary)
    }

    async fn process_record<R: RunReporter>(
        &self,
        record: &LinkRecord,
        sources: &HashMap<&str, &S>,
        breaker: &BreakerState,
        reporter: &R,
    ) -> RecordOutcome {
        let entry = self.registry.resolve(&record.url);
        let provider = entry.map(|e| e.name());

        if let Some(provider) = provider
            && breaker.is_tripped(provider)
        {
            reporter.report(RunEvent::RecordSkipped { record, provider });
            return RecordOutcome {
                id: record.id.clone(),
                source: record.source.clone(),
                url: record.url.clone(),
                provider: Some(provider.to_string()),
                outcome: Outcome::Skipped,
                reason: "provider breaker open".to_string(),
            };
        }

        let result = match entry {
            Some(entry) => entry.probe().probe(&record.url).await,
            None => ProbeResult::inconclusive(UNRECOGNIZED_LINK_REASON),
        };

        if let Some(provider) = provider
            && breaker.record(provider, &result)
        {
            let stats = breaker.stats(provider);
            reporter.report(RunEvent::ProviderTripped {
                provider,
                failures: stats.consecutive_inconclusive,
                last_reason: stats.last_reason.as_deref(),
            });
        }

        let outcome = if self.config.dry_run {
            outcome_for(result.verdict)
        } else {
            match sources.get(record.source.as_str()) {
                Some(source) => apply(*source, record, &result, Utc::now()).await,
                None => {
                    tracing::error!(
                        id = %record.id,
                        source = %record.source,
                        "Record belongs to an unknown source"
                    );
                    Outcome::Error
                }
            }
        };

        reporter.report(RunEvent::RecordChecked {
            record,
            provider,
            result: &result,
            outcome,
        });

        RecordOutcome {
            id: record.id.clone(),
            source: record.source.clone(),
            url: record.url.clone(),
            provider: provider.map(str::to_string),
            outcome,
            reason: result.reason,
        }
    }
}
