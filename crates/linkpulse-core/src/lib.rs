pub mod applier;
pub mod circuit_breaker;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pacer;
pub mod provider;
pub mod scheduler;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use models::{
    LinkRecord, LinkStatus, Outcome, ProbeResult, RecordPage, RecordUpdate, SourceSpec, Verdict,
};
pub use orchestrator::{RunConfig, RunOrchestrator, RunSummary, TracingRunReporter};
pub use provider::ProviderRegistry;
pub use traits::{Probe, RecordSource};
