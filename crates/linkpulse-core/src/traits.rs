use std::future::Future;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{ProbeResult, RecordPage, RecordUpdate};

/// Checks whether a share URL is still alive.
///
/// Implementations must not fail: every transport or parsing problem is
/// reported as an inconclusive [`ProbeResult`] with a reason.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// A queryable, updatable table of link records.
pub trait RecordSource: Send + Sync {
    /// Name used to route write-backs to this source.
    fn name(&self) -> &str;

    /// Total number of records in the source.
    fn count(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Read a page ordered by the last-checked column ascending, never-checked first.
    ///
    /// Rows that cannot be decoded are left out of `records` but still counted
    /// in [`RecordPage::rows`].
    fn page(
        &self,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<RecordPage, AppError>> + Send;

    /// Write the given fields to the record with this id.
    fn update(
        &self,
        id: &str,
        update: &RecordUpdate,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
