use chrono::{DateTime, Utc};

use crate::models::{LinkRecord, LinkStatus, Outcome, ProbeResult, RecordUpdate, Verdict};
use crate::traits::RecordSource;

/// Fields to write for a verdict.
///
/// The check timestamp always moves to `now`; the status only changes for a
/// definitive verdict so a flaky provider never erases a known-good status.
pub fn update_for(verdict: Verdict, now: DateTime<Utc>) -> RecordUpdate {
    let status = match verdict {
        Verdict::Live => Some(LinkStatus::Valid),
        Verdict::Dead => Some(LinkStatus::Expired),
        Verdict::Inconclusive => None,
    };
    RecordUpdate {
        status,
        last_checked: now,
    }
}

/// Outcome counted for a verdict that was written successfully.
pub fn outcome_for(verdict: Verdict) -> Outcome {
    match verdict {
        Verdict::Live => Outcome::Valid,
        Verdict::Dead => Outcome::Expired,
        Verdict::Inconclusive => Outcome::Preserved,
    }
}

/// Persist a probe result to the record's source.
///
/// A failed write is logged and classified as [`Outcome::Error`]; it never
/// propagates to sibling records.
pub async fn apply<S: RecordSource>(
    source: &S,
    record: &LinkRecord,
    result: &ProbeResult,
    now: DateTime<Utc>,
) -> Outcome {
    let update = update_for(result.verdict, now);

    match source.update(&record.id, &update).await {
        Ok(()) => outcome_for(result.verdict),
        Err(e) => {
            tracing::error!(
                source = %source.name(),
                id = %record.id,
                error = %e,
                "Failed to write check result"
            );
            Outcome::Error
        }
    }
}
