//! Basis event estimation.
//!
//! The build system tags a completed build into its target shortly *after*
//! completion, so querying at the raw completion instant risks missing the
//! tagging and silently selecting an older build. The estimate therefore
//! takes the maximum completion timestamp across every observed build, adds
//! a fixed safety margin, and resolves that instant to the most recent
//! event id at or before it. The margin must stay short enough that no
//! newer build of the same component can also complete inside it.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use relsweep_clients::{BuildRecord, BuildSystemClient};
use tracing::info;

use crate::error::{SweepError, SweepResult};
use crate::fetch::ObservedImage;

/// The estimated snapshot of the build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasisEstimate {
    /// Discrete event id, usable as an upper bound in latest-build queries.
    pub event: u64,

    /// The instant the event id was resolved from.
    pub instant: DateTime<Utc>,
}

/// The instant a basis event must cover: max completion time plus margin.
///
/// Commutative and associative over the input set — adding builds can only
/// move the instant later, never earlier.
pub fn basis_instant<'a, I>(builds: I, margin: Duration) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a BuildRecord>,
{
    builds
        .into_iter()
        .map(|b| b.completed_at + margin)
        .max()
}

/// Resolve the accepted observed builds to a basis event.
pub async fn estimate_basis(
    client: &dyn BuildSystemClient,
    accepted: &BTreeMap<String, ObservedImage>,
    margin: Duration,
) -> SweepResult<BasisEstimate> {
    let instant = basis_instant(accepted.values().map(|o| &o.build), margin).ok_or_else(|| {
        SweepError::InvalidInput(
            "no component builds observed; cannot estimate a basis event".to_string(),
        )
    })?;

    let event = client
        .event_at_or_before(instant)
        .await?
        .ok_or(SweepError::BasisUnavailable { instant })?;

    info!(event, %instant, "estimated basis event");
    Ok(BasisEstimate { event, instant })
}
