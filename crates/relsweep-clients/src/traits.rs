//! Client trait definitions for relsweep
//!
//! These traits define the two external collaborators of the
//! reconciliation core:
//! - `BuildSystemClient`: build records, tag history, and the event log
//! - `PayloadClient`: release payload manifest introspection
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ClientResult;
use crate::records::{BuildRecord, ReleaseManifest};

/// Queries against the build system.
///
/// Guarantees:
/// - `resolve_image` is deterministic given stable upstream state: the same
///   pullspec always maps to the build that produced it.
/// - Event ids are monotonically increasing with time, so
///   `event_at_or_before` is monotone in its argument.
/// - `latest_build` only considers builds tagged into their target before
///   the given event ("completed strictly before" semantics).
///
/// Transient transport failures surface as `ClientError`; no retry logic
/// lives at this layer.
#[async_trait]
pub trait BuildSystemClient: Send + Sync {
    /// Map an image pullspec to the build record that produced it.
    async fn resolve_image(&self, pullspec: &str) -> ClientResult<BuildRecord>;

    /// The most recent build of `package` tagged before `before_event`,
    /// optionally restricted to one distribution target. `None` when the
    /// package has no qualifying build at all.
    async fn latest_build(
        &self,
        package: &str,
        before_event: u64,
        el_target: Option<u8>,
    ) -> ClientResult<Option<BuildRecord>>;

    /// Fetch build records by id. Ids unknown upstream are an error: callers
    /// only pass ids previously returned by this client.
    async fn builds_by_ids(&self, ids: &[u64]) -> ClientResult<Vec<BuildRecord>>;

    /// All RPM builds embedded in the given image builds, as one bulk query.
    /// Duplicates across images/arches may be returned; callers dedup.
    async fn embedded_rpm_builds(&self, image_build_ids: &[u64])
        -> ClientResult<Vec<BuildRecord>>;

    /// The id of the most recent build-system event at or before `instant`.
    /// `None` when the instant predates all known events.
    async fn event_at_or_before(&self, instant: DateTime<Utc>) -> ClientResult<Option<u64>>;
}

/// Release payload introspection.
#[async_trait]
pub trait PayloadClient: Send + Sync {
    /// Fetch and parse the manifest behind a payload pullspec.
    async fn fetch_manifest(&self, pullspec: &str) -> ClientResult<ReleaseManifest>;
}
