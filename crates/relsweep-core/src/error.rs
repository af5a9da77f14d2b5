//! Error taxonomy for the reconciliation core.
//!
//! Everything here is fatal: the run aborts on the first occurrence and no
//! partial assembly definition is produced. Recoverable labeling gaps are
//! surfaced as accumulated warning strings instead, never as errors.

use chrono::{DateTime, Utc};
use relsweep_clients::ClientError;

/// Fatal errors produced while computing an assembly definition.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Caller-supplied options or reference names are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A fetched payload is missing required content.
    #[error("invalid payload {reference}: {reason}")]
    PayloadInvalid { reference: String, reason: String },

    /// Two architectures disagree on a package's build and no explicit
    /// payload tag declaration exists to break the tie.
    #[error(
        "disparate nvrs between releases for {package}: {existing} already recorded, {found} found in {reference}"
    )]
    DisparateNvrs {
        package: String,
        existing: String,
        found: String,
        reference: String,
    },

    /// A package release string carries no recognizable distribution target.
    #[error("unable to isolate distribution target in {nvr}")]
    UnparseableElTarget { nvr: String },

    /// The estimated basis event selects no build at all for a component.
    #[error("no build found for {package} completed before estimated basis event {event}")]
    NoBuildBeforeBasis {
        package: String,
        event: u64,
        el_target: Option<u8>,
    },

    /// The event log has no entry at or before the estimated instant.
    #[error("no build-system event exists at or before {instant}")]
    BasisUnavailable { instant: DateTime<Utc> },

    /// A required base-OS image is absent for an architecture.
    #[error("no base-OS image `{tag}` found for architecture {arch}")]
    MissingOsImage { tag: String, arch: String },

    /// Bubbled-up client failure.
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// Result type for core operations.
pub type SweepResult<T> = std::result::Result<T, SweepError>;
