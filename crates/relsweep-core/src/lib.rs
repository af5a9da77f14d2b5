//! relsweep core library
//!
//! Computes an assembly definition for a set of published per-architecture
//! release payloads: a build-system basis event whose latest-build queries
//! reproduce the observed payload content, plus explicit pinned-build
//! overrides wherever reproduction is impossible.
//!
//! Pipeline: fetch payloads -> merge per-arch observations -> estimate the
//! basis event -> reconcile images -> reconcile embedded RPMs -> assemble.

pub mod arch;
pub mod assembly;
pub mod basis;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod metadata;
pub mod reconcile;
pub mod reference;
pub mod sweep;
pub mod telemetry;

pub use assembly::{
    AssemblyResult, AssemblyType, DefinitionDoc, ImageOverride, RpmOverride,
};
pub use basis::{basis_instant, estimate_basis, BasisEstimate};
pub use error::{SweepError, SweepResult};
pub use fetch::{fetch_payloads, ArchObservations, ObservedImage};
pub use merge::{merge_observed, MergeOutcome};
pub use metadata::{GroupMetadata, ImageMeta, RpmMeta};
pub use reconcile::{
    isolate_el_target, reconcile_images, reconcile_rpms, ImageReconciliation,
    RpmReconciliation, ValidationMode,
};
pub use reference::{check_unique_arches, ReleaseKind, ReleaseReference};
pub use sweep::{AssemblySweep, SweepConfig};
pub use telemetry::init_tracing;

/// relsweep version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
