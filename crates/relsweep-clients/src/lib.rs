//! relsweep-clients: backends for the relsweep reconciliation core
//!
//! This crate isolates all I/O with external systems behind async traits:
//!
//! - `BuildSystemClient`: queries against the build system (builds, tag
//!   history, the event log)
//! - `PayloadClient`: release payload introspection (manifest fetch)
//!
//! Production backends shell out to the vendor CLIs (`brew`, `oc`); the
//! `fakes` module provides in-memory implementations that satisfy the same
//! contracts for testing.

mod error;
pub mod brew_cli;
pub mod fakes;
pub mod oc;
mod records;
pub mod traits;

pub use brew_cli::{BrewCliClient, BrewCliConfig};
pub use error::{ClientError, ClientResult};
pub use oc::OcPayloadClient;
pub use records::{BuildRecord, ManifestTag, ReleaseManifest};
pub use traits::{BuildSystemClient, PayloadClient};
