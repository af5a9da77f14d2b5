//! Cross-architecture merge of observed component builds.
//!
//! Releases for different architectures are expected to carry identical
//! builds for the same package. The merge is a pure, sequential pass over
//! the per-architecture observations (in caller-supplied order), so the
//! tie-break below is deterministic regardless of fetch completion order.
//!
//! Conflict policy when two architectures disagree on a package's build:
//! - the component declares an explicit payload tag name, and the
//!   conflicting observation came from a different tag: ignored, warning;
//! - the declared tag matches: the new observation replaces the previous
//!   one (last explicit match wins);
//! - no declaration: hard error — the release set is genuinely
//!   inconsistent and must not be silently resolved.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{SweepError, SweepResult};
use crate::fetch::{ArchObservations, ObservedImage};
use crate::metadata::GroupMetadata;

/// Result of merging per-architecture observations.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Accepted builds by package name: at most one per package.
    pub accepted: BTreeMap<String, ObservedImage>,

    /// Non-fatal conflict notes, surfaced alongside the final result.
    pub warnings: Vec<String>,
}

/// Merge observations from every architecture into one build per package.
pub fn merge_observed(
    per_arch: &[ArchObservations],
    group: &GroupMetadata,
) -> SweepResult<MergeOutcome> {
    let mut outcome = MergeOutcome::default();

    for observations in per_arch {
        for observed in &observations.images {
            let package = &observed.build.package_name;

            let existing_nvr = match outcome.accepted.get(package) {
                None => {
                    outcome
                        .accepted
                        .insert(package.clone(), observed.clone());
                    continue;
                }
                Some(existing) if existing.build.nvr == observed.build.nvr => continue,
                Some(existing) => existing.build.nvr.clone(),
            };

            let declared = group
                .image_for_package(package)
                .and_then(|meta| meta.payload_name.as_deref());

            match declared {
                Some(payload_name) if observed.tag_name != payload_name => {
                    let note = format!(
                        "ignoring payload tag {} for {package}: payload_name={payload_name} is explicitly declared",
                        observed.tag_name
                    );
                    warn!("{note}");
                    outcome.warnings.push(note);
                }
                Some(payload_name) => {
                    let note = format!(
                        "selecting payload tag {} for {package}: payload_name={payload_name} is explicitly declared",
                        observed.tag_name
                    );
                    warn!("{note}");
                    outcome.warnings.push(note);
                    outcome
                        .accepted
                        .insert(package.clone(), observed.clone());
                }
                None => {
                    return Err(SweepError::DisparateNvrs {
                        package: package.clone(),
                        existing: existing_nvr,
                        found: observed.build.nvr.clone(),
                        reference: observations.reference.clone(),
                    });
                }
            }
        }
    }

    Ok(outcome)
}
