//! RPM outlier reconciliation.
//!
//! Runs after the image pass has finalized its build set: the RPMs to check
//! are exactly the ones embedded in the accepted image builds. A package
//! may legitimately ship distinct builds per distribution target, so
//! outcomes are keyed by (package, el major).

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use relsweep_clients::{BuildRecord, BuildSystemClient};
use tracing::{debug, info};

use crate::error::{SweepError, SweepResult};
use crate::metadata::GroupMetadata;

/// Result of the RPM reconciliation pass.
#[derive(Debug, Default)]
pub struct RpmReconciliation {
    /// Observed builds by package, then by distribution-target major.
    pub selected: BTreeMap<String, BTreeMap<u8, BuildRecord>>,

    /// Packages with at least one target whose observed build the basis
    /// event does not reproduce.
    pub pinned: BTreeSet<String>,
}

/// Extract the distribution-target major from a release string
/// (e.g. "2.el8" -> 8). `None` when the release carries no target.
pub fn isolate_el_target(release: &str) -> Option<u8> {
    let re = Regex::new(r"\.el(\d+)").expect("static regex");
    re.captures(release)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Check every RPM embedded in the accepted image builds against the
/// estimated basis event.
pub async fn reconcile_rpms(
    client: &dyn BuildSystemClient,
    group: &GroupMetadata,
    image_build_ids: &[u64],
    basis_event: u64,
) -> SweepResult<RpmReconciliation> {
    let embedded = client.embedded_rpm_builds(image_build_ids).await?;
    info!(
        count = embedded.len(),
        "checking embedded RPM builds against estimated basis event"
    );

    let mut result = RpmReconciliation::default();

    for rpm_build in embedded {
        let Some(meta) = group.rpm_for_package(&rpm_build.package_name) else {
            // Third-party package; not ours to pin.
            continue;
        };

        let el_target = isolate_el_target(&rpm_build.release).ok_or_else(|| {
            SweepError::UnparseableElTarget {
                nvr: rpm_build.nvr.clone(),
            }
        })?;

        let targets = result
            .selected
            .entry(rpm_build.package_name.clone())
            .or_default();
        if targets.contains_key(&el_target) {
            // Same (package, target) from another image/arch; expected to be
            // identical, first observation wins.
            debug!(nvr = %rpm_build.nvr, el_target, "duplicate embedded build skipped");
            continue;
        }

        let basis_build = client
            .latest_build(&rpm_build.package_name, basis_event, Some(el_target))
            .await?
            .ok_or_else(|| SweepError::NoBuildBeforeBasis {
                package: rpm_build.package_name.clone(),
                event: basis_event,
                el_target: Some(el_target),
            })?;

        info!(
            component = %meta.key,
            nvr = %basis_build.nvr,
            el_target,
            "build selected by scan against estimated basis event"
        );

        if basis_build.nvr != rpm_build.nvr {
            info!(
                component = %meta.key,
                basis_nvr = %basis_build.nvr,
                observed_nvr = %rpm_build.nvr,
                "basis event selection differs from the specified releases; pinning"
            );
            result.pinned.insert(rpm_build.package_name.clone());
        }
        targets.insert(el_target, rpm_build);
    }

    Ok(result)
}
