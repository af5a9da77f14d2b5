//! Image outlier reconciliation.

use std::collections::{BTreeMap, BTreeSet};

use relsweep_clients::{BuildRecord, BuildSystemClient};
use tracing::{error, info, warn};

use crate::error::{SweepError, SweepResult};
use crate::fetch::ObservedImage;
use crate::metadata::GroupMetadata;

/// How strictly a missing payload component is treated.
///
/// Custom assemblies are not required to cover every architecture or
/// component, so absence is only worth a warning there. Everywhere else it
/// is an error-level diagnostic — still non-fatal, because absence from the
/// input payloads is a labeling gap, not a correctness violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Relaxed,
}

/// Result of the image reconciliation pass.
#[derive(Debug, Default)]
pub struct ImageReconciliation {
    /// The final build per package: observed where consistent or pinned,
    /// the basis-event selection otherwise.
    pub selected: BTreeMap<String, BuildRecord>,

    /// Packages whose observed build must be recorded as an override.
    pub pinned: BTreeSet<String>,

    pub warnings: Vec<String>,
}

/// Compare what the basis event selects against what was observed, for
/// every release-eligible image component in the group.
pub async fn reconcile_images(
    client: &dyn BuildSystemClient,
    group: &GroupMetadata,
    observed: &BTreeMap<String, ObservedImage>,
    basis_event: u64,
    mode: ValidationMode,
) -> SweepResult<ImageReconciliation> {
    let mut result = ImageReconciliation::default();

    for meta in &group.images {
        if meta.base_only || !meta.for_release {
            continue;
        }

        let package = meta.package_name.as_str();
        let basis_build = client
            .latest_build(package, basis_event, None)
            .await?
            .ok_or_else(|| SweepError::NoBuildBeforeBasis {
                package: package.to_string(),
                event: basis_event,
                el_target: None,
            })?;

        if !meta.is_payload {
            // The payloads cannot have informed this component; accept
            // whatever the basis event selects.
            info!(
                component = %meta.key,
                nvr = %basis_build.nvr,
                "non-payload build will be swept by estimated basis event"
            );
            result.selected.insert(package.to_string(), basis_build);
            continue;
        }

        let Some(observed_image) = observed.get(package) else {
            let note = format!(
                "unable to find {} in the specified releases despite it being marked as a \
                 payload component; choosing what the estimated basis event selects: {}",
                meta.key, basis_build.nvr
            );
            match mode {
                ValidationMode::Relaxed => warn!("{note}"),
                ValidationMode::Strict => error!("{note}"),
            }
            result.warnings.push(note);
            result.selected.insert(package.to_string(), basis_build);
            continue;
        };

        if basis_build.nvr == observed_image.build.nvr {
            result
                .selected
                .insert(package.to_string(), observed_image.build.clone());
        } else {
            info!(
                component = %meta.key,
                basis_nvr = %basis_build.nvr,
                observed_nvr = %observed_image.build.nvr,
                "basis event selection differs from the specified releases; pinning"
            );
            result
                .selected
                .insert(package.to_string(), observed_image.build.clone());
            result.pinned.insert(package.to_string());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use relsweep_clients::fakes::MemoryBuildSystem;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 10, 25, h, 0, 0).unwrap()
    }

    fn build(id: u64, package: &str, nvr: &str) -> BuildRecord {
        BuildRecord::new(id, package, nvr, "1", ts(8))
    }

    fn observed_map(entries: &[(&str, BuildRecord)]) -> BTreeMap<String, ObservedImage> {
        entries
            .iter()
            .map(|(tag, b)| {
                (
                    b.package_name.clone(),
                    ObservedImage {
                        tag_name: tag.to_string(),
                        pullspec: format!("quay.io/p@sha256:{}", b.id),
                        build: b.clone(),
                    },
                )
            })
            .collect()
    }

    fn group() -> GroupMetadata {
        serde_yaml::from_str(
            r#"
name: openshift-4.12
major: 4
minor: 12
arches: [x86_64]
images:
  - key: ose-etcd
    package_name: etcd-container
    is_payload: true
  - key: ose-installer-artifacts
    package_name: installer-artifacts-container
  - key: openshift-enterprise-base
    package_name: base-container
    base_only: true
"#,
        )
        .unwrap()
    }

    fn seeded_fake() -> MemoryBuildSystem {
        let fake = MemoryBuildSystem::new();
        // etcd: build 1 visible at event 100, build 2 at event 200.
        fake.add_build(build(1, "etcd-container", "etcd-1"));
        fake.add_build(build(2, "etcd-container", "etcd-2"));
        fake.tag_build(1, None, 100);
        fake.tag_build(2, None, 200);
        // non-payload component
        fake.add_build(build(3, "installer-artifacts-container", "installer-1"));
        fake.tag_build(3, None, 100);
        fake
    }

    #[tokio::test]
    async fn test_matching_observation_is_consistent() {
        let fake = seeded_fake();
        let observed = observed_map(&[("etcd", build(1, "etcd-container", "etcd-1"))]);

        let result = reconcile_images(&fake, &group(), &observed, 150, ValidationMode::Strict)
            .await
            .unwrap();
        assert!(result.pinned.is_empty());
        assert_eq!(result.selected["etcd-container"].nvr, "etcd-1");
        // base_only component is excluded entirely.
        assert!(!result.selected.contains_key("base-container"));
    }

    #[tokio::test]
    async fn test_mismatch_pins_the_observed_build() {
        let fake = seeded_fake();
        // Basis event 250 selects etcd-2, but the payload carried etcd-1.
        let observed = observed_map(&[("etcd", build(1, "etcd-container", "etcd-1"))]);

        let result = reconcile_images(&fake, &group(), &observed, 250, ValidationMode::Strict)
            .await
            .unwrap();
        assert!(result.pinned.contains("etcd-container"));
        assert_eq!(result.selected["etcd-container"].nvr, "etcd-1");
    }

    #[tokio::test]
    async fn test_missing_payload_component_warns_and_accepts_basis() {
        let fake = seeded_fake();
        let result = reconcile_images(
            &fake,
            &group(),
            &BTreeMap::new(),
            150,
            ValidationMode::Relaxed,
        )
        .await
        .unwrap();
        assert!(result.pinned.is_empty());
        assert_eq!(result.selected["etcd-container"].nvr, "etcd-1");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("ose-etcd"));
    }

    #[tokio::test]
    async fn test_non_payload_component_accepts_basis_unconditionally() {
        let fake = seeded_fake();
        // Observed set deliberately carries a different installer build;
        // non-payload components never cross-check against it.
        let observed =
            observed_map(&[("installer", build(9, "installer-artifacts-container", "installer-9"))]);

        let result = reconcile_images(&fake, &group(), &observed, 150, ValidationMode::Strict)
            .await
            .unwrap();
        assert_eq!(
            result.selected["installer-artifacts-container"].nvr,
            "installer-1"
        );
        assert!(result.pinned.is_empty());
    }

    #[tokio::test]
    async fn test_no_build_before_basis_is_fatal() {
        let fake = seeded_fake();
        // Event 50 predates every etcd tagging.
        let err = reconcile_images(&fake, &group(), &BTreeMap::new(), 50, ValidationMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::NoBuildBeforeBasis { .. }));
    }
}
