//! End-to-end sweep scenarios over the in-memory fakes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use relsweep_clients::fakes::{MemoryBuildSystem, MemoryPayloads};
use relsweep_clients::{BuildRecord, BuildSystemClient, ManifestTag, ReleaseManifest};
use relsweep_core::{
    AssemblySweep, GroupMetadata, ReleaseKind, ReleaseReference, SweepError,
};

fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 10, 25, h, m, 0).unwrap()
}

fn group() -> GroupMetadata {
    serde_yaml::from_str(
        r#"
name: openshift-4.12
major: 4
minor: 12
arches: [x86_64, aarch64]
os_tags: [rhel-coreos]
primary_os_tag: rhel-coreos
images:
  - key: ose-etcd
    package_name: etcd-container
    is_payload: true
rpms:
  - key: openshift-clients
    package_name: openshift-clients
"#,
    )
    .unwrap()
}

fn reference(arch: &str, name: &str) -> ReleaseReference {
    ReleaseReference {
        arch: arch.to_string(),
        name: name.to_string(),
        pullspec: format!("registry.ci/{name}"),
        kind: ReleaseKind::Nightly,
    }
}

fn manifest(entries: &[(&str, &str)]) -> ReleaseManifest {
    ReleaseManifest {
        tags: entries
            .iter()
            .map(|(name, pullspec)| ManifestTag {
                name: name.to_string(),
                pullspec: pullspec.to_string(),
            })
            .collect(),
        os_version: "412.86.202210250757-0".to_string(),
    }
}

/// Baseline fixture: one etcd build observed on every arch, completed at
/// 09:00, visible to latest-build queries from event 150; the event log
/// places the basis estimate (09:05) at event 200.
fn seeded() -> (MemoryPayloads, MemoryBuildSystem) {
    let payloads = MemoryPayloads::new();
    let builds = MemoryBuildSystem::new();

    payloads.insert(
        "registry.ci/nightly-x86",
        manifest(&[
            ("etcd", "quay.io/p@sha256:etcd-x86"),
            ("rhel-coreos", "quay.io/p@sha256:os-x86"),
        ]),
    );
    payloads.insert(
        "registry.ci/nightly-arm",
        manifest(&[
            ("etcd", "quay.io/p@sha256:etcd-arm"),
            ("rhel-coreos", "quay.io/p@sha256:os-arm"),
        ]),
    );

    builds.add_build(BuildRecord::new(
        1,
        "etcd-container",
        "etcd-container-4.12-1",
        "1",
        ts(9, 0),
    ));
    // The same build backs both architecture manifests.
    builds.map_image("quay.io/p@sha256:etcd-x86", 1);
    builds.map_image("quay.io/p@sha256:etcd-arm", 1);
    builds.tag_build(1, None, 150);

    builds.add_event(100, ts(8, 0));
    builds.add_event(200, ts(9, 4));
    builds.add_event(300, ts(9, 30));

    // One consistent embedded RPM.
    builds.add_build(BuildRecord::new(
        20,
        "openshift-clients",
        "openshift-clients-4.12.0-2.el8",
        "2.el8",
        ts(8, 30),
    ));
    builds.set_image_rpms(1, vec![20]);
    builds.tag_build(20, Some(8), 150);

    (payloads, builds)
}

/// Scenario A: two architectures, identical builds everywhere. Zero
/// overrides; the basis event covers completion + margin.
#[tokio::test]
async fn test_consistent_releases_produce_no_overrides() {
    let (payloads, builds) = seeded();
    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let result = sweep.run().await.expect("sweep failed");

    // Completion 09:00 + 5m margin = 09:05; event 200 (09:04) is the most
    // recent at or before that instant.
    assert_eq!(result.basis_event, 200);
    assert!(result.image_overrides.is_empty(), "no image overrides expected");
    assert!(result.rpm_overrides.is_empty(), "no rpm overrides expected");
    assert_eq!(result.reference_releases.len(), 2);
    assert_eq!(
        result.os_images["rhel-coreos"]["x86_64"],
        "quay.io/p@sha256:os-x86"
    );
    assert_eq!(result.arches, vec!["x86_64", "aarch64"]);
}

/// Scenario B: the basis event selects a newer build than the payload
/// carries. Exactly one image override pinning the observed build.
#[tokio::test]
async fn test_superseded_image_build_is_pinned() {
    let (payloads, builds) = seeded();
    // A second etcd build completed and was tagged before the basis event,
    // superseding what the payload observed.
    builds.add_build(BuildRecord::new(
        2,
        "etcd-container",
        "etcd-container-4.12-2",
        "2",
        ts(9, 1),
    ));
    builds.tag_build(2, None, 190);

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let result = sweep.run().await.expect("sweep failed");

    assert_eq!(result.image_overrides.len(), 1);
    let pinned = &result.image_overrides[0];
    assert_eq!(pinned.component, "ose-etcd");
    assert_eq!(pinned.nvr, "etcd-container-4.12-1", "observed build wins");
    assert!(!pinned.why.is_empty());
}

/// For a pinned package, the basis-event query result really does differ
/// from the pinned build at the same event.
#[tokio::test]
async fn test_pinned_build_differs_from_basis_query() {
    let (payloads, builds) = seeded();
    builds.add_build(BuildRecord::new(
        2,
        "etcd-container",
        "etcd-container-4.12-2",
        "2",
        ts(9, 1),
    ));
    builds.tag_build(2, None, 190);
    let builds = Arc::new(builds);

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        builds.clone(),
    );
    let result = sweep.run().await.unwrap();

    let basis_selection = builds
        .latest_build("etcd-container", result.basis_event, None)
        .await
        .unwrap()
        .expect("basis query must select something");
    assert_ne!(basis_selection.nvr, result.image_overrides[0].nvr);

    // Idempotence: the same query at the same event selects the same build.
    let again = builds
        .latest_build("etcd-container", result.basis_event, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(basis_selection.id, again.id);
}

/// Scenario C: a payload component entirely absent from the observed
/// payloads, relaxed (custom) mode. Accepted from the basis event with a
/// warning and zero overrides.
#[tokio::test]
async fn test_missing_payload_component_tolerated_for_custom() {
    let (payloads, builds) = seeded();
    let mut group = group();
    group.images.push(relsweep_core::ImageMeta {
        key: "ose-hypothetical".to_string(),
        package_name: "hypothetical-container".to_string(),
        for_release: true,
        base_only: false,
        is_payload: true,
        payload_name: None,
    });
    builds.add_build(BuildRecord::new(
        3,
        "hypothetical-container",
        "hypothetical-container-4.12-7",
        "7",
        ts(8, 45),
    ));
    builds.tag_build(3, None, 120);

    let sweep = AssemblySweep::new(
        "art6731",
        true,
        group,
        // Custom assemblies may cover a subset of the group arches.
        vec![reference("x86_64", "nightly-x86")],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let result = sweep.run().await.expect("custom sweep failed");

    assert!(result.image_overrides.is_empty());
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.contains("ose-hypothetical")),
        "expected a warning about the missing component, got: {:?}",
        result.warnings
    );
    // Only the covered arch survives into the custom arches override.
    assert_eq!(result.arches, vec!["x86_64"]);
}

/// Scenario D: an embedded RPM whose release string carries no
/// distribution target aborts the run before any override list exists.
#[tokio::test]
async fn test_unparseable_distribution_target_is_fatal() {
    let (payloads, builds) = seeded();
    builds.add_build(BuildRecord::new(
        21,
        "openshift-clients",
        "openshift-clients-4.12.0-3",
        "3",
        ts(8, 40),
    ));
    builds.set_image_rpms(1, vec![21]);

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let err = sweep.run().await.unwrap_err();
    assert!(matches!(err, SweepError::UnparseableElTarget { .. }));
}

/// Disparate builds across architectures without an explicit payload-tag
/// declaration abort the run.
#[tokio::test]
async fn test_disparate_builds_without_declaration_are_fatal() {
    let (payloads, builds) = seeded();
    builds.add_build(BuildRecord::new(
        2,
        "etcd-container",
        "etcd-container-4.12-2",
        "2",
        ts(9, 1),
    ));
    // The arm payload now resolves to a different build than x86.
    builds.map_image("quay.io/p@sha256:etcd-arm", 2);

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let err = sweep.run().await.unwrap_err();
    assert!(matches!(err, SweepError::DisparateNvrs { .. }));
}

/// A superseded embedded RPM produces an RPM override keyed by target.
#[tokio::test]
async fn test_superseded_rpm_build_is_pinned() {
    let (payloads, builds) = seeded();
    builds.add_build(BuildRecord::new(
        22,
        "openshift-clients",
        "openshift-clients-4.12.0-3.el8",
        "3.el8",
        ts(8, 50),
    ));
    builds.tag_build(22, Some(8), 180);

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let result = sweep.run().await.expect("sweep failed");

    assert_eq!(result.rpm_overrides.len(), 1);
    let pinned = &result.rpm_overrides[0];
    assert_eq!(pinned.component, "openshift-clients");
    assert_eq!(
        pinned.nvrs,
        BTreeMap::from([(8u8, "openshift-clients-4.12.0-2.el8".to_string())])
    );
}

/// A missing base-OS image for a group architecture is fatal outside
/// custom assemblies.
#[tokio::test]
async fn test_missing_base_os_image_is_fatal_for_standard() {
    let (payloads, builds) = seeded();
    // Replace the arm manifest with one lacking the base-OS tag.
    payloads.insert(
        "registry.ci/nightly-arm",
        manifest(&[("etcd", "quay.io/p@sha256:etcd-arm")]),
    );

    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    );

    let err = sweep.run().await.unwrap_err();
    assert!(matches!(err, SweepError::MissingOsImage { .. }));
}

/// The rendered definition document reflects the sweep outcome.
#[tokio::test]
async fn test_definition_document_round_trip() {
    let (payloads, builds) = seeded();
    let sweep = AssemblySweep::new(
        "4.12.5",
        false,
        group(),
        vec![
            reference("x86_64", "nightly-x86"),
            reference("aarch64", "nightly-arm"),
        ],
        Arc::new(payloads),
        Arc::new(builds),
    )
    .with_previous(vec!["4.12.3".to_string(), "4.12.4".to_string()]);

    let result = sweep.run().await.unwrap();
    let yaml = serde_yaml::to_string(&result.to_definition()).unwrap();

    assert!(yaml.contains("type: standard"));
    assert!(yaml.contains("event: 200"));
    assert!(yaml.contains("nightly-x86"));
    assert!(yaml.contains("upgrades: 4.12.3,4.12.4"));
}
