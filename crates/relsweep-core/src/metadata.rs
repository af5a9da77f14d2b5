//! Group metadata: the component roster relsweep reconciles against.
//!
//! A group describes one release stream: its architectures, the image and
//! RPM components the release team builds for it, and the registry
//! locations payloads are published to. Loaded from YAML by the CLI.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_true() -> bool {
    true
}

fn default_nightly_template() -> String {
    "registry.ci.openshift.org/ocp{suffix}/release{suffix}:{name}".to_string()
}

fn default_standard_template() -> String {
    "quay.io/openshift-release-dev/ocp-release:{name}".to_string()
}

fn default_sweep_tag_template() -> String {
    "rhaos-{el}-candidate".to_string()
}

fn default_el() -> u8 {
    8
}

/// Metadata for one image component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Component key (source repository name, e.g. "ose-etcd").
    pub key: String,

    /// Build-system package name (e.g. "etcd-container").
    pub package_name: String,

    /// Whether the component is destined for release output at all.
    /// Build-scaffolding parents set this false.
    #[serde(default = "default_true")]
    pub for_release: bool,

    /// Parent/base images used only as build scaffolding.
    #[serde(default)]
    pub base_only: bool,

    /// Whether the image ships in the release payload (release-critical).
    #[serde(default)]
    pub is_payload: bool,

    /// Explicitly declared payload tag name. When set, it breaks
    /// cross-architecture build conflicts: only the declared tag is
    /// believed. When unset, conflicts are fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_name: Option<String>,
}

/// Metadata for one RPM component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpmMeta {
    /// Component key (source repository name).
    pub key: String,

    /// Build-system package name.
    pub package_name: String,
}

/// One release stream's component roster and registry layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMetadata {
    /// Group name, e.g. "openshift-4.12".
    pub name: String,

    pub major: u32,
    pub minor: u32,

    /// Architectures the group releases for (build-system names).
    pub arches: Vec<String>,

    /// Payload tags that hold base-OS images rather than component images.
    #[serde(default)]
    pub os_tags: Vec<String>,

    /// The base-OS tag every architecture must provide.
    #[serde(default)]
    pub primary_os_tag: String,

    /// Pullspec template for nightly references; `{suffix}` and `{name}`
    /// are substituted.
    #[serde(default = "default_nightly_template")]
    pub nightly_pullspec_template: String,

    /// Pullspec template for standard (released) references.
    #[serde(default = "default_standard_template")]
    pub standard_pullspec_template: String,

    /// Candidate tag template for latest-build queries; `{el}` is
    /// substituted with the distribution-target major.
    #[serde(default = "default_sweep_tag_template")]
    pub sweep_tag_template: String,

    /// Distribution target image builds are compiled against.
    #[serde(default = "default_el")]
    pub default_el: u8,

    #[serde(default)]
    pub images: Vec<ImageMeta>,

    #[serde(default)]
    pub rpms: Vec<RpmMeta>,
}

impl GroupMetadata {
    /// "major.minor" as released names carry it.
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// The set of payload tag names that hold base-OS images.
    pub fn os_tag_names(&self) -> HashSet<String> {
        self.os_tags.iter().cloned().collect()
    }

    /// Image metadata by build-system package name.
    pub fn image_for_package(&self, package: &str) -> Option<&ImageMeta> {
        self.images.iter().find(|m| m.package_name == package)
    }

    /// RPM metadata by build-system package name.
    pub fn rpm_for_package(&self, package: &str) -> Option<&RpmMeta> {
        self.rpms.iter().find(|m| m.package_name == package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP_YAML: &str = r#"
name: openshift-4.12
major: 4
minor: 12
arches: [x86_64, aarch64]
os_tags: [rhel-coreos, rhel-coreos-extensions]
primary_os_tag: rhel-coreos
images:
  - key: ose-etcd
    package_name: etcd-container
    is_payload: true
  - key: openshift-enterprise-base
    package_name: openshift-enterprise-base-container
    base_only: true
rpms:
  - key: openshift-clients
    package_name: openshift-clients
"#;

    #[test]
    fn test_group_yaml_parses_with_defaults() {
        let group: GroupMetadata = serde_yaml::from_str(GROUP_YAML).expect("parse group yaml");
        assert_eq!(group.major_minor(), "4.12");
        assert_eq!(group.arches.len(), 2);
        assert!(group.os_tag_names().contains("rhel-coreos"));
        assert!(group
            .nightly_pullspec_template
            .contains("registry.ci.openshift.org"));
        assert_eq!(group.default_el, 8);

        let etcd = group.image_for_package("etcd-container").unwrap();
        assert!(etcd.is_payload);
        assert!(etcd.for_release, "for_release defaults to true");
        assert!(etcd.payload_name.is_none());

        let base = group
            .image_for_package("openshift-enterprise-base-container")
            .unwrap();
        assert!(base.base_only);
    }

    #[test]
    fn test_unknown_package_lookups_return_none() {
        let group: GroupMetadata = serde_yaml::from_str(GROUP_YAML).unwrap();
        assert!(group.image_for_package("not-ours-container").is_none());
        assert!(group.rpm_for_package("bash").is_none());
    }
}
