//! Assembly result model and the emitted definition document.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The lifecycle type of an assembly, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyType {
    /// A released z-stream version, e.g. "4.12.5".
    Standard,
    /// A feature or release candidate, e.g. "fc.0", "rc.1".
    Candidate,
    /// An engineering candidate, e.g. "ec.2".
    Preview,
    /// An ad-hoc assembly, e.g. "art1234".
    Custom,
}

impl AssemblyType {
    /// Infer the type from the assembly name, unless the caller forced
    /// custom semantics.
    pub fn infer(custom: bool, name: &str) -> Self {
        if custom {
            return AssemblyType::Custom;
        }
        if name.starts_with("ec.") {
            return AssemblyType::Preview;
        }
        if name.starts_with("fc.") || name.starts_with("rc.") {
            return AssemblyType::Candidate;
        }
        let semverish = Regex::new(r"^\d+\.\d+\.\d+").expect("static regex");
        if semverish.is_match(name) {
            AssemblyType::Standard
        } else {
            AssemblyType::Custom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyType::Standard => "standard",
            AssemblyType::Candidate => "candidate",
            AssemblyType::Preview => "preview",
            AssemblyType::Custom => "custom",
        }
    }

    /// Custom assemblies get relaxed conformance checking.
    pub fn is_custom(&self) -> bool {
        matches!(self, AssemblyType::Custom)
    }
}

impl std::fmt::Display for AssemblyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An image component pinned to its observed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOverride {
    pub component: String,
    pub why: String,
    pub nvr: String,
}

/// An RPM component pinned to its observed build(s), per distribution target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpmOverride {
    pub component: String,
    pub why: String,
    /// Pinned NVR by distribution-target major.
    pub nvrs: BTreeMap<u8, String>,
}

/// The aggregate outcome of a sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyResult {
    pub assembly_name: String,
    pub assembly_type: AssemblyType,
    pub basis_event: u64,

    /// Nightly reference names by architecture.
    pub reference_releases: BTreeMap<String, String>,

    /// Base-OS image pullspecs by payload tag, then architecture.
    pub os_images: BTreeMap<String, BTreeMap<String, String>>,

    /// Architectures actually covered by the referenced payloads.
    pub arches: Vec<String>,

    pub image_overrides: Vec<ImageOverride>,
    pub rpm_overrides: Vec<RpmOverride>,

    /// Versions that may upgrade into this assembly.
    pub previous: Vec<String>,

    /// Accumulated non-fatal notes.
    pub warnings: Vec<String>,
}

impl AssemblyResult {
    /// Render the declarative definition document.
    pub fn to_definition(&self) -> DefinitionDoc {
        let group = GroupInfo {
            arches: if self.assembly_type.is_custom() {
                Some(self.arches.clone())
            } else {
                None
            },
            upgrades: if self.previous.is_empty() {
                None
            } else {
                Some(self.previous.join(","))
            },
        };

        let members = MembersDef {
            images: self
                .image_overrides
                .iter()
                .map(|o| MemberDef {
                    component: o.component.clone(),
                    why: o.why.clone(),
                    metadata: MemberMetadataDef {
                        pin: [("nvr".to_string(), o.nvr.clone())].into(),
                    },
                })
                .collect(),
            rpms: self
                .rpm_overrides
                .iter()
                .map(|o| MemberDef {
                    component: o.component.clone(),
                    why: o.why.clone(),
                    metadata: MemberMetadataDef {
                        pin: o
                            .nvrs
                            .iter()
                            .map(|(el, nvr)| (format!("el{el}"), nvr.clone()))
                            .collect(),
                    },
                })
                .collect(),
        };

        let assembly = AssemblyDef {
            kind: self.assembly_type.as_str().to_string(),
            basis: BasisDef {
                event: self.basis_event,
                reference_releases: self.reference_releases.clone(),
            },
            group,
            os_images: self
                .os_images
                .iter()
                .map(|(tag, by_arch)| {
                    (
                        tag.clone(),
                        OsImagesDef {
                            images: by_arch.clone(),
                        },
                    )
                })
                .collect(),
            members,
        };

        DefinitionDoc {
            releases: [(
                self.assembly_name.clone(),
                ReleaseEntry { assembly },
            )]
            .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Definition document (serialized to YAML by the CLI)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDoc {
    pub releases: BTreeMap<String, ReleaseEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub assembly: AssemblyDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyDef {
    #[serde(rename = "type")]
    pub kind: String,
    pub basis: BasisDef,
    #[serde(skip_serializing_if = "GroupInfo::is_empty")]
    pub group: GroupInfo,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub os_images: BTreeMap<String, OsImagesDef>,
    pub members: MembersDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisDef {
    pub event: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reference_releases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Overrides the group's architecture list (custom assemblies that
    /// cover only some arches).
    #[serde(rename = "arches!", skip_serializing_if = "Option::is_none")]
    pub arches: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrades: Option<String>,
}

impl GroupInfo {
    pub fn is_empty(&self) -> bool {
        self.arches.is_none() && self.upgrades.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsImagesDef {
    pub images: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersDef {
    pub images: Vec<MemberDef>,
    pub rpms: Vec<MemberDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDef {
    pub component: String,
    pub why: String,
    pub metadata: MemberMetadataDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberMetadataDef {
    #[serde(rename = "is")]
    pub pin: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_type_inference() {
        assert_eq!(AssemblyType::infer(false, "4.12.5"), AssemblyType::Standard);
        assert_eq!(AssemblyType::infer(false, "4.12.0-0"), AssemblyType::Standard);
        assert_eq!(AssemblyType::infer(false, "rc.1"), AssemblyType::Candidate);
        assert_eq!(AssemblyType::infer(false, "fc.0"), AssemblyType::Candidate);
        assert_eq!(AssemblyType::infer(false, "ec.2"), AssemblyType::Preview);
        assert_eq!(AssemblyType::infer(false, "art1234"), AssemblyType::Custom);
        // The flag forces custom regardless of name shape.
        assert_eq!(AssemblyType::infer(true, "4.12.5"), AssemblyType::Custom);
    }

    fn sample_result() -> AssemblyResult {
        AssemblyResult {
            assembly_name: "4.12.5".to_string(),
            assembly_type: AssemblyType::Standard,
            basis_event: 48392765,
            reference_releases: [(
                "x86_64".to_string(),
                "4.12.0-0.nightly-2022-10-25-210451".to_string(),
            )]
            .into(),
            os_images: [(
                "rhel-coreos".to_string(),
                [("x86_64".to_string(), "quay.io/os@sha256:abc".to_string())].into(),
            )]
            .into(),
            arches: vec!["x86_64".to_string()],
            image_overrides: vec![ImageOverride {
                component: "ose-etcd".to_string(),
                why: "pinned".to_string(),
                nvr: "etcd-container-4.12-1".to_string(),
            }],
            rpm_overrides: vec![RpmOverride {
                component: "openshift-clients".to_string(),
                why: "pinned".to_string(),
                nvrs: [(8u8, "openshift-clients-4.12.0-2.el8".to_string())].into(),
            }],
            previous: vec!["4.12.4".to_string()],
            warnings: vec![],
        }
    }

    #[test]
    fn test_definition_document_shape() {
        let doc = sample_result().to_definition();
        let yaml = serde_yaml::to_string(&doc).expect("serialize definition");

        assert!(yaml.contains("releases:"));
        assert!(yaml.contains("4.12.5"));
        assert!(yaml.contains("type: standard"));
        assert!(yaml.contains("event: 48392765"));
        assert!(yaml.contains("upgrades: 4.12.4"));
        assert!(yaml.contains("el8: openshift-clients-4.12.0-2.el8"));
        assert!(yaml.contains("nvr: etcd-container-4.12-1"));
        // Standard assemblies never emit the arches override.
        assert!(!yaml.contains("arches!"));
    }

    #[test]
    fn test_custom_definition_carries_arches_override() {
        let mut result = sample_result();
        result.assembly_type = AssemblyType::Custom;
        result.previous.clear();
        let yaml = serde_yaml::to_string(&result.to_definition()).unwrap();
        assert!(yaml.contains("arches!"));
        assert!(!yaml.contains("upgrades"));
    }
}
