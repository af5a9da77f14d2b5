//! Record types returned by the client traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed build as recorded by the build system.
///
/// `nvr` is the unique (name, version, release) identifier; `release` is
/// carried separately because distribution-target isolation parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Numeric build id, unique within the build system.
    pub id: u64,

    /// Package name the build belongs to.
    pub package_name: String,

    /// Full name-version-release identifier.
    pub nvr: String,

    /// The release portion of the NVR (e.g. "202210250757.p0.el8").
    pub release: String,

    /// When the build completed.
    pub completed_at: DateTime<Utc>,
}

impl BuildRecord {
    pub fn new(
        id: u64,
        package_name: impl Into<String>,
        nvr: impl Into<String>,
        release: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            package_name: package_name.into(),
            nvr: nvr.into(),
            release: release.into(),
            completed_at,
        }
    }
}

/// One tag inside a fetched payload manifest: a logical component name and
/// the pullable image reference backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTag {
    pub name: String,
    pub pullspec: String,
}

/// A parsed release payload manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// All image tags in the payload.
    pub tags: Vec<ManifestTag>,

    /// The base-OS version advertised by the payload
    /// (e.g. "417.94.202410250757-0").
    pub os_version: String,
}
