//! Release reference parsing.
//!
//! A reference names one published payload for one architecture: either a
//! nightly from the release controller or an officially released version.
//! Parsing resolves the reference to the registry pullspec the payload
//! lives at and validates it against the group.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::arch::{brew_arch_for_go_arch, release_suffix};
use crate::error::{SweepError, SweepResult};
use crate::metadata::GroupMetadata;

/// How the payload was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Nightly,
    Standard,
}

/// An opaque locator for one (architecture, payload) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReference {
    /// Build-system architecture name.
    pub arch: String,

    /// The payload name as given by the caller.
    pub name: String,

    /// Registry pullspec the manifest is fetched from.
    pub pullspec: String,

    pub kind: ReleaseKind,
}

impl ReleaseReference {
    /// Parse a nightly name such as
    /// `4.12.0-0.nightly-arm64-2022-10-25-210451` (arch and `-priv`
    /// segments optional, x86_64 when absent).
    pub fn nightly(name: &str, group: &GroupMetadata) -> SweepResult<Self> {
        let re = Regex::new(
            r"^(?P<major>\d+)\.(?P<minor>\d+)\.\d+-0\.nightly(?P<mods>(?:-[a-z0-9]+)*?)-\d{4}-\d{2}-\d{2}-\d{6}$",
        )
        .expect("static regex");

        let caps = re.captures(name).ok_or_else(|| {
            SweepError::InvalidInput(format!("unrecognized nightly name: {name}"))
        })?;

        check_major_minor(name, &caps["major"], &caps["minor"], group)?;

        let mut go_arch = "amd64";
        let mut private = false;
        for token in caps["mods"].split('-').filter(|t| !t.is_empty()) {
            if token == "priv" {
                private = true;
            } else {
                go_arch = token;
            }
        }
        let arch = brew_arch_for_go_arch(go_arch).to_string();

        let suffix = release_suffix(&arch, private);
        let pullspec = group
            .nightly_pullspec_template
            .replace("{suffix}", &suffix)
            .replace("{name}", name);

        Ok(Self {
            arch,
            name: name.to_string(),
            pullspec,
            kind: ReleaseKind::Nightly,
        })
    }

    /// Parse a standard release name such as `4.8.3-x86_64` or
    /// `4.8.0-rc.3-s390x`.
    pub fn standard(name: &str, group: &GroupMetadata) -> SweepResult<Self> {
        let (version, arch) = name.rsplit_once('-').ok_or_else(|| {
            SweepError::InvalidInput(format!("unrecognized standard release name: {name}"))
        })?;

        let mut parts = version.splitn(3, '.');
        let (major, minor) = match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => (major, minor),
            _ => {
                return Err(SweepError::InvalidInput(format!(
                    "unrecognized version in standard release name: {name}"
                )))
            }
        };
        check_major_minor(name, major, minor, group)?;

        let pullspec = group.standard_pullspec_template.replace("{name}", name);

        Ok(Self {
            arch: arch.to_string(),
            name: name.to_string(),
            pullspec,
            kind: ReleaseKind::Standard,
        })
    }
}

fn check_major_minor(
    name: &str,
    major: &str,
    minor: &str,
    group: &GroupMetadata,
) -> SweepResult<()> {
    if format!("{major}.{minor}") != group.major_minor() {
        return Err(SweepError::InvalidInput(format!(
            "specified release {name} does not match group {}",
            group.major_minor()
        )));
    }
    Ok(())
}

/// Reject reference sets that name the same architecture twice.
pub fn check_unique_arches(refs: &[ReleaseReference]) -> SweepResult<()> {
    let mut seen = std::collections::HashSet::new();
    for r in refs {
        if !seen.insert(r.arch.as_str()) {
            return Err(SweepError::InvalidInput(format!(
                "cannot process {} since another reference already covers {}",
                r.name, r.arch
            )));
        }
    }
    Ok(())
}
