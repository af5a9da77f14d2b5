//! Previous-list calculation against the upgrade-graph service.
//!
//! An assembly may declare which released versions can upgrade into it.
//! The list is the union of an optional in-flight release, explicitly
//! supplied versions, and (with `--auto-previous`) every version with an
//! upgrade edge into the target in the graph service's channels, sorted
//! ascending and deduplicated.

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use relsweep_core::arch::go_arch_for_brew_arch;
use relsweep_core::AssemblyType;

/// A release version with ordering semantics: numeric on
/// major/minor/patch, with pre-releases sorting before the release.
/// Equality follows the ordering, not the raw string.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<String>,
    raw: String,
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (s, None),
        };
        let mut parts = core.splitn(3, '.');
        let parse = |part: Option<&str>| -> Result<u64> {
            part.context("missing version component")?
                .parse()
                .with_context(|| format!("unparseable version: {s}"))
        };
        Ok(Self {
            major: parse(parts.next())?,
            minor: parse(parts.next())?,
            patch: parse(parts.next())?,
            pre,
            raw: s.to_string(),
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => std::cmp::Ordering::Equal,
                // A release sorts after its own pre-releases.
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Version {}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Client for a Cincinnati-style upgrade-graph service.
pub struct UpgradeGraphClient {
    http: reqwest::Client,
    graph_url: String,
}

impl UpgradeGraphClient {
    pub fn new(graph_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("relsweep/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            graph_url: graph_url.into(),
        }
    }

    /// Every version with an upgrade edge into `target` in the given
    /// channels, for one architecture.
    pub async fn previous_for(
        &self,
        target: &str,
        go_arch: &str,
        channels: &[String],
    ) -> Result<Vec<String>> {
        let mut out = BTreeSet::new();
        for channel in channels {
            let graph: Value = self
                .http
                .get(&self.graph_url)
                .query(&[("channel", channel.as_str()), ("arch", go_arch)])
                .header("Accept", "application/json")
                .send()
                .await
                .with_context(|| format!("querying upgrade graph channel {channel}"))?
                .error_for_status()
                .with_context(|| format!("upgrade graph channel {channel}"))?
                .json()
                .await
                .with_context(|| format!("parsing upgrade graph channel {channel}"))?;
            out.extend(previous_from_graph(&graph, target));
        }
        Ok(out.into_iter().collect())
    }
}

/// Extract the versions with an edge into `target` from one graph document.
pub fn previous_from_graph(graph: &Value, target: &str) -> Vec<String> {
    let Some(nodes) = graph.get("nodes").and_then(Value::as_array) else {
        return Vec::new();
    };
    let versions: Vec<&str> = nodes
        .iter()
        .map(|n| n.get("version").and_then(Value::as_str).unwrap_or_default())
        .collect();

    let Some(edges) = graph.get("edges").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for edge in edges {
        let Some(pair) = edge.as_array() else { continue };
        let (Some(from), Some(to)) = (
            pair.first().and_then(Value::as_u64),
            pair.get(1).and_then(Value::as_u64),
        ) else {
            continue;
        };
        if versions.get(to as usize).copied() == Some(target) {
            if let Some(version) = versions.get(from as usize) {
                out.push(version.to_string());
            }
        }
    }
    out
}

/// The version string to query the graph for, derived from the assembly
/// name. Candidates and previews are published as pre-releases of the
/// group's `X.Y.0`.
pub fn graph_version_for_assembly(
    assembly_type: AssemblyType,
    assembly_name: &str,
    major_minor: &str,
) -> String {
    match assembly_type {
        AssemblyType::Candidate | AssemblyType::Preview => {
            format!("{major_minor}.0-{assembly_name}")
        }
        _ => assembly_name.to_string(),
    }
}

/// Merge in-flight, explicit, and auto-calculated previous versions into
/// one sorted, deduplicated list.
pub async fn calculate_previous(
    graph_version: &str,
    arches: &[String],
    in_flight: Option<&str>,
    explicit: &[String],
    auto: bool,
    major_minor: &str,
    client: &UpgradeGraphClient,
) -> Result<Vec<String>> {
    let mut versions: BTreeSet<Version> = BTreeSet::new();
    if let Some(v) = in_flight {
        versions.insert(v.parse()?);
    }

    if !explicit.is_empty() {
        for v in explicit {
            versions.insert(v.parse()?);
        }
    } else if auto {
        let channels = vec![
            format!("candidate-{major_minor}"),
            format!("fast-{major_minor}"),
            format!("stable-{major_minor}"),
        ];
        for arch in arches {
            info!(arch = %arch, "calculating previous list");
            let found = client
                .previous_for(graph_version, go_arch_for_brew_arch(arch), &channels)
                .await?;
            for v in found {
                versions.insert(v.parse()?);
            }
        }
    }

    Ok(versions.into_iter().map(|v| v.to_string()).collect())
}
