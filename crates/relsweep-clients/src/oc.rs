//! Payload introspection via the `oc` CLI.
//!
//! Fetches `oc adm release info <pullspec> -o=json` and extracts the image
//! tag list plus the base-OS version field. Pure data fetch; validation of
//! tag contents belongs to the core.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::records::{ManifestTag, ReleaseManifest};
use crate::traits::PayloadClient;

/// `PayloadClient` backed by the `oc` binary.
pub struct OcPayloadClient {
    oc_bin: String,
    timeout_secs: u64,
}

impl Default for OcPayloadClient {
    fn default() -> Self {
        Self {
            oc_bin: "oc".to_string(),
            timeout_secs: 120,
        }
    }
}

impl OcPayloadClient {
    pub fn new(oc_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            oc_bin: oc_bin.into(),
            timeout_secs,
        }
    }

    async fn run_oc(&self, args: &[&str]) -> ClientResult<Vec<u8>> {
        let rendered = format!("{} {}", self.oc_bin, args.join(" "));
        debug!(command = %rendered, "running oc");

        let child = Command::new(&self.oc_bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ClientError::Timeout {
            command: rendered.clone(),
            secs: self.timeout_secs,
        })??;

        if !output.status.success() {
            return Err(ClientError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl PayloadClient for OcPayloadClient {
    async fn fetch_manifest(&self, pullspec: &str) -> ClientResult<ReleaseManifest> {
        let stdout = self
            .run_oc(&["adm", "release", "info", pullspec, "-o=json"])
            .await?;
        parse_release_info(pullspec, &stdout)
    }
}

/// Parse the JSON emitted by `oc adm release info -o=json`.
pub(crate) fn parse_release_info(pullspec: &str, raw: &[u8]) -> ClientResult<ReleaseManifest> {
    let info: serde_json::Value = serde_json::from_slice(raw)?;
    let context = format!("release info for {pullspec}");

    let tag_values = info
        .pointer("/references/spec/tags")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ClientError::MissingField {
            context: context.clone(),
            field: "references.spec.tags".to_string(),
        })?;

    let mut tags = Vec::with_capacity(tag_values.len());
    for tag in tag_values {
        let name = tag
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::MissingField {
                context: context.clone(),
                field: "tag.name".to_string(),
            })?;
        let from = tag
            .pointer("/from/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::MissingField {
                context: context.clone(),
                field: "tag.from.name".to_string(),
            })?;
        tags.push(ManifestTag {
            name: name.to_string(),
            pullspec: from.to_string(),
        });
    }

    let os_version = info
        .pointer("/displayVersions/machine-os/Version")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ClientError::MissingField {
            context,
            field: "displayVersions.machine-os.Version".to_string(),
        })?;

    Ok(ReleaseManifest {
        tags,
        os_version: os_version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "references": {
            "spec": {
                "tags": [
                    {"name": "etcd", "from": {"name": "quay.io/pool@sha256:aaa"}},
                    {"name": "rhel-coreos", "from": {"name": "quay.io/pool@sha256:bbb"}}
                ]
            }
        },
        "displayVersions": {
            "machine-os": {"Version": "412.86.202210250757-0"}
        }
    }"#;

    #[test]
    fn test_parse_release_info_extracts_tags_and_os_version() {
        let manifest = parse_release_info("quay.io/release:x", SAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.tags.len(), 2);
        assert_eq!(manifest.tags[0].name, "etcd");
        assert_eq!(manifest.tags[0].pullspec, "quay.io/pool@sha256:aaa");
        assert_eq!(manifest.os_version, "412.86.202210250757-0");
    }

    #[test]
    fn test_parse_release_info_requires_tags() {
        let raw = r#"{"displayVersions": {"machine-os": {"Version": "412.86.1-0"}}}"#;
        let err = parse_release_info("quay.io/release:x", raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("references.spec.tags"));
    }

    #[test]
    fn test_parse_release_info_requires_os_version() {
        let raw = r#"{
            "references": {"spec": {"tags": [{"name": "a", "from": {"name": "b"}}]}},
            "displayVersions": {"machine-os": {"Version": ""}}
        }"#;
        let err = parse_release_info("quay.io/release:x", raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("machine-os"));
    }
}
