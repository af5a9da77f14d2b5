//! Build-system client over the `brew` CLI.
//!
//! Every hub query goes through `brew call --json-output`, so the client
//! works anywhere the vendor CLI is configured. Image-to-build resolution
//! additionally inspects registry labels via `oc image info`, because the
//! hub does not index builds by pullspec.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::records::BuildRecord;
use crate::traits::BuildSystemClient;

/// Configuration for [`BrewCliClient`].
#[derive(Debug, Clone)]
pub struct BrewCliConfig {
    pub brew_bin: String,
    pub oc_bin: String,
    pub timeout_secs: u64,
    /// Candidate tag into which builds are swept; `{el}` is substituted
    /// with the distribution-target major (e.g. "rhaos-4.12-rhel-{el}-candidate").
    pub sweep_tag_template: String,
    /// Distribution target assumed for image builds.
    pub default_el: u8,
}

impl Default for BrewCliConfig {
    fn default() -> Self {
        Self {
            brew_bin: "brew".to_string(),
            oc_bin: "oc".to_string(),
            timeout_secs: 300,
            sweep_tag_template: "rhaos-{el}-candidate".to_string(),
            default_el: 8,
        }
    }
}

/// `BuildSystemClient` backed by the `brew` CLI.
pub struct BrewCliClient {
    config: BrewCliConfig,
}

impl BrewCliClient {
    pub fn new(config: BrewCliConfig) -> Self {
        Self { config }
    }

    fn sweep_tag(&self, el_target: Option<u8>) -> String {
        let el = el_target.unwrap_or(self.config.default_el);
        self.config
            .sweep_tag_template
            .replace("{el}", &el.to_string())
    }

    async fn run(&self, bin: &str, args: &[String]) -> ClientResult<Vec<u8>> {
        let rendered = format!("{} {}", bin, args.join(" "));
        debug!(command = %rendered, "running hub call");

        let child = Command::new(bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ClientError::Timeout {
            command: rendered.clone(),
            secs: self.config.timeout_secs,
        })??;

        if !output.status.success() {
            return Err(ClientError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn call_json(&self, method: &str, kwargs: Value) -> ClientResult<Value> {
        let args = vec![
            "call".to_string(),
            "--json-output".to_string(),
            method.to_string(),
            "--kwargs".to_string(),
            kwargs.to_string(),
        ];
        let stdout = self.run(&self.config.brew_bin, &args).await?;
        serde_json::from_slice(&stdout).map_err(ClientError::from)
    }
}

#[async_trait]
impl BuildSystemClient for BrewCliClient {
    async fn resolve_image(&self, pullspec: &str) -> ClientResult<BuildRecord> {
        let args = vec![
            "image".to_string(),
            "info".to_string(),
            pullspec.to_string(),
            "-o=json".to_string(),
        ];
        let stdout = self.run(&self.config.oc_bin, &args).await?;
        let info: Value = serde_json::from_slice(&stdout)?;
        let nvr = nvr_from_labels(pullspec, &info)?;

        let build = self.call_json("getBuild", json!({ "buildInfo": nvr })).await?;
        if build.is_null() {
            return Err(ClientError::NotFound(format!("build {nvr}")));
        }
        build_from_value(&build)
    }

    async fn latest_build(
        &self,
        package: &str,
        before_event: u64,
        el_target: Option<u8>,
    ) -> ClientResult<Option<BuildRecord>> {
        let response = self
            .call_json(
                "getLatestBuilds",
                json!({
                    "tag": self.sweep_tag(el_target),
                    "package": package,
                    "event": before_event,
                }),
            )
            .await?;
        let entries = response.as_array().ok_or_else(|| ClientError::Parse {
            context: format!("getLatestBuilds for {package}"),
            detail: "expected an array".to_string(),
        })?;
        match entries.first() {
            Some(entry) => Ok(Some(build_from_value(entry)?)),
            None => Ok(None),
        }
    }

    async fn builds_by_ids(&self, ids: &[u64]) -> ClientResult<Vec<BuildRecord>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let build = self.call_json("getBuild", json!({ "buildInfo": id })).await?;
            if build.is_null() {
                return Err(ClientError::NotFound(format!("build {id}")));
            }
            out.push(build_from_value(&build)?);
        }
        Ok(out)
    }

    async fn embedded_rpm_builds(
        &self,
        image_build_ids: &[u64],
    ) -> ClientResult<Vec<BuildRecord>> {
        let mut rpm_ids: Vec<u64> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();

        for image_id in image_build_ids {
            let archives = self
                .call_json("listArchives", json!({ "buildID": image_id, "type": "image" }))
                .await?;
            for archive in archives.as_array().into_iter().flatten() {
                let Some(archive_id) = archive.get("id").and_then(Value::as_u64) else {
                    continue;
                };
                let rpms = self
                    .call_json("listRPMs", json!({ "imageID": archive_id }))
                    .await?;
                for rpm in rpms.as_array().into_iter().flatten() {
                    if let Some(build_id) = rpm.get("build_id").and_then(Value::as_u64) {
                        if seen.insert(build_id) {
                            rpm_ids.push(build_id);
                        }
                    }
                }
            }
        }

        self.builds_by_ids(&rpm_ids).await
    }

    async fn event_at_or_before(&self, instant: DateTime<Utc>) -> ClientResult<Option<u64>> {
        let response = self
            .call_json(
                "getLastEvent",
                json!({ "before": instant.timestamp() as f64 }),
            )
            .await?;
        if response.is_null() {
            return Ok(None);
        }
        Ok(response.get("id").and_then(Value::as_u64))
    }
}

/// Compose an NVR from the registry labels of an image.
fn nvr_from_labels(pullspec: &str, info: &Value) -> ClientResult<String> {
    let labels = info
        .pointer("/config/config/Labels")
        .and_then(|v| v.as_object())
        .ok_or_else(|| ClientError::MissingField {
            context: format!("image info for {pullspec}"),
            field: "config.config.Labels".to_string(),
        })?;

    let fetch = |field: &str| -> ClientResult<&str> {
        labels
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::MissingField {
                context: format!("image info for {pullspec}"),
                field: field.to_string(),
            })
    };

    let component = fetch("com.redhat.component")?;
    let version = fetch("version")?;
    let release = fetch("release")?;
    Ok(format!("{component}-{version}-{release}"))
}

/// Convert a hub build object into a [`BuildRecord`].
fn build_from_value(v: &Value) -> ClientResult<BuildRecord> {
    let fetch_str = |field: &str| -> ClientResult<&str> {
        v.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::MissingField {
                context: "build record".to_string(),
                field: field.to_string(),
            })
    };

    let id = v
        .get("id")
        .or_else(|| v.get("build_id"))
        .and_then(Value::as_u64)
        .ok_or_else(|| ClientError::MissingField {
            context: "build record".to_string(),
            field: "id".to_string(),
        })?;

    let completion_ts = v
        .get("completion_ts")
        .and_then(Value::as_f64)
        .ok_or_else(|| ClientError::MissingField {
            context: "build record".to_string(),
            field: "completion_ts".to_string(),
        })?;
    let completed_at =
        DateTime::<Utc>::from_timestamp(completion_ts as i64, 0).ok_or_else(|| {
            ClientError::Parse {
                context: "build record".to_string(),
                detail: format!("completion_ts {completion_ts} out of range"),
            }
        })?;

    Ok(BuildRecord {
        id,
        package_name: fetch_str("package_name")?.to_string(),
        nvr: fetch_str("nvr")?.to_string(),
        release: fetch_str("release")?.to_string(),
        completed_at,
    })
}
