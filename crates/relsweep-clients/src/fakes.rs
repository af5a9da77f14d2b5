//! In-memory fakes for the client traits (testing only)
//!
//! Provides `MemoryBuildSystem` and `MemoryPayloads` that satisfy the trait
//! contracts without any external dependencies. Tests seed them through the
//! builder methods and pass them wherever a real client is expected.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ClientError, ClientResult};
use crate::records::{BuildRecord, ReleaseManifest};
use crate::traits::{BuildSystemClient, PayloadClient};

// ---------------------------------------------------------------------------
// MemoryBuildSystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TagEntry {
    build_id: u64,
    el_target: Option<u8>,
    /// Event at which the build became visible to latest-build queries.
    event: u64,
}

#[derive(Debug, Default)]
struct Inner {
    /// Event log: (event id, instant).
    events: Vec<(u64, DateTime<Utc>)>,
    builds: HashMap<u64, BuildRecord>,
    /// Image pullspec -> producing build id.
    images: HashMap<String, u64>,
    tags: Vec<TagEntry>,
    /// Image build id -> embedded RPM build ids.
    image_rpms: HashMap<u64, Vec<u64>>,
}

/// In-memory build system backed by an explicit event log.
#[derive(Debug, Default)]
pub struct MemoryBuildSystem {
    inner: Mutex<Inner>,
}

impl MemoryBuildSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event in the log.
    pub fn add_event(&self, id: u64, instant: DateTime<Utc>) {
        self.inner.lock().unwrap().events.push((id, instant));
    }

    /// Register a build record.
    pub fn add_build(&self, build: BuildRecord) {
        self.inner.lock().unwrap().builds.insert(build.id, build);
    }

    /// Map an image pullspec to the build that produced it.
    pub fn map_image(&self, pullspec: impl Into<String>, build_id: u64) {
        self.inner
            .lock()
            .unwrap()
            .images
            .insert(pullspec.into(), build_id);
    }

    /// Make a build visible to `latest_build` queries from `event` onward.
    pub fn tag_build(&self, build_id: u64, el_target: Option<u8>, event: u64) {
        self.inner.lock().unwrap().tags.push(TagEntry {
            build_id,
            el_target,
            event,
        });
    }

    /// Declare the RPM builds embedded in an image build.
    pub fn set_image_rpms(&self, image_build_id: u64, rpm_build_ids: Vec<u64>) {
        self.inner
            .lock()
            .unwrap()
            .image_rpms
            .insert(image_build_id, rpm_build_ids);
    }
}

#[async_trait]
impl BuildSystemClient for MemoryBuildSystem {
    async fn resolve_image(&self, pullspec: &str) -> ClientResult<BuildRecord> {
        let inner = self.inner.lock().unwrap();
        let id = inner
            .images
            .get(pullspec)
            .ok_or_else(|| ClientError::NotFound(format!("image {pullspec}")))?;
        inner
            .builds
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("build {id}")))
    }

    async fn latest_build(
        &self,
        package: &str,
        before_event: u64,
        el_target: Option<u8>,
    ) -> ClientResult<Option<BuildRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut best: Option<(u64, &BuildRecord)> = None;
        for entry in &inner.tags {
            if entry.el_target != el_target || entry.event >= before_event {
                continue;
            }
            let Some(build) = inner.builds.get(&entry.build_id) else {
                continue;
            };
            if build.package_name != package {
                continue;
            }
            if best.map_or(true, |(event, _)| entry.event > event) {
                best = Some((entry.event, build));
            }
        }
        Ok(best.map(|(_, build)| build.clone()))
    }

    async fn builds_by_ids(&self, ids: &[u64]) -> ClientResult<Vec<BuildRecord>> {
        let inner = self.inner.lock().unwrap();
        ids.iter()
            .map(|id| {
                inner
                    .builds
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ClientError::NotFound(format!("build {id}")))
            })
            .collect()
    }

    async fn embedded_rpm_builds(
        &self,
        image_build_ids: &[u64],
    ) -> ClientResult<Vec<BuildRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for image_id in image_build_ids {
            for rpm_id in inner.image_rpms.get(image_id).into_iter().flatten() {
                let build = inner
                    .builds
                    .get(rpm_id)
                    .cloned()
                    .ok_or_else(|| ClientError::NotFound(format!("build {rpm_id}")))?;
                out.push(build);
            }
        }
        Ok(out)
    }

    async fn event_at_or_before(&self, instant: DateTime<Utc>) -> ClientResult<Option<u64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|(_, at)| *at <= instant)
            .max_by_key(|(id, at)| (*at, *id))
            .map(|(id, _)| *id))
    }
}

// ---------------------------------------------------------------------------
// MemoryPayloads
// ---------------------------------------------------------------------------

/// In-memory payload registry keyed by pullspec.
#[derive(Debug, Default)]
pub struct MemoryPayloads {
    manifests: Mutex<HashMap<String, ReleaseManifest>>,
}

impl MemoryPayloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest under a pullspec.
    pub fn insert(&self, pullspec: impl Into<String>, manifest: ReleaseManifest) {
        self.manifests
            .lock()
            .unwrap()
            .insert(pullspec.into(), manifest);
    }
}

#[async_trait]
impl PayloadClient for MemoryPayloads {
    async fn fetch_manifest(&self, pullspec: &str) -> ClientResult<ReleaseManifest> {
        self.manifests
            .lock()
            .unwrap()
            .get(pullspec)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("payload {pullspec}")))
    }
}
