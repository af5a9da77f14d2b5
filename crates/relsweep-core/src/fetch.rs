//! Payload fetching and component build resolution.
//!
//! Resolves each release reference into the full set of observed component
//! builds plus the base-OS images the payload embeds. All network calls run
//! concurrently under one shared semaphore; the cap protects the upstream
//! service, it is not a correctness mechanism. Results are task-local and
//! returned in input order so downstream merging is deterministic.

use std::collections::{BTreeMap, HashSet};

use futures::future::try_join_all;
use relsweep_clients::{BuildRecord, BuildSystemClient, ManifestTag, PayloadClient};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{SweepError, SweepResult};
use crate::reference::{ReleaseKind, ReleaseReference};

/// One component image observed in a payload, resolved to its build.
#[derive(Debug, Clone)]
pub struct ObservedImage {
    /// Payload tag the image was published under.
    pub tag_name: String,

    /// The pullable image reference.
    pub pullspec: String,

    /// The build that produced the image.
    pub build: BuildRecord,
}

/// Everything observed in one architecture's payload.
#[derive(Debug, Clone)]
pub struct ArchObservations {
    pub arch: String,

    /// The reference name the payload was fetched for.
    pub reference: String,

    pub kind: ReleaseKind,

    /// Base-OS images by payload tag name (not resolved to builds).
    pub os_images: BTreeMap<String, String>,

    /// Base-OS version advertised by the payload.
    pub os_version: String,

    /// Component images resolved to their producing builds.
    pub images: Vec<ObservedImage>,
}

/// Fetch every referenced payload and resolve its component images.
///
/// Fail-fast: the first fatal error aborts the whole fetch; in-flight
/// sibling futures are dropped and their results discarded.
pub async fn fetch_payloads(
    payloads: &dyn PayloadClient,
    builds: &dyn BuildSystemClient,
    refs: &[ReleaseReference],
    os_tag_names: &HashSet<String>,
    concurrency: usize,
) -> SweepResult<Vec<ArchObservations>> {
    let sem = Semaphore::new(concurrency);
    try_join_all(
        refs.iter()
            .map(|r| fetch_one(payloads, builds, r, os_tag_names, &sem)),
    )
    .await
}

async fn fetch_one(
    payloads: &dyn PayloadClient,
    builds: &dyn BuildSystemClient,
    reference: &ReleaseReference,
    os_tag_names: &HashSet<String>,
    sem: &Semaphore,
) -> SweepResult<ArchObservations> {
    info!(reference = %reference.name, pullspec = %reference.pullspec, "processing release payload");

    let manifest = {
        let _permit = sem.acquire().await.ok();
        payloads.fetch_manifest(&reference.pullspec).await?
    };

    if manifest.tags.is_empty() {
        return Err(SweepError::PayloadInvalid {
            reference: reference.name.clone(),
            reason: "no image tags in payload manifest".to_string(),
        });
    }
    if manifest.os_version.is_empty() {
        return Err(SweepError::PayloadInvalid {
            reference: reference.name.clone(),
            reason: "no base-OS version in payload manifest".to_string(),
        });
    }

    let mut os_images = BTreeMap::new();
    let mut pending = Vec::new();
    for tag in &manifest.tags {
        if os_tag_names.contains(&tag.name) {
            os_images.insert(tag.name.clone(), tag.pullspec.clone());
        } else {
            pending.push(resolve_tag(builds, tag, sem));
        }
    }
    let images = try_join_all(pending).await?;

    Ok(ArchObservations {
        arch: reference.arch.clone(),
        reference: reference.name.clone(),
        kind: reference.kind,
        os_images,
        os_version: manifest.os_version,
        images,
    })
}

async fn resolve_tag(
    builds: &dyn BuildSystemClient,
    tag: &ManifestTag,
    sem: &Semaphore,
) -> SweepResult<ObservedImage> {
    let _permit = sem.acquire().await.ok();
    let build = builds.resolve_image(&tag.pullspec).await?;
    debug!(tag = %tag.name, nvr = %build.nvr, "resolved payload tag");
    Ok(ObservedImage {
        tag_name: tag.name.clone(),
        pullspec: tag.pullspec.clone(),
        build,
    })
}
