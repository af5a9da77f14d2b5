//! Sweep orchestration: from release references to an assembly result.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use relsweep_clients::{BuildSystemClient, PayloadClient};
use tracing::{info, warn};

use crate::assembly::{AssemblyResult, AssemblyType, ImageOverride, RpmOverride};
use crate::basis::estimate_basis;
use crate::error::{SweepError, SweepResult};
use crate::fetch::fetch_payloads;
use crate::merge::merge_observed;
use crate::metadata::GroupMetadata;
use crate::reconcile::{reconcile_images, reconcile_rpms, ValidationMode};
use crate::reference::{check_unique_arches, ReleaseKind, ReleaseReference};

/// Why a pinned component is recorded in the definition.
const PIN_WHY: &str = "Query from assembly basis event failed to replicate referenced \
                       release content exactly. Pinning to replicate.";

/// Policy knobs for a sweep run.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Safety margin added to the newest completion timestamp before the
    /// basis event is resolved.
    pub basis_margin: Duration,

    /// Upper bound on simultaneous outstanding client calls.
    pub fetch_concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            basis_margin: Duration::minutes(5),
            fetch_concurrency: 500,
        }
    }
}

/// One assembly computation over a fixed set of release references.
pub struct AssemblySweep {
    assembly_name: String,
    assembly_type: AssemblyType,
    group: GroupMetadata,
    references: Vec<ReleaseReference>,
    previous: Vec<String>,
    config: SweepConfig,
    payloads: Arc<dyn PayloadClient>,
    builds: Arc<dyn BuildSystemClient>,
}

impl AssemblySweep {
    pub fn new(
        assembly_name: impl Into<String>,
        custom: bool,
        group: GroupMetadata,
        references: Vec<ReleaseReference>,
        payloads: Arc<dyn PayloadClient>,
        builds: Arc<dyn BuildSystemClient>,
    ) -> Self {
        let assembly_name = assembly_name.into();
        let assembly_type = AssemblyType::infer(custom, &assembly_name);
        Self {
            assembly_name,
            assembly_type,
            group,
            references,
            previous: Vec::new(),
            config: SweepConfig::default(),
            payloads,
            builds,
        }
    }

    /// Versions that may upgrade into this assembly (already merged and
    /// sorted by the caller).
    pub fn with_previous(mut self, previous: Vec<String>) -> Self {
        self.previous = previous;
        self
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn assembly_type(&self) -> AssemblyType {
        self.assembly_type
    }

    fn validate(&self) -> SweepResult<()> {
        if self.references.is_empty() {
            return Err(SweepError::InvalidInput(
                "at least one release reference must be specified".to_string(),
            ));
        }
        check_unique_arches(&self.references)?;
        if self.assembly_type.is_custom() && !self.previous.is_empty() {
            return Err(SweepError::InvalidInput(
                "custom assemblies do not carry a previous list".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the full sweep. Fail-fast: the first fatal error aborts the run
    /// and no partial result is produced.
    pub async fn run(&self) -> SweepResult<AssemblyResult> {
        self.validate()?;
        info!(
            assembly = %self.assembly_name,
            kind = %self.assembly_type,
            references = self.references.len(),
            "starting assembly sweep"
        );

        let per_arch = fetch_payloads(
            self.payloads.as_ref(),
            self.builds.as_ref(),
            &self.references,
            &self.group.os_tag_names(),
            self.config.fetch_concurrency,
        )
        .await?;

        let merged = merge_observed(&per_arch, &self.group)?;
        let mut warnings = merged.warnings;
        info!(
            packages = merged.accepted.len(),
            "component builds detected in the specified releases"
        );

        let basis = estimate_basis(
            self.builds.as_ref(),
            &merged.accepted,
            self.config.basis_margin,
        )
        .await?;

        let mode = if self.assembly_type.is_custom() {
            ValidationMode::Relaxed
        } else {
            ValidationMode::Strict
        };
        let images = reconcile_images(
            self.builds.as_ref(),
            &self.group,
            &merged.accepted,
            basis.event,
            mode,
        )
        .await?;
        warnings.extend(images.warnings);

        let (os_images, arches) = self.collect_os_images(&per_arch, &mut warnings)?;

        let image_build_ids: Vec<u64> = images.selected.values().map(|b| b.id).collect();
        let rpms = reconcile_rpms(
            self.builds.as_ref(),
            &self.group,
            &image_build_ids,
            basis.event,
        )
        .await?;

        let image_overrides = images
            .pinned
            .iter()
            .filter_map(|package| {
                let meta = self.group.image_for_package(package)?;
                let build = images.selected.get(package)?;
                Some(ImageOverride {
                    component: meta.key.clone(),
                    why: PIN_WHY.to_string(),
                    nvr: build.nvr.clone(),
                })
            })
            .collect();

        let rpm_overrides = rpms
            .pinned
            .iter()
            .filter_map(|package| {
                let meta = self.group.rpm_for_package(package)?;
                let targets = rpms.selected.get(package)?;
                Some(RpmOverride {
                    component: meta.key.clone(),
                    why: PIN_WHY.to_string(),
                    nvrs: targets
                        .iter()
                        .map(|(el, build)| (*el, build.nvr.clone()))
                        .collect(),
                })
            })
            .collect();

        let reference_releases = per_arch
            .iter()
            .filter(|o| o.kind == ReleaseKind::Nightly)
            .map(|o| (o.arch.clone(), o.reference.clone()))
            .collect();

        Ok(AssemblyResult {
            assembly_name: self.assembly_name.clone(),
            assembly_type: self.assembly_type,
            basis_event: basis.event,
            reference_releases,
            os_images,
            arches,
            image_overrides,
            rpm_overrides,
            previous: self.previous.clone(),
            warnings,
        })
    }

    /// Collect base-OS images per tag and architecture, and enforce the
    /// primary-tag coverage rule.
    #[allow(clippy::type_complexity)]
    fn collect_os_images(
        &self,
        per_arch: &[crate::fetch::ArchObservations],
        warnings: &mut Vec<String>,
    ) -> SweepResult<(BTreeMap<String, BTreeMap<String, String>>, Vec<String>)> {
        let mut os_images: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for observations in per_arch {
            for (tag, pullspec) in &observations.os_images {
                os_images
                    .entry(tag.clone())
                    .or_default()
                    .insert(observations.arch.clone(), pullspec.clone());
            }
        }

        let primary = &self.group.primary_os_tag;
        let mut covered = Vec::new();
        for arch in &self.group.arches {
            let has_primary = primary.is_empty()
                || os_images
                    .get(primary)
                    .is_some_and(|by_arch| by_arch.contains_key(arch));
            if has_primary {
                covered.push(arch.clone());
                continue;
            }
            if self.assembly_type.is_custom() {
                let note = format!(
                    "did not find base-OS image `{primary}` for group architecture {arch}; \
                     ignoring for custom assembly"
                );
                warn!("{note}");
                warnings.push(note);
            } else {
                return Err(SweepError::MissingOsImage {
                    tag: primary.clone(),
                    arch: arch.clone(),
                });
            }
        }

        Ok((os_images, covered))
    }
}
