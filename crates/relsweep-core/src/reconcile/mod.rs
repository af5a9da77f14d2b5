//! Outlier reconciliation: images first, then the RPMs nested inside them.
//!
//! Both passes answer the same question per component: does a latest-build
//! query at the estimated basis event reproduce the build observed in the
//! payloads? A component where it does is consistent; one where it does not
//! is pinned to the observed build. Each pass is a single linear sweep with
//! two terminal outcomes per item and one fatal path.

pub mod images;
pub mod rpms;

pub use images::{reconcile_images, ImageReconciliation, ValidationMode};
pub use rpms::{isolate_el_target, reconcile_rpms, RpmReconciliation};
