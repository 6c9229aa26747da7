//! Reconciliation of declaratively managed Dataproc clusters.
//!
//! The flow for a single cluster is always the same: the desired state ([`crd`]) is translated
//! into a provider payload ([`translate`]), changes are computed ([`patch`], [`drift`]), the
//! resulting operation is polled to completion ([`poller`]) and the live state is flattened back
//! into the declarative model ([`reflect`]). [`reconcile::ClusterReconciler`] ties these steps
//! together behind create, read, update and delete entry points.
//!
//! ## Crate Features
//!
//! - `default` enables the `clap` feature.
//! - `clap` derives [`clap::Args`] for [`options::ReconcilerOptions`].

pub mod api;
pub mod bucket;
pub mod crd;
pub mod drift;
pub mod logging;
pub mod options;
pub mod patch;
pub mod poller;
pub mod reconcile;
pub mod reflect;
pub mod translate;
pub mod validation;

// Internal re-exports
pub use dataproc_shared as shared;
pub use dataproc_shared::yaml::YamlSchema;
