//! The seam between the reconciler and the provider.
//!
//! [`ProviderClient`] is deliberately small and blocking: every method maps to a single provider
//! request, transport level retries are the implementor's business. Only
//! [`ApiError::RateLimited`] is ever retried by the reconciler.

use std::fmt::Display;

use snafu::Snafu;

pub use self::types::*;

mod types;

/// Errors reported by a [`ProviderClient`].
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("{resource} was not found"))]
    NotFound { resource: String },

    #[snafu(display("request was rate limited: {message}"))]
    RateLimited { message: String },

    #[snafu(display("provider rejected the request with code {code}: {message}"))]
    Provider { code: i32, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Identifies a cluster within the provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterRef {
    pub project: String,
    pub region: String,
    pub name: String,
}

impl ClusterRef {
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
            name: name.into(),
        }
    }
}

impl Display for ClusterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            project,
            region,
            name,
        } = self;
        write!(f, "projects/{project}/regions/{region}/clusters/{name}")
    }
}

/// The provider operations needed to reconcile a cluster.
pub trait ProviderClient {
    /// Starts creating `cluster` and returns the operation tracking it.
    fn create_cluster(
        &self,
        project: &str,
        region: &str,
        cluster: &Cluster,
    ) -> Result<Operation, ApiError>;

    /// Updates the fields of `cluster` named in the comma separated `update_mask`.
    fn patch_cluster(
        &self,
        cluster_ref: &ClusterRef,
        cluster: &Cluster,
        update_mask: &str,
    ) -> Result<Operation, ApiError>;

    fn get_cluster(&self, cluster_ref: &ClusterRef) -> Result<Cluster, ApiError>;

    fn delete_cluster(&self, cluster_ref: &ClusterRef) -> Result<Operation, ApiError>;

    fn get_operation(&self, name: &str) -> Result<Operation, ApiError>;

    /// Lists the names of all objects in `bucket`.
    fn list_objects(&self, bucket: &str) -> Result<Vec<String>, ApiError>;

    fn delete_object(&self, bucket: &str, name: &str) -> Result<(), ApiError>;

    fn delete_bucket(&self, bucket: &str) -> Result<(), ApiError>;
}
