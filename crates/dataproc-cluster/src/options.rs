use std::path::Path;

use dataproc_shared::{time::Duration, yaml};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load reconciler options"))]
    LoadOptions { source: yaml::Error },
}

/// Available options to configure a [`ClusterReconciler`](crate::reconcile::ClusterReconciler).
///
/// Additionally, this struct can be used as CLI arguments. This functionality is only available
/// if the feature `clap` is enabled. It can also be loaded from a YAML file, in which case every
/// field is optional.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[cfg_attr(feature = "clap", command(next_help_heading = "Reconciler Options"))]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcilerOptions {
    /// The project used for clusters which don't set one explicitly.
    #[cfg_attr(feature = "clap", arg(long, env = "DATAPROC_PROJECT"))]
    pub default_project: Option<String>,

    /// How long to wait for a cluster to be created.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_CREATE_TIMEOUT",
        default_value_t = Self::DEFAULT_CREATE_TIMEOUT
    ))]
    pub create_timeout: Duration,

    /// How long to wait for a cluster to be updated.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_UPDATE_TIMEOUT",
        default_value_t = Self::DEFAULT_UPDATE_TIMEOUT
    ))]
    pub update_timeout: Duration,

    /// How long to wait for a cluster to be deleted.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_DELETE_TIMEOUT",
        default_value_t = Self::DEFAULT_DELETE_TIMEOUT
    ))]
    pub delete_timeout: Duration,

    /// The interval in which long-running operations are polled.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_POLL_INTERVAL",
        default_value_t = Self::DEFAULT_POLL_INTERVAL
    ))]
    pub poll_interval: Duration,

    /// The first delay after a rate-limited request. Doubled on every further attempt.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_INITIAL_BACKOFF",
        default_value_t = Self::DEFAULT_INITIAL_BACKOFF
    ))]
    pub initial_backoff: Duration,

    /// The upper bound for the delay between rate-limited requests.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_MAX_BACKOFF",
        default_value_t = Self::DEFAULT_MAX_BACKOFF
    ))]
    pub max_backoff: Duration,

    /// How often deleting the staging bucket is attempted while being rate limited.
    #[cfg_attr(feature = "clap", arg(
        long,
        env = "DATAPROC_BUCKET_DELETE_ATTEMPTS",
        default_value_t = Self::DEFAULT_BUCKET_DELETE_ATTEMPTS
    ))]
    pub bucket_delete_attempts: u32,
}

impl ReconcilerOptions {
    const DEFAULT_BUCKET_DELETE_ATTEMPTS: u32 = 5;
    const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_minutes_unchecked(10);
    const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_minutes_unchecked(5);
    const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
    const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
    const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_minutes_unchecked(5);

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        yaml::from_file(path).context(LoadOptionsSnafu)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            create: self.create_timeout,
            update: self.update_timeout,
            delete: self.delete_timeout,
        }
    }
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            default_project: None,
            create_timeout: Self::DEFAULT_CREATE_TIMEOUT,
            update_timeout: Self::DEFAULT_UPDATE_TIMEOUT,
            delete_timeout: Self::DEFAULT_DELETE_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
            bucket_delete_attempts: Self::DEFAULT_BUCKET_DELETE_ATTEMPTS,
        }
    }
}

/// Per-operation timeouts, overridable for a single reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        ReconcilerOptions::default().timeouts()
    }
}
