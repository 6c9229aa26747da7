//! The create, read, update and delete entry points.
//!
//! A [`ClusterReconciler`] drives a single cluster from its declarative description towards the
//! provider and records what it observed in a caller owned [`ResourceState`]. Calls are blocking
//! and must be serialized per cluster by the caller.

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, ClusterRef, ProviderClient},
    bucket::{self, autogen_bucket_to_delete, empty_and_delete_bucket},
    crd::DataprocClusterSpec,
    drift::replacement_fields,
    options::{ReconcilerOptions, Timeouts},
    patch::build_patch,
    poller::{self, Clock, OperationPoller, PollPolicy, RetryConfig, SystemClock},
    reflect::{self, reflect_onto},
    translate::{self, resolve_project, translate},
};

/// How often a create request is submitted while it is rate limited.
pub const CREATE_ATTEMPTS: u32 = 3;
/// How often an update request is submitted while it is rate limited.
pub const UPDATE_ATTEMPTS: u32 = 2;
/// How often a delete request is submitted while it is rate limited.
pub const DELETE_ATTEMPTS: u32 = 3;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to translate cluster"))]
    Translate { source: translate::Error },

    #[snafu(display("failed to create cluster {name:?}"))]
    CreateCluster { source: poller::Error, name: String },

    #[snafu(display("failed to read cluster {name:?}"))]
    ReadCluster { source: ApiError, name: String },

    #[snafu(display("failed to reflect the state of cluster {name:?}"))]
    ReflectCluster { source: reflect::Error, name: String },

    #[snafu(display("cluster {name:?} has not been created yet"))]
    NotCreated { name: String },

    #[snafu(display(
        "cluster {name:?} must be replaced to change {}",
        fields.join(", ")
    ))]
    RequiresReplacement {
        name: String,
        fields: Vec<&'static str>,
    },

    #[snafu(display("failed to update cluster {name:?}"))]
    UpdateCluster { source: poller::Error, name: String },

    #[snafu(display("failed to clean up the staging bucket of cluster {name:?}"))]
    CleanupBucket { source: bucket::Error, name: String },

    #[snafu(display("failed to delete cluster {name:?}"))]
    DeleteCluster { source: poller::Error, name: String },

    #[snafu(display("state of cluster {id:?} is missing its live state"))]
    MissingLiveState { id: String },
}

/// What is known about a cluster between reconciliations.
///
/// Owned and persisted by the caller.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    /// The identity of the cluster, set as soon as the provider accepted the create request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The state last read from the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<DataprocClusterSpec>,
}

impl ResourceState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct ClusterReconciler<'a, C: ?Sized> {
    client: &'a C,
    clock: &'a dyn Clock,
    options: ReconcilerOptions,
    timeouts: Timeouts,
}

impl<'a, C> ClusterReconciler<'a, C>
where
    C: ProviderClient + ?Sized,
{
    pub fn new(client: &'a C, options: ReconcilerOptions) -> Self {
        Self {
            client,
            clock: &SystemClock,
            timeouts: options.timeouts(),
            options,
        }
    }

    pub fn with_clock(self, clock: &'a dyn Clock) -> Self {
        Self { clock, ..self }
    }

    /// Overrides the timeouts taken from the [`ReconcilerOptions`].
    pub fn with_timeouts(self, timeouts: Timeouts) -> Self {
        Self { timeouts, ..self }
    }

    /// Creates the cluster described by `desired` and waits until it is running.
    ///
    /// The identity is recorded as soon as the provider accepted the request, and removed again
    /// if the cluster doesn't come up.
    pub fn create(&self, desired: &DataprocClusterSpec, state: &mut ResourceState) -> Result<()> {
        let name = &desired.name;
        let cluster = translate(desired, self.default_project()).context(TranslateSnafu)?;
        let cluster_ref = ClusterRef::new(&cluster.project_id, &desired.region, name);

        info!(cluster.name = %name, cluster.project = %cluster_ref.project, cluster.region = %cluster_ref.region, "creating cluster");
        let description = format!("creating cluster {name}");
        let poller = self.poller(self.timeouts.create, CREATE_ATTEMPTS);
        let operation = poller
            .submit(&description, || {
                self.client
                    .create_cluster(&cluster_ref.project, &cluster_ref.region, &cluster)
            })
            .context(CreateClusterSnafu { name })?;

        state.id = Some(name.clone());
        if let Err(source) = poller.wait(&description, operation) {
            warn!(cluster.name = %name, error = %source, "cluster did not come up, forgetting it");
            state.id = None;
            return Err(source).context(CreateClusterSnafu { name });
        }
        info!(cluster.name = %name, "created cluster");

        self.read(desired, state)?;
        Ok(())
    }

    /// Refreshes the live state of the cluster.
    ///
    /// Returns [`None`] and clears `state` if the cluster no longer exists.
    pub fn read<'s>(
        &self,
        desired: &DataprocClusterSpec,
        state: &'s mut ResourceState,
    ) -> Result<Option<&'s DataprocClusterSpec>> {
        let name = &desired.name;
        let cluster_ref = self.cluster_ref(desired)?;

        let cluster = match self.client.get_cluster(&cluster_ref) {
            Ok(cluster) => cluster,
            Err(err) if err.is_not_found() => {
                warn!(cluster.name = %name, "cluster no longer exists, removing it from state");
                state.clear();
                return Ok(None);
            }
            Err(source) => return Err(source).context(ReadClusterSnafu { name }),
        };

        let live = reflect_onto(desired, &cluster).context(ReflectClusterSnafu { name })?;
        state.id = Some(name.clone());
        Ok(Some(state.live.insert(live)))
    }

    /// Applies the updatable differences between the last live state and `desired`.
    ///
    /// Fails without contacting the provider if any other attribute changed.
    pub fn update(&self, desired: &DataprocClusterSpec, state: &mut ResourceState) -> Result<()> {
        let name = &desired.name;
        let prior = state
            .live
            .as_ref()
            .context(NotCreatedSnafu { name })?;

        let fields = replacement_fields(prior, desired);
        ensure!(
            fields.is_empty(),
            RequiresReplacementSnafu { name, fields }
        );

        match build_patch(prior, desired) {
            None => debug!(cluster.name = %name, "nothing to update"),
            Some(patch) => {
                let cluster_ref = self.cluster_ref(desired)?;
                let update_mask = patch.mask();
                info!(cluster.name = %name, %update_mask, "updating cluster");

                let description = format!("updating cluster {name}");
                let poller = self.poller(self.timeouts.update, UPDATE_ATTEMPTS);
                let operation = poller
                    .submit(&description, || {
                        self.client
                            .patch_cluster(&cluster_ref, &patch.cluster, &update_mask)
                    })
                    .context(UpdateClusterSnafu { name })?;
                poller
                    .wait(&description, operation)
                    .context(UpdateClusterSnafu { name })?;
                info!(cluster.name = %name, "updated cluster");
            }
        }

        self.read(desired, state)?;
        Ok(())
    }

    /// Deletes the cluster and, if requested, its generated staging bucket.
    ///
    /// The bucket is removed first, a failure to do so leaves the cluster untouched. `state` is
    /// only cleared once the cluster is gone.
    ///
    /// The live state names the cluster to delete. A state holding an identity but no live state,
    /// e.g. after the read following a create failed, is rejected with
    /// [`Error::MissingLiveState`]; call [`Self::read`] first to recover it.
    pub fn delete(&self, state: &mut ResourceState) -> Result<()> {
        let Some(live) = state.live.as_ref() else {
            return match &state.id {
                Some(id) => MissingLiveStateSnafu { id }.fail(),
                None => Ok(()),
            };
        };
        let name = &live.name;
        let cluster_ref = self.cluster_ref(live)?;

        if let Some(bucket) = autogen_bucket_to_delete(live) {
            info!(cluster.name = %name, bucket, "deleting generated staging bucket");
            let retry = RetryConfig {
                max_attempts: self.options.bucket_delete_attempts,
                ..self.retry_config()
            };
            empty_and_delete_bucket(self.client, self.clock, &retry, bucket)
                .context(CleanupBucketSnafu { name })?;
        }

        info!(cluster.name = %name, "deleting cluster");
        let description = format!("deleting cluster {name}");
        let poller = self.poller(self.timeouts.delete, DELETE_ATTEMPTS);
        let operation = poller
            .submit(&description, || self.client.delete_cluster(&cluster_ref))
            .context(DeleteClusterSnafu { name })?;
        poller
            .wait(&description, operation)
            .context(DeleteClusterSnafu { name })?;

        info!(cluster.name = %name, "deleted cluster");
        state.clear();
        Ok(())
    }

    fn default_project(&self) -> Option<&str> {
        self.options.default_project.as_deref()
    }

    fn cluster_ref(&self, spec: &DataprocClusterSpec) -> Result<ClusterRef> {
        let project = resolve_project(spec, self.default_project()).context(TranslateSnafu)?;
        Ok(ClusterRef::new(project, &spec.region, &spec.name))
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_delay: *self.options.initial_backoff,
            max_delay: *self.options.max_backoff,
        }
    }

    fn poller(
        &self,
        timeout: dataproc_shared::time::Duration,
        max_attempts: u32,
    ) -> OperationPoller<'a, C> {
        OperationPoller::new(self.client, self.clock, PollPolicy {
            timeout: *timeout,
            poll_interval: *self.options.poll_interval,
            retry: self.retry_config().with_max_attempts(max_attempts),
        })
    }
}
