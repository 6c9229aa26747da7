//! Computes in-place updates.
//!
//! Only a few attributes can be changed on a running cluster. Everything else requires the
//! cluster to be replaced, see [`crate::drift`].

use std::collections::BTreeMap;

use crate::{api, crd::DataprocClusterSpec};

pub const LABELS_FIELD: &str = "labels";
pub const WORKER_COUNT_FIELD: &str = "config.worker_config.num_instances";
pub const PREEMPTIBLE_WORKER_COUNT_FIELD: &str = "config.secondary_worker_config.num_instances";

/// Labels with this prefix are managed by the provider and never part of a patch.
pub const PROVIDER_LABEL_PREFIX: &str = "goog-dataproc-";

/// A partial cluster together with the fields of it that should be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchRequest {
    pub update_mask: Vec<&'static str>,
    pub cluster: api::Cluster,
}

impl PatchRequest {
    /// The mask in the form expected by the provider, e.g.
    /// `labels,config.worker_config.num_instances`.
    pub fn mask(&self) -> String {
        self.update_mask.join(",")
    }
}

/// Returns the patch turning `prior` into `desired`, or [`None`] if no updatable field changed.
///
/// A field only counts as changed if `desired` sets it, unset fields keep whatever the cluster
/// currently has. The mask always lists fields in the same order.
pub fn build_patch(
    prior: &DataprocClusterSpec,
    desired: &DataprocClusterSpec,
) -> Option<PatchRequest> {
    let mut update_mask = Vec::new();
    let mut cluster = api::Cluster::default();

    let desired_labels = user_labels(&desired.labels);
    if !desired_labels.is_empty() && desired_labels != user_labels(&prior.labels) {
        update_mask.push(LABELS_FIELD);
        cluster.labels = desired_labels;
    }

    let worker_count = desired.worker_config().and_then(|group| group.num_instances);
    if changed(
        worker_count,
        prior.worker_config().and_then(|group| group.num_instances),
    ) {
        update_mask.push(WORKER_COUNT_FIELD);
        cluster
            .config
            .get_or_insert_with(Default::default)
            .worker_config = Some(instance_count(worker_count));
    }

    let preemptible_count = desired
        .preemptible_worker_config()
        .and_then(|group| group.num_instances);
    if changed(
        preemptible_count,
        prior
            .preemptible_worker_config()
            .and_then(|group| group.num_instances),
    ) {
        update_mask.push(PREEMPTIBLE_WORKER_COUNT_FIELD);
        cluster
            .config
            .get_or_insert_with(Default::default)
            .secondary_worker_config = Some(instance_count(preemptible_count));
    }

    (!update_mask.is_empty()).then_some(PatchRequest {
        update_mask,
        cluster,
    })
}

fn user_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| !key.starts_with(PROVIDER_LABEL_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn changed<T: PartialEq>(desired: Option<T>, prior: Option<T>) -> bool {
    desired.is_some() && desired != prior
}

fn instance_count(num_instances: Option<u32>) -> api::InstanceGroupConfig {
    api::InstanceGroupConfig {
        num_instances,
        ..api::InstanceGroupConfig::default()
    }
}
