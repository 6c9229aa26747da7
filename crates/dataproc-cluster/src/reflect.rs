//! Flattens a cluster reported by the provider back into the declarative model.

use std::collections::BTreeMap;

use dataproc_shared::{
    time::{DurationParseError, decode_seconds},
    uri::extract_last_segment,
};
use snafu::{ResultExt, Snafu};

use crate::{
    api,
    crd::{self, DataprocClusterSpec, GLOBAL_REGION},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "failed to decode execution timeout {timeout:?} of initialization action {script:?}"
    ))]
    DecodeExecutionTimeout {
        source: DurationParseError,
        script: String,
        timeout: String,
    },
}

/// Builds the live state of `cluster`.
///
/// Blocks the provider didn't report are left out. Attributes the provider never reports back
/// keep their defaults, use [`reflect_onto`] to carry them over from a previous state.
pub fn reflect(cluster: &api::Cluster) -> Result<DataprocClusterSpec> {
    Ok(DataprocClusterSpec {
        name: cluster.cluster_name.clone(),
        project: (!cluster.project_id.is_empty()).then(|| cluster.project_id.clone()),
        region: GLOBAL_REGION.to_owned(),
        labels: cluster.labels.clone(),
        cluster_config: cluster
            .config
            .as_ref()
            .map(cluster_config)
            .transpose()?,
    })
}

/// Like [`reflect`], but takes the write-only attributes (region, staging bucket, bucket
/// deletion and override properties) from `prior`, so they don't show up as drift.
pub fn reflect_onto(prior: &DataprocClusterSpec, cluster: &api::Cluster) -> Result<DataprocClusterSpec> {
    let mut live = reflect(cluster)?;
    live.region.clone_from(&prior.region);
    if live.project.is_none() {
        live.project.clone_from(&prior.project);
    }

    if let Some(prior_config) = &prior.cluster_config {
        let config = live.cluster_config.get_or_insert_with(Default::default);
        config.delete_autogen_bucket = prior_config.delete_autogen_bucket;
        config.staging_bucket.clone_from(&prior_config.staging_bucket);

        if let Some(prior_software) = &prior_config.software_config {
            config
                .software_config
                .get_or_insert_with(Default::default)
                .override_properties
                .clone_from(&prior_software.override_properties);
        }
    }

    Ok(live)
}

fn cluster_config(config: &api::ClusterConfig) -> Result<crd::ClusterConfig> {
    Ok(crd::ClusterConfig {
        delete_autogen_bucket: false,
        staging_bucket: None,
        bucket: config.config_bucket.clone(),
        gce_cluster_config: config.gce_cluster_config.as_ref().map(gce_cluster_config),
        master_config: config.master_config.as_ref().map(instance_group_config),
        worker_config: config.worker_config.as_ref().map(instance_group_config),
        preemptible_worker_config: config
            .secondary_worker_config
            .as_ref()
            .map(preemptible_instance_group_config),
        software_config: config.software_config.as_ref().map(|software| crd::SoftwareConfig {
            image_version: software.image_version.clone(),
            override_properties: BTreeMap::new(),
            properties: software.properties.clone(),
        }),
        initialization_actions: config
            .initialization_actions
            .iter()
            .map(initialization_action)
            .collect::<Result<_>>()?,
    })
}

fn gce_cluster_config(gce: &api::GceClusterConfig) -> crd::GceClusterConfig {
    let mut service_account_scopes = gce.service_account_scopes.clone();
    service_account_scopes.sort();

    crd::GceClusterConfig {
        zone: gce.zone_uri.as_deref().map(short_name),
        network: gce.network_uri.as_deref().map(short_name),
        subnetwork: gce.subnetwork_uri.as_deref().map(short_name),
        tags: gce.tags.clone(),
        service_account: gce.service_account.clone(),
        service_account_scopes,
    }
}

fn instance_group_config(group: &api::InstanceGroupConfig) -> crd::InstanceGroupConfig {
    crd::InstanceGroupConfig {
        num_instances: group.num_instances,
        machine_type: group.machine_type_uri.as_deref().map(short_name),
        disk_config: group.disk_config.map(|disk| crd::DiskConfig {
            num_local_ssds: disk.num_local_ssds,
            boot_disk_size_gb: disk.boot_disk_size_gb,
        }),
        instance_names: group.instance_names.clone(),
    }
}

fn preemptible_instance_group_config(
    group: &api::InstanceGroupConfig,
) -> crd::PreemptibleInstanceGroupConfig {
    crd::PreemptibleInstanceGroupConfig {
        num_instances: group.num_instances,
        disk_config: group.disk_config.map(|disk| crd::PreemptibleDiskConfig {
            boot_disk_size_gb: disk.boot_disk_size_gb,
        }),
        instance_names: group.instance_names.clone(),
    }
}

fn initialization_action(
    action: &api::NodeInitializationAction,
) -> Result<crd::InitializationAction> {
    let timeout_sec = action
        .execution_timeout
        .as_deref()
        .map(|timeout| {
            decode_seconds(timeout).context(DecodeExecutionTimeoutSnafu {
                script: &action.executable_file,
                timeout,
            })
        })
        .transpose()?;

    Ok(crd::InitializationAction {
        script: action.executable_file.clone(),
        timeout_sec,
    })
}

fn short_name(uri: &str) -> String {
    extract_last_segment(uri).to_owned()
}
