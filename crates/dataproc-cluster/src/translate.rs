//! Turns a [`DataprocClusterSpec`] into the payload used to create a cluster.

use dataproc_shared::{scope::canonicalize_scopes, time::encode_seconds, uri::extract_last_segment};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    api,
    crd::{self, DataprocClusterSpec},
    validation,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster {name:?} is invalid: {source}"))]
    Validate {
        source: validation::Errors,
        name: String,
    },

    #[snafu(display("cluster {name:?} has no project and no default project is configured"))]
    MissingProject { name: String },
}

/// Returns the project the cluster lives in, falling back to `default_project`.
pub fn resolve_project<'a>(
    spec: &'a DataprocClusterSpec,
    default_project: Option<&'a str>,
) -> Result<&'a str> {
    spec.project
        .as_deref()
        .or(default_project)
        .filter(|project| !project.is_empty())
        .context(MissingProjectSnafu { name: &spec.name })
}

/// Validates `spec` and builds the full create payload from it.
///
/// Machine types, networks and subnetworks are sent as short names, scopes are canonicalized and
/// sorted. The zone is passed through unchanged.
pub fn translate(spec: &DataprocClusterSpec, default_project: Option<&str>) -> Result<api::Cluster> {
    spec.validate().context(ValidateSnafu { name: &spec.name })?;
    let project = resolve_project(spec, default_project)?;

    Ok(api::Cluster {
        cluster_name: spec.name.clone(),
        project_id: project.to_owned(),
        config: spec.cluster_config.as_ref().map(cluster_config),
        labels: spec.labels.clone(),
        cluster_uuid: None,
    })
}

fn cluster_config(config: &crd::ClusterConfig) -> api::ClusterConfig {
    api::ClusterConfig {
        config_bucket: config.staging_bucket.clone(),
        gce_cluster_config: config.gce_cluster_config.as_ref().map(gce_cluster_config),
        master_config: config.master_config.as_ref().map(instance_group_config),
        worker_config: config.worker_config.as_ref().map(instance_group_config),
        secondary_worker_config: config
            .preemptible_worker_config
            .as_ref()
            .map(preemptible_instance_group_config),
        software_config: config.software_config.as_ref().map(software_config),
        initialization_actions: config
            .initialization_actions
            .iter()
            .map(initialization_action)
            .collect(),
    }
}

fn gce_cluster_config(gce: &crd::GceClusterConfig) -> api::GceClusterConfig {
    api::GceClusterConfig {
        zone_uri: gce.zone.clone(),
        network_uri: gce.network.as_deref().map(short_name),
        subnetwork_uri: gce.subnetwork.as_deref().map(short_name),
        tags: gce.tags.clone(),
        service_account: gce.service_account.clone(),
        service_account_scopes: canonicalize_scopes(&gce.service_account_scopes),
    }
}

fn instance_group_config(group: &crd::InstanceGroupConfig) -> api::InstanceGroupConfig {
    api::InstanceGroupConfig {
        num_instances: group.num_instances,
        machine_type_uri: group.machine_type.as_deref().map(short_name),
        disk_config: group.disk_config.map(|disk| api::DiskConfig {
            boot_disk_size_gb: disk.boot_disk_size_gb,
            num_local_ssds: disk.num_local_ssds,
        }),
        ..api::InstanceGroupConfig::default()
    }
}

fn preemptible_instance_group_config(
    group: &crd::PreemptibleInstanceGroupConfig,
) -> api::InstanceGroupConfig {
    api::InstanceGroupConfig {
        num_instances: group.num_instances,
        disk_config: group.disk_config.map(|disk| api::DiskConfig {
            boot_disk_size_gb: disk.boot_disk_size_gb,
            num_local_ssds: None,
        }),
        is_preemptible: group.num_instances.is_some_and(|count| count > 0),
        ..api::InstanceGroupConfig::default()
    }
}

fn software_config(software: &crd::SoftwareConfig) -> api::SoftwareConfig {
    api::SoftwareConfig {
        image_version: software.image_version.clone(),
        properties: software.override_properties.clone(),
    }
}

fn initialization_action(action: &crd::InitializationAction) -> api::NodeInitializationAction {
    api::NodeInitializationAction {
        executable_file: action.script.clone(),
        execution_timeout: action.timeout_sec.map(encode_seconds),
    }
}

fn short_name(uri: &str) -> String {
    extract_last_segment(uri).to_owned()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    fn spec(yaml: &str) -> DataprocClusterSpec {
        DataprocClusterSpec::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn translates_full_spec() {
        let cluster = translate(
            &spec(indoc! {"
                name: etl
                region: europe-west1
                labels:
                  env: prod
                cluster_config:
                  staging_bucket: etl-staging
                  gce_cluster_config:
                    zone: europe-west1-b
                    subnetwork: projects/p/regions/europe-west1/subnetworks/etl-sub
                    tags: [spark]
                    service_account_scopes: [storage-rw, bigquery]
                  master_config:
                    num_instances: 1
                    machine_type: https://www.googleapis.com/compute/v1/projects/p/zones/europe-west1-b/machineTypes/n1-standard-4
                    disk_config:
                      boot_disk_size_gb: 50
                  worker_config:
                    num_instances: 2
                  preemptible_worker_config:
                    num_instances: 3
                    disk_config:
                      boot_disk_size_gb: 20
                  software_config:
                    image_version: '1.3'
                    override_properties:
                      spark:spark.executor.cores: '2'
                  initialization_action:
                    - script: gs://etl-staging/init.sh
                      timeout_sec: 500
                    - script: gs://etl-staging/other.sh
            "}),
            Some("fallback"),
        )
        .unwrap();

        assert_eq!(cluster.cluster_name, "etl");
        assert_eq!(cluster.project_id, "fallback");
        assert_eq!(cluster.labels["env"], "prod");

        let config = cluster.config.unwrap();
        assert_eq!(config.config_bucket.as_deref(), Some("etl-staging"));

        let gce = config.gce_cluster_config.unwrap();
        assert_eq!(gce.zone_uri.as_deref(), Some("europe-west1-b"));
        assert_eq!(gce.network_uri, None);
        assert_eq!(gce.subnetwork_uri.as_deref(), Some("etl-sub"));
        assert_eq!(
            gce.service_account_scopes,
            vec![
                "https://www.googleapis.com/auth/bigquery",
                "https://www.googleapis.com/auth/devstorage.read_write",
            ]
        );

        let master = config.master_config.unwrap();
        assert_eq!(master.machine_type_uri.as_deref(), Some("n1-standard-4"));
        assert_eq!(master.disk_config.unwrap().boot_disk_size_gb, Some(50));
        assert!(!master.is_preemptible);

        let secondary = config.secondary_worker_config.unwrap();
        assert_eq!(secondary.num_instances, Some(3));
        assert!(secondary.is_preemptible);
        assert_eq!(secondary.machine_type_uri, None);

        let software = config.software_config.unwrap();
        assert_eq!(software.properties["spark:spark.executor.cores"], "2");

        assert_eq!(
            config.initialization_actions[0].execution_timeout.as_deref(),
            Some("500s")
        );
        assert_eq!(config.initialization_actions[1].execution_timeout, None);
    }

    #[rstest]
    #[case::absent(None, false)]
    #[case::zero(Some(0), false)]
    #[case::some(Some(2), true)]
    fn secondary_workers_are_preemptible_when_requested(
        #[case] num_instances: Option<u32>,
        #[case] preemptible: bool,
    ) {
        let group = crd::PreemptibleInstanceGroupConfig {
            num_instances,
            ..crd::PreemptibleInstanceGroupConfig::default()
        };
        assert_eq!(
            preemptible_instance_group_config(&group).is_preemptible,
            preemptible
        );
    }

    #[test]
    fn global_region_requires_zone() {
        let err = translate(&spec("name: etl\nproject: p"), None).unwrap_err();
        assert!(
            matches!(&err, Error::Validate { source, .. } if matches!(
                source.iter().next(),
                Some(validation::Error::MissingZone { .. })
            )),
            "{err:?}"
        );
    }

    #[test]
    fn spec_project_wins_over_default() {
        let cluster = translate(&spec("name: etl\nproject: own\nregion: us-east1"), Some("other"))
            .unwrap();
        assert_eq!(cluster.project_id, "own");
        assert_eq!(cluster.config, None);
    }

    #[test]
    fn missing_project() {
        let err = translate(&spec("name: etl\nregion: us-east1"), None).unwrap_err();
        assert!(matches!(err, Error::MissingProject { .. }));
    }
}
