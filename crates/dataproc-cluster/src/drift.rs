//! Detects changes which cannot be applied to a running cluster.

use dataproc_shared::{scope::scopes_equivalent, uri::extract_last_segment};

use crate::crd::{DataprocClusterSpec, InitializationAction, InstanceGroupConfig};

/// Lists the attributes set in `desired` which differ from `prior` but can only be changed by
/// replacing the cluster.
///
/// URIs are compared by their last segment and scopes by the access they grant. An image version
/// also matches any more specific version reported by the provider, i.e. `1.3` matches `1.3.7`.
pub fn replacement_fields(
    prior: &DataprocClusterSpec,
    desired: &DataprocClusterSpec,
) -> Vec<&'static str> {
    let mut changes = Changes::default();

    changes.check("name", Some(&desired.name), Some(&prior.name));
    changes.check("project", desired.project.as_ref(), prior.project.as_ref());
    changes.check("region", Some(&desired.region), Some(&prior.region));

    let desired_config = desired.cluster_config.as_ref();
    let prior_config = prior.cluster_config.as_ref();
    changes.check(
        "cluster_config.staging_bucket",
        desired_config.and_then(|config| config.staging_bucket.as_ref()),
        prior_config.and_then(|config| config.staging_bucket.as_ref()),
    );

    if let Some(gce) = desired.gce_cluster_config() {
        let prior_gce = prior.gce_cluster_config();
        changes.check_uri(
            "cluster_config.gce_cluster_config.zone",
            gce.zone.as_deref(),
            prior_gce.and_then(|gce| gce.zone.as_deref()),
        );
        changes.check_uri(
            "cluster_config.gce_cluster_config.network",
            gce.network.as_deref(),
            prior_gce.and_then(|gce| gce.network.as_deref()),
        );
        changes.check_uri(
            "cluster_config.gce_cluster_config.subnetwork",
            gce.subnetwork.as_deref(),
            prior_gce.and_then(|gce| gce.subnetwork.as_deref()),
        );
        changes.check(
            "cluster_config.gce_cluster_config.tags",
            (!gce.tags.is_empty()).then_some(&gce.tags),
            prior_gce.map(|gce| &gce.tags),
        );
        changes.check(
            "cluster_config.gce_cluster_config.service_account",
            gce.service_account.as_ref(),
            prior_gce.and_then(|gce| gce.service_account.as_ref()),
        );

        let prior_scopes = prior_gce.map_or(&[][..], |gce| gce.service_account_scopes.as_slice());
        if !gce.service_account_scopes.is_empty()
            && !scopes_equivalent(&gce.service_account_scopes, prior_scopes)
        {
            changes.push("cluster_config.gce_cluster_config.service_account_scopes");
        }
    }

    if let Some(master) = desired.master_config() {
        let prior_master = prior.master_config();
        changes.check(
            "cluster_config.master_config.num_instances",
            master.num_instances.as_ref(),
            prior_master.and_then(|group| group.num_instances.as_ref()),
        );
        changes.check_instance_group(
            [
                "cluster_config.master_config.machine_type",
                "cluster_config.master_config.disk_config.num_local_ssds",
                "cluster_config.master_config.disk_config.boot_disk_size_gb",
            ],
            master,
            prior_master,
        );
    }

    if let Some(worker) = desired.worker_config() {
        changes.check_instance_group(
            [
                "cluster_config.worker_config.machine_type",
                "cluster_config.worker_config.disk_config.num_local_ssds",
                "cluster_config.worker_config.disk_config.boot_disk_size_gb",
            ],
            worker,
            prior.worker_config(),
        );
    }

    changes.check(
        "cluster_config.preemptible_worker_config.disk_config.boot_disk_size_gb",
        desired
            .preemptible_worker_config()
            .and_then(|group| group.disk_config)
            .and_then(|disk| disk.boot_disk_size_gb)
            .as_ref(),
        prior
            .preemptible_worker_config()
            .and_then(|group| group.disk_config)
            .and_then(|disk| disk.boot_disk_size_gb)
            .as_ref(),
    );

    if let Some(software) = desired.software_config() {
        let prior_software = prior.software_config();
        let prior_version = prior_software.and_then(|software| software.image_version.as_deref());
        let version_changed = software.image_version.as_deref().is_some_and(|version| {
            !prior_version.is_some_and(|prior| image_version_matches(version, prior))
        });
        if version_changed {
            changes.push("cluster_config.software_config.image_version");
        }
        changes.check(
            "cluster_config.software_config.override_properties",
            (!software.override_properties.is_empty()).then_some(&software.override_properties),
            prior_software.map(|software| &software.override_properties),
        );
    }

    let initialization_actions = desired.initialization_actions();
    if !initialization_actions.is_empty()
        && !initialization_actions_match(initialization_actions, prior.initialization_actions())
    {
        changes.push("cluster_config.initialization_action");
    }

    changes.0
}

#[derive(Default)]
struct Changes(Vec<&'static str>);

impl Changes {
    fn push(&mut self, field: &'static str) {
        self.0.push(field);
    }

    /// Records `field` if `desired` is set and differs from `prior`.
    fn check<T: PartialEq + ?Sized>(
        &mut self,
        field: &'static str,
        desired: Option<&T>,
        prior: Option<&T>,
    ) {
        if desired.is_some() && desired != prior {
            self.push(field);
        }
    }

    fn check_uri(&mut self, field: &'static str, desired: Option<&str>, prior: Option<&str>) {
        self.check(
            field,
            desired.map(extract_last_segment),
            prior.map(extract_last_segment),
        );
    }

    fn check_instance_group(
        &mut self,
        [machine_type, num_local_ssds, boot_disk_size_gb]: [&'static str; 3],
        desired: &InstanceGroupConfig,
        prior: Option<&InstanceGroupConfig>,
    ) {
        self.check_uri(
            machine_type,
            desired.machine_type.as_deref(),
            prior.and_then(|group| group.machine_type.as_deref()),
        );

        let desired_disk = desired.disk_config.unwrap_or_default();
        let prior_disk = prior
            .and_then(|group| group.disk_config)
            .unwrap_or_default();
        self.check(
            num_local_ssds,
            desired_disk.num_local_ssds.as_ref(),
            prior_disk.num_local_ssds.as_ref(),
        );
        self.check(
            boot_disk_size_gb,
            desired_disk.boot_disk_size_gb.as_ref(),
            prior_disk.boot_disk_size_gb.as_ref(),
        );
    }
}

/// Scripts must match in order. A timeout left unset is filled in by the provider and only
/// compared if it was asked for.
fn initialization_actions_match(
    desired: &[InitializationAction],
    reported: &[InitializationAction],
) -> bool {
    desired.len() == reported.len()
        && desired.iter().zip(reported).all(|(desired, reported)| {
            desired.script == reported.script
                && desired
                    .timeout_sec
                    .is_none_or(|timeout| reported.timeout_sec == Some(timeout))
        })
}

fn image_version_matches(desired: &str, reported: &str) -> bool {
    reported == desired
        || reported
            .strip_prefix(desired)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('-'))
}
