//! The declarative model of a managed cluster.
//!
//! [`DataprocClusterSpec`] is what users write. The same tree is also used for the live state
//! reflected from the provider, in which case the computed attributes (bucket, instance names,
//! reported properties) are populated as well.

use std::{collections::BTreeMap, path::Path};

use dataproc_shared::yaml;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::validation::{self, ConflictingFieldsSnafu, MissingZoneSnafu};

mod block;

/// The sentinel region which requires an explicit zone.
pub const GLOBAL_REGION: &str = "global";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load cluster document"))]
    LoadDocument { source: yaml::Error },

    #[snafu(display("failed to serialize the declarative schema"))]
    SerializeSchema { source: serde_json::Error },
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct DataprocClusterSpec {
    /// The name of the cluster, unique within the project and region. Changing it forces a new
    /// cluster.
    pub name: String,

    /// The project the cluster belongs to. Falls back to the configured default project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// The region the cluster is created in.
    #[serde(default = "default_region")]
    pub region: String,

    /// User labels. The provider adds its own `goog-dataproc-*` labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(
        default,
        deserialize_with = "block::cluster_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub cluster_config: Option<ClusterConfig>,
}

fn default_region() -> String {
    GLOBAL_REGION.to_owned()
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct ClusterConfig {
    /// Empty and delete the bucket the provider generated for the cluster when the cluster is
    /// deleted. Has no effect if a `staging_bucket` was supplied.
    #[serde(default)]
    pub delete_autogen_bucket: bool,

    /// A user supplied bucket to stage job dependencies and driver output in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_bucket: Option<String>,

    /// The bucket in use by the cluster, either the `staging_bucket` or the one generated by
    /// the provider. Computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(
        default,
        deserialize_with = "block::gce_cluster_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub gce_cluster_config: Option<GceClusterConfig>,

    #[serde(
        default,
        deserialize_with = "block::master_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub master_config: Option<InstanceGroupConfig>,

    #[serde(
        default,
        deserialize_with = "block::worker_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub worker_config: Option<InstanceGroupConfig>,

    #[serde(
        default,
        deserialize_with = "block::preemptible_worker_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub preemptible_worker_config: Option<PreemptibleInstanceGroupConfig>,

    #[serde(
        default,
        deserialize_with = "block::software_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub software_config: Option<SoftwareConfig>,

    /// Scripts executed on every node after the cluster has been set up.
    #[serde(
        default,
        rename = "initialization_action",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub initialization_actions: Vec<InitializationAction>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct GceClusterConfig {
    /// The zone the instances are placed in. Mandatory if the region is `global`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Name or URI of the network. Conflicts with `subnetwork`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Name or URI of the subnetwork. Conflicts with `network`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Scope URIs or short aliases like `storage-rw`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_account_scopes: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct InstanceGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_instances: Option<u32>,

    /// Machine type name or URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "block::disk_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_config: Option<DiskConfig>,

    /// Names of the instances in this group. Computed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_names: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct DiskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_local_ssds: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_size_gb: Option<u32>,
}

/// Preemptible workers always use the machine type of the primary workers, and the provider
/// ignores any local SSD count, so neither can be configured here.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct PreemptibleInstanceGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_instances: Option<u32>,

    #[serde(
        default,
        deserialize_with = "block::disk_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_config: Option<PreemptibleDiskConfig>,

    /// Names of the instances in this group. Computed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_names: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct PreemptibleDiskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_size_gb: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct SoftwareConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,

    /// Properties passed to the cluster software, e.g. `dataproc:dataproc.allow.zero.workers`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub override_properties: BTreeMap<String, String>,

    /// All properties reported by the cluster. Computed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct InitializationAction {
    /// URI of the executable to run.
    pub script: String,

    /// Execution timeout in seconds. The provider default applies if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
}

impl DataprocClusterSpec {
    /// Creates a spec with only a name and the default region set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: None,
            region: default_region(),
            labels: BTreeMap::new(),
            cluster_config: None,
        }
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        yaml::from_str(input).context(LoadDocumentSnafu)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        yaml::from_file(path).context(LoadDocumentSnafu)
    }

    /// Returns the JSON schema of the declarative surface.
    pub fn json_schema() -> Result<serde_json::Value, Error> {
        serde_json::to_value(schemars::schema_for!(Self)).context(SerializeSchemaSnafu)
    }

    /// Checks every rule which can be checked without talking to the provider and returns all
    /// violations at once.
    pub fn validate(&self) -> Result<(), validation::Errors> {
        let mut validations = Vec::new();

        if let Err(errors) = validation::is_cluster_name(&self.name) {
            validations.extend(errors.into_iter().map(Err));
        }

        let gce = self.gce_cluster_config();
        if gce.is_some_and(|gce| gce.network.is_some() && gce.subnetwork.is_some()) {
            validations.push(
                ConflictingFieldsSnafu {
                    first: "cluster_config.gce_cluster_config.network",
                    second: "cluster_config.gce_cluster_config.subnetwork",
                }
                .fail(),
            );
        }

        let has_zone = gce
            .and_then(|gce| gce.zone.as_deref())
            .is_some_and(|zone| !zone.is_empty());
        if self.region == GLOBAL_REGION && !has_zone {
            validations.push(
                MissingZoneSnafu {
                    region: &self.region,
                }
                .fail(),
            );
        }

        let config = self.cluster_config.as_ref();
        let disk_sizes = [
            (
                "cluster_config.master_config.disk_config.boot_disk_size_gb",
                config
                    .and_then(|c| c.master_config.as_ref())
                    .and_then(|group| group.disk_config)
                    .and_then(|disk| disk.boot_disk_size_gb),
            ),
            (
                "cluster_config.worker_config.disk_config.boot_disk_size_gb",
                config
                    .and_then(|c| c.worker_config.as_ref())
                    .and_then(|group| group.disk_config)
                    .and_then(|disk| disk.boot_disk_size_gb),
            ),
            (
                "cluster_config.preemptible_worker_config.disk_config.boot_disk_size_gb",
                config
                    .and_then(|c| c.preemptible_worker_config.as_ref())
                    .and_then(|group| group.disk_config)
                    .and_then(|disk| disk.boot_disk_size_gb),
            ),
        ];
        for (field, size) in disk_sizes {
            if let Some(size) = size {
                validations.push(validation::is_boot_disk_size(field, size));
            }
        }

        validation::validate_all(validations)
    }

    pub fn gce_cluster_config(&self) -> Option<&GceClusterConfig> {
        self.cluster_config.as_ref()?.gce_cluster_config.as_ref()
    }

    pub fn master_config(&self) -> Option<&InstanceGroupConfig> {
        self.cluster_config.as_ref()?.master_config.as_ref()
    }

    pub fn worker_config(&self) -> Option<&InstanceGroupConfig> {
        self.cluster_config.as_ref()?.worker_config.as_ref()
    }

    pub fn preemptible_worker_config(&self) -> Option<&PreemptibleInstanceGroupConfig> {
        self.cluster_config.as_ref()?.preemptible_worker_config.as_ref()
    }

    pub fn software_config(&self) -> Option<&SoftwareConfig> {
        self.cluster_config.as_ref()?.software_config.as_ref()
    }

    pub fn initialization_actions(&self) -> &[InitializationAction] {
        self.cluster_config
            .as_ref()
            .map_or(&[], |config| config.initialization_actions.as_slice())
    }
}
