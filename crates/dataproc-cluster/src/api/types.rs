//! Payloads exchanged with the provider API.
//!
//! All optional fields are skipped during serialization, which keeps partial payloads (as sent
//! along with an update mask) free of fields the mask doesn't name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ClusterConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Assigned by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_uuid: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gce_cluster_config: Option<GceClusterConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_config: Option<InstanceGroupConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_config: Option<InstanceGroupConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_worker_config: Option<InstanceGroupConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_config: Option<SoftwareConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initialization_actions: Vec<NodeInitializationAction>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GceClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_account_scopes: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_instances: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_config: Option<DiskConfig>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_preemptible: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_size_gb: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_local_ssds: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInitializationAction {
    pub executable_file: String,

    /// Encoded as whole seconds, e.g. `"500s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timeout: Option<String>,
}

/// A long-running provider operation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub done: bool,

    /// Set if the operation finished unsuccessfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            error: None,
        }
    }

    pub fn succeeded(name: impl Into<String>) -> Self {
        Self {
            done: true,
            ..Self::pending(name)
        }
    }

    pub fn failed(name: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            error: Some(Status {
                code,
                message: message.into(),
            }),
            ..Self::succeeded(name)
        }
    }
}
