//! This crate contains provider-agnostic helpers used by the cluster reconciler: resource URI
//! normalization, service account scope canonicalization, the duration codec, and YAML
//! serialization helpers.

pub mod scope;
pub mod time;
pub mod uri;
pub mod yaml;
