//! Resource URI helpers.
//!
//! The provider accepts machine types, networks and zones either as short
//! names (`n1-standard-4`) or as fully qualified URIs
//! (`https://www.googleapis.com/compute/v1/projects/p/zones/z/machineTypes/n1-standard-4`),
//! but always reports the latter. Comparing and storing the short form keeps
//! the declarative state stable.

/// Returns the part of `uri` after the last `/`, or `uri` itself if it does
/// not contain a `/`.
pub fn extract_last_segment(uri: &str) -> &str {
    uri.rsplit_once('/').map_or(uri, |(_, last)| last)
}
