//! Service account scope canonicalization.
//!
//! Users may refer to OAuth scopes using short aliases (`storage-rw`) or fully
//! qualified URIs. The provider only ever reports fully qualified URIs and
//! silently adds a set of baseline scopes to every cluster, so scopes are
//! canonicalized and sorted before they are sent or compared.

use std::collections::BTreeSet;

use const_format::concatcp;

/// The common prefix of all fully qualified scope URIs.
pub const SCOPE_URI_PREFIX: &str = "https://www.googleapis.com/auth/";

/// Scopes the provider injects into every cluster, regardless of the
/// requested set.
pub const BASELINE_SCOPES: [&str; 3] = [
    concatcp!(SCOPE_URI_PREFIX, "cloud.useraccounts.readonly"),
    concatcp!(SCOPE_URI_PREFIX, "devstorage.read_write"),
    concatcp!(SCOPE_URI_PREFIX, "logging.write"),
];

/// Short scope aliases accepted in place of fully qualified scope URIs.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::EnumIter, strum::AsRefStr,
)]
pub enum ScopeAlias {
    #[strum(serialize = "bigquery")]
    BigQuery,

    #[strum(serialize = "cloud-platform")]
    CloudPlatform,

    #[strum(serialize = "cloud-source-repos")]
    CloudSourceRepos,

    #[strum(serialize = "cloud-source-repos-ro")]
    CloudSourceReposReadOnly,

    #[strum(serialize = "compute-ro")]
    ComputeReadOnly,

    #[strum(serialize = "compute-rw")]
    ComputeReadWrite,

    #[strum(serialize = "datastore")]
    Datastore,

    #[strum(serialize = "logging-write")]
    LoggingWrite,

    #[strum(serialize = "monitoring")]
    Monitoring,

    #[strum(serialize = "monitoring-write")]
    MonitoringWrite,

    #[strum(serialize = "pubsub")]
    PubSub,

    #[strum(serialize = "service-control")]
    ServiceControl,

    #[strum(serialize = "service-management")]
    ServiceManagement,

    #[strum(serialize = "sql")]
    Sql,

    #[strum(serialize = "sql-admin")]
    SqlAdmin,

    #[strum(serialize = "storage-full")]
    StorageFull,

    #[strum(serialize = "storage-ro")]
    StorageReadOnly,

    #[strum(serialize = "storage-rw")]
    StorageReadWrite,

    #[strum(serialize = "taskqueue")]
    TaskQueue,

    #[strum(serialize = "useraccounts-ro")]
    UserAccountsReadOnly,

    #[strum(serialize = "useraccounts-rw")]
    UserAccountsReadWrite,

    #[strum(serialize = "userinfo-email")]
    UserInfoEmail,
}

impl ScopeAlias {
    /// Returns the fully qualified scope URI this alias stands for.
    pub const fn uri(self) -> &'static str {
        match self {
            Self::BigQuery => concatcp!(SCOPE_URI_PREFIX, "bigquery"),
            Self::CloudPlatform => concatcp!(SCOPE_URI_PREFIX, "cloud-platform"),
            Self::CloudSourceRepos => concatcp!(SCOPE_URI_PREFIX, "source.full_control"),
            Self::CloudSourceReposReadOnly => concatcp!(SCOPE_URI_PREFIX, "source.read_only"),
            Self::ComputeReadOnly => concatcp!(SCOPE_URI_PREFIX, "compute.readonly"),
            Self::ComputeReadWrite => concatcp!(SCOPE_URI_PREFIX, "compute"),
            Self::Datastore => concatcp!(SCOPE_URI_PREFIX, "datastore"),
            Self::LoggingWrite => concatcp!(SCOPE_URI_PREFIX, "logging.write"),
            Self::Monitoring => concatcp!(SCOPE_URI_PREFIX, "monitoring"),
            Self::MonitoringWrite => concatcp!(SCOPE_URI_PREFIX, "monitoring.write"),
            Self::PubSub => concatcp!(SCOPE_URI_PREFIX, "pubsub"),
            Self::ServiceControl => concatcp!(SCOPE_URI_PREFIX, "servicecontrol"),
            Self::ServiceManagement => {
                concatcp!(SCOPE_URI_PREFIX, "service.management.readonly")
            }
            Self::Sql => concatcp!(SCOPE_URI_PREFIX, "sqlservice"),
            Self::SqlAdmin => concatcp!(SCOPE_URI_PREFIX, "sqlservice.admin"),
            Self::StorageFull => concatcp!(SCOPE_URI_PREFIX, "devstorage.full_control"),
            Self::StorageReadOnly => concatcp!(SCOPE_URI_PREFIX, "devstorage.read_only"),
            Self::StorageReadWrite => concatcp!(SCOPE_URI_PREFIX, "devstorage.read_write"),
            Self::TaskQueue => concatcp!(SCOPE_URI_PREFIX, "taskqueue"),
            Self::UserAccountsReadOnly => {
                concatcp!(SCOPE_URI_PREFIX, "cloud.useraccounts.readonly")
            }
            Self::UserAccountsReadWrite => concatcp!(SCOPE_URI_PREFIX, "cloud.useraccounts"),
            Self::UserInfoEmail => concatcp!(SCOPE_URI_PREFIX, "userinfo.email"),
        }
    }
}

/// Maps a short alias to its fully qualified scope URI. Anything else,
/// including already qualified URIs and unknown aliases, is returned as-is.
pub fn canonicalize_scope(scope: &str) -> String {
    scope
        .parse::<ScopeAlias>()
        .map_or_else(|_| scope.to_owned(), |alias| alias.uri().to_owned())
}

/// Canonicalizes every scope and sorts the result lexicographically.
pub fn canonicalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scopes: Vec<_> = scopes
        .into_iter()
        .map(|scope| canonicalize_scope(scope.as_ref()))
        .collect();
    scopes.sort();
    scopes
}

/// Returns `true` if both scope sets grant the same access once canonicalized
/// and once the provider-injected [`BASELINE_SCOPES`] are taken into account.
pub fn scopes_equivalent<A, B>(left: A, right: B) -> bool
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    effective_scopes(left) == effective_scopes(right)
}

fn effective_scopes<I>(scopes: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    scopes
        .into_iter()
        .map(|scope| canonicalize_scope(scope.as_ref()))
        .chain(BASELINE_SCOPES.iter().map(|scope| (*scope).to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[rstest]
    #[case("storage-rw", "https://www.googleapis.com/auth/devstorage.read_write")]
    #[case("cloud-platform", "https://www.googleapis.com/auth/cloud-platform")]
    #[case(
        "useraccounts-ro",
        "https://www.googleapis.com/auth/cloud.useraccounts.readonly"
    )]
    #[case(
        "https://www.googleapis.com/auth/monitoring",
        "https://www.googleapis.com/auth/monitoring"
    )]
    #[case("not-an-alias", "not-an-alias")]
    fn canonicalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(canonicalize_scope(input), expected);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for alias in ScopeAlias::iter() {
            let once = canonicalize_scope(alias.as_ref());
            assert_eq!(canonicalize_scope(&once), once, "alias {alias:?}");
            assert!(once.starts_with(SCOPE_URI_PREFIX));
        }
    }

    #[test]
    fn canonicalized_scopes_are_sorted() {
        let scopes = canonicalize_scopes(["storage-rw", "bigquery", "compute-ro"]);
        assert_eq!(
            scopes,
            vec![
                "https://www.googleapis.com/auth/bigquery",
                "https://www.googleapis.com/auth/compute.readonly",
                "https://www.googleapis.com/auth/devstorage.read_write",
            ]
        );
    }

    #[test]
    fn canonicalization_is_order_independent() {
        let left = canonicalize_scopes(["pubsub", "sql", "https://www.googleapis.com/auth/bigquery"]);
        let right = canonicalize_scopes(["bigquery", "pubsub", "sql"]);
        assert_eq!(left, right);
    }

    #[rstest]
    #[case(&["cloud-platform"], &["https://www.googleapis.com/auth/cloud-platform"], true)]
    #[case(
        &["cloud-platform"],
        &[
            "https://www.googleapis.com/auth/logging.write",
            "https://www.googleapis.com/auth/cloud-platform",
            "https://www.googleapis.com/auth/devstorage.read_write",
            "https://www.googleapis.com/auth/cloud.useraccounts.readonly",
        ],
        true
    )]
    #[case(&["storage-rw", "pubsub"], &["pubsub"], true)]
    #[case(&["bigquery"], &["pubsub"], false)]
    #[case(&[], &["sql"], false)]
    fn equivalence(#[case] left: &[&str], #[case] right: &[&str], #[case] expected: bool) {
        assert_eq!(scopes_equivalent(left, right), expected);
        assert_eq!(scopes_equivalent(right, left), expected);
    }
}
