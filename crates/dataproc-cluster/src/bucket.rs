//! Cleanup of the staging bucket the provider generates for a cluster.

use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::{
    api::{ApiError, ProviderClient},
    crd::DataprocClusterSpec,
    poller::{Clock, RetryConfig, retry_rate_limited},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list objects of bucket {bucket:?}"))]
    ListObjects { source: ApiError, bucket: String },

    #[snafu(display("failed to delete object {object:?} from bucket {bucket:?}"))]
    DeleteObject {
        source: ApiError,
        bucket: String,
        object: String,
    },

    #[snafu(display("failed to delete bucket {bucket:?}"))]
    DeleteBucket { source: ApiError, bucket: String },
}

/// Returns the generated bucket which should be removed together with the cluster.
///
/// That is only the case if the user asked for it and didn't supply their own staging bucket.
pub fn autogen_bucket_to_delete(live: &DataprocClusterSpec) -> Option<&str> {
    let config = live.cluster_config.as_ref()?;
    if !config.delete_autogen_bucket || config.staging_bucket.is_some() {
        return None;
    }
    config.bucket.as_deref().filter(|bucket| !bucket.is_empty())
}

/// Deletes all objects in `bucket` and then the bucket itself.
///
/// Objects and buckets which are already gone are skipped. Deleting the bucket is retried while
/// it is rate limited.
pub fn empty_and_delete_bucket<C>(
    client: &C,
    clock: &dyn Clock,
    retry: &RetryConfig,
    bucket: &str,
) -> Result<()>
where
    C: ProviderClient + ?Sized,
{
    let objects = match client.list_objects(bucket) {
        Ok(objects) => objects,
        Err(err) if err.is_not_found() => {
            debug!(bucket, "bucket is already gone");
            return Ok(());
        }
        Err(source) => return Err(source).context(ListObjectsSnafu { bucket }),
    };

    info!(bucket, objects = objects.len(), "emptying bucket");
    for object in &objects {
        match client.delete_object(bucket, object) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(source) => return Err(source).context(DeleteObjectSnafu { bucket, object }),
        }
    }

    let description = format!("deleting bucket {bucket}");
    match retry_rate_limited(clock, retry, &description, || client.delete_bucket(bucket)) {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(source) => return Err(source).context(DeleteBucketSnafu { bucket }),
    }

    info!(bucket, "deleted bucket");
    Ok(())
}
