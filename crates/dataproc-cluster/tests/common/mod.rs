//! An in-memory provider and a manual clock shared by the integration tests.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
    time::{Duration, Instant},
};

use dataproc_cluster::{
    api::{ApiError, Cluster, ClusterRef, Operation, ProviderClient},
    poller::Clock,
    shared::scope::BASELINE_SCOPES,
};

/// How operations started by the [`FakeProvider`] end.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Done after the given number of polls.
    Succeed { after_polls: usize },

    /// Done with an error after the first poll.
    Fail { code: i32, message: String },

    /// Never done.
    Hang,
}

#[derive(Debug)]
struct PendingOperation {
    polls_left: usize,
    outcome: Outcome,
}

/// Behaves like the provider would, as far as the reconciler can tell.
///
/// Changes are applied as soon as a request is accepted, the returned operation only reports
/// when they are done.
pub struct FakeProvider {
    pub clusters: RefCell<BTreeMap<String, Cluster>>,
    pub buckets: RefCell<BTreeMap<String, Vec<String>>>,
    pub calls: RefCell<Vec<String>>,

    /// The outcome of the next operations started.
    pub outcome: RefCell<Outcome>,

    /// Errors returned by the next mutating cluster requests, before anything is applied.
    pub submit_errors: RefCell<VecDeque<ApiError>>,

    /// Errors returned by the next bucket deletions.
    pub bucket_errors: RefCell<VecDeque<ApiError>>,

    operations: RefCell<BTreeMap<String, PendingOperation>>,
    next_operation: Cell<usize>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            clusters: RefCell::default(),
            buckets: RefCell::default(),
            calls: RefCell::default(),
            outcome: RefCell::new(Outcome::Succeed { after_polls: 2 }),
            submit_errors: RefCell::default(),
            bucket_errors: RefCell::default(),
            operations: RefCell::default(),
            next_operation: Cell::new(0),
        }
    }
}

impl FakeProvider {
    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.split(' ').next() == Some(method))
            .count()
    }

    pub fn cluster(&self, name: &str) -> Option<Cluster> {
        self.clusters.borrow().get(name).cloned()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn submit(&self) -> Result<Operation, ApiError> {
        if let Some(err) = self.submit_errors.borrow_mut().pop_front() {
            return Err(err);
        }

        let id = self.next_operation.get();
        self.next_operation.set(id + 1);
        let name = format!("projects/p/regions/r/operations/{id}");

        let outcome = self.outcome.borrow().clone();
        let polls_left = match outcome {
            Outcome::Succeed { after_polls } => after_polls,
            Outcome::Fail { .. } | Outcome::Hang => 1,
        };
        self.operations
            .borrow_mut()
            .insert(name.clone(), PendingOperation { polls_left, outcome });

        Ok(Operation::pending(name))
    }

    fn succeeds(&self) -> bool {
        matches!(*self.outcome.borrow(), Outcome::Succeed { .. })
    }
}

impl ProviderClient for FakeProvider {
    fn create_cluster(
        &self,
        project: &str,
        region: &str,
        cluster: &Cluster,
    ) -> Result<Operation, ApiError> {
        self.record(format!("create_cluster {}", cluster.cluster_name));
        let operation = self.submit()?;
        if !self.succeeds() {
            return Ok(operation);
        }

        let mut created = cluster.clone();
        created.project_id = project.to_owned();
        created.cluster_uuid = Some(format!("uuid-{}", cluster.cluster_name));
        created.labels.insert(
            "goog-dataproc-cluster-name".to_owned(),
            cluster.cluster_name.clone(),
        );
        created
            .labels
            .insert("goog-dataproc-location".to_owned(), region.to_owned());

        let config = created.config.get_or_insert_with(Default::default);
        let bucket = config
            .config_bucket
            .get_or_insert_with(|| format!("dataproc-{}-generated", cluster.cluster_name))
            .clone();
        self.buckets.borrow_mut().entry(bucket).or_insert_with(|| {
            vec![
                "google-cloud-dataproc-metainfo/uuid/driveroutput".to_owned(),
                "google-cloud-dataproc-metainfo/uuid/cluster.yaml".to_owned(),
            ]
        });

        if let Some(gce) = config.gce_cluster_config.as_mut() {
            if let Some(zone) = gce.zone_uri.as_mut() {
                *zone = format!("https://www.googleapis.com/compute/v1/projects/{project}/zones/{zone}");
            }
            gce.service_account_scopes
                .extend(BASELINE_SCOPES.iter().map(|scope| (*scope).to_owned()));
            gce.service_account_scopes.sort();
            gce.service_account_scopes.dedup();
        }
        for (suffix, group) in [
            ("m", config.master_config.as_mut()),
            ("w", config.worker_config.as_mut()),
            ("sw", config.secondary_worker_config.as_mut()),
        ] {
            if let Some(group) = group {
                group.instance_names = instance_names(&cluster.cluster_name, suffix, group.num_instances);
            }
        }
        for action in &mut config.initialization_actions {
            action
                .execution_timeout
                .get_or_insert_with(|| "600s".to_owned());
        }
        if let Some(software) = config.software_config.as_mut() {
            if let Some(version) = software.image_version.as_mut() {
                version.push_str(".7-deb9");
            }
        }

        self.clusters
            .borrow_mut()
            .insert(cluster.cluster_name.clone(), created);
        Ok(operation)
    }

    fn patch_cluster(
        &self,
        cluster_ref: &ClusterRef,
        cluster: &Cluster,
        update_mask: &str,
    ) -> Result<Operation, ApiError> {
        self.record(format!("patch_cluster {} {update_mask}", cluster_ref.name));
        let operation = self.submit()?;
        if !self.succeeds() {
            return Ok(operation);
        }

        let mut clusters = self.clusters.borrow_mut();
        let Some(existing) = clusters.get_mut(&cluster_ref.name) else {
            return Err(ApiError::NotFound {
                resource: cluster_ref.to_string(),
            });
        };

        let patch = cluster.config.clone().unwrap_or_default();
        for field in update_mask.split(',') {
            let config = existing.config.get_or_insert_with(Default::default);
            match field {
                "labels" => {
                    existing
                        .labels
                        .retain(|key, _| key.starts_with("goog-dataproc-"));
                    existing.labels.extend(cluster.labels.clone());
                }
                "config.worker_config.num_instances" => {
                    let num_instances = patch.worker_config.as_ref().and_then(|g| g.num_instances);
                    let group = config.worker_config.get_or_insert_with(Default::default);
                    group.num_instances = num_instances;
                    group.instance_names = instance_names(&cluster_ref.name, "w", num_instances);
                }
                "config.secondary_worker_config.num_instances" => {
                    let num_instances = patch
                        .secondary_worker_config
                        .as_ref()
                        .and_then(|g| g.num_instances);
                    let group = config
                        .secondary_worker_config
                        .get_or_insert_with(Default::default);
                    group.num_instances = num_instances;
                    group.instance_names = instance_names(&cluster_ref.name, "sw", num_instances);
                }
                other => {
                    return Err(ApiError::Provider {
                        code: 3,
                        message: format!("field {other:?} cannot be updated"),
                    });
                }
            }
        }

        Ok(operation)
    }

    fn get_cluster(&self, cluster_ref: &ClusterRef) -> Result<Cluster, ApiError> {
        self.record(format!("get_cluster {}", cluster_ref.name));
        self.cluster(&cluster_ref.name).ok_or_else(|| ApiError::NotFound {
            resource: cluster_ref.to_string(),
        })
    }

    fn delete_cluster(&self, cluster_ref: &ClusterRef) -> Result<Operation, ApiError> {
        self.record(format!("delete_cluster {}", cluster_ref.name));
        let operation = self.submit()?;
        if self.succeeds() {
            self.clusters.borrow_mut().remove(&cluster_ref.name);
        }
        Ok(operation)
    }

    fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        self.record(format!("get_operation {name}"));
        let mut operations = self.operations.borrow_mut();
        let Some(pending) = operations.get_mut(name) else {
            return Err(ApiError::NotFound {
                resource: name.to_owned(),
            });
        };

        pending.polls_left = pending.polls_left.saturating_sub(1);
        Ok(match (&pending.outcome, pending.polls_left) {
            (Outcome::Hang, _) | (_, 1..) => Operation::pending(name),
            (Outcome::Succeed { .. }, 0) => Operation::succeeded(name),
            (Outcome::Fail { code, message }, 0) => Operation::failed(name, *code, message.clone()),
        })
    }

    fn list_objects(&self, bucket: &str) -> Result<Vec<String>, ApiError> {
        self.record(format!("list_objects {bucket}"));
        self.buckets
            .borrow()
            .get(bucket)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: bucket.to_owned(),
            })
    }

    fn delete_object(&self, bucket: &str, name: &str) -> Result<(), ApiError> {
        self.record(format!("delete_object {bucket}/{name}"));
        let mut buckets = self.buckets.borrow_mut();
        let objects = buckets.get_mut(bucket).ok_or_else(|| ApiError::NotFound {
            resource: bucket.to_owned(),
        })?;
        let before = objects.len();
        objects.retain(|object| object != name);
        if objects.len() == before {
            return Err(ApiError::NotFound {
                resource: format!("{bucket}/{name}"),
            });
        }
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> Result<(), ApiError> {
        self.record(format!("delete_bucket {bucket}"));
        if let Some(err) = self.bucket_errors.borrow_mut().pop_front() {
            return Err(err);
        }

        let mut buckets = self.buckets.borrow_mut();
        match buckets.get(bucket) {
            None => Err(ApiError::NotFound {
                resource: bucket.to_owned(),
            }),
            Some(objects) if !objects.is_empty() => Err(ApiError::Provider {
                code: 9,
                message: format!("bucket {bucket} is not empty"),
            }),
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }
}

fn instance_names(cluster: &str, suffix: &str, num_instances: Option<u32>) -> Vec<String> {
    match (suffix, num_instances.unwrap_or(0)) {
        ("m", 1) => vec![format!("{cluster}-m")],
        (_, count) => (0..count).map(|i| format!("{cluster}-{suffix}-{i}")).collect(),
    }
}

/// Only moves forward when slept on.
pub struct ManualClock {
    start: Instant,
    elapsed: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
    }
}
