//! Watches `XlineCluster` objects and keeps one running [`cluster::ClusterHandle`] per cluster
//! name, dispatching watch events onto the per-cluster mailbox each owns.
//!
//! This is the external collaborator the core control loop assumes exists, not itself the
//! object of careful design: a `kube::runtime::watcher` stream driving a `HashMap` of handles is
//! enough to get events to the right mailbox.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::TryStreamExt;
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, warn};

use crd_api::Cluster;

use crate::cluster::{self, ClusterHandle};
use crate::consts::Timing;

/// Tracks one spawned control loop per `XlineCluster` name and forwards watch events to it
pub(crate) struct ClusterManager {
    /// used to spawn fresh per-cluster control loops
    kube_client: Client,
    /// kubernetes cluster DNS suffix, threaded through to every spawned controller
    cluster_suffix: Arc<str>,
    /// timing/sizing knobs threaded through to every spawned controller
    timing: Timing,
    /// running (or exited-but-not-yet-reaped) control loops, keyed by cluster name
    handles: HashMap<String, ClusterHandle>,
}

impl ClusterManager {
    /// Build a manager with no clusters tracked yet
    pub(crate) fn new(kube_client: Client, cluster_suffix: String, timing: Timing) -> Self {
        Self {
            kube_client,
            cluster_suffix: Arc::from(cluster_suffix),
            timing,
            handles: HashMap::new(),
        }
    }

    /// Watch `cluster_api` until `shutdown` resolves, dispatching every observed change onto the
    /// matching cluster's control loop. On shutdown every tracked control loop is aborted
    /// immediately; graceful per-cluster teardown is triggered by its own `Delete` event, not by
    /// the manager stopping.
    pub(crate) async fn run(
        mut self,
        cluster_api: Api<Cluster>,
        shutdown: impl Future<Output = ()>,
    ) {
        let stream = watcher(cluster_api, WatcherConfig::default());
        tokio::pin!(stream);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    for (_, handle) in self.handles.drain() {
                        handle.abort();
                    }
                    return;
                }
                event = stream.try_next() => {
                    match event {
                        Ok(Some(event)) => self.dispatch(event),
                        Ok(None) => return,
                        Err(err) => warn!(error = %err, "cluster watch stream error, retrying"),
                    }
                }
            }
        }
    }

    /// Route one watch event to the handles map
    fn dispatch(&mut self, event: watcher::Event<Cluster>) {
        match event {
            watcher::Event::Applied(cluster) => self.upsert(Arc::new(cluster)),
            watcher::Event::Deleted(cluster) => self.remove(&cluster.name_any()),
            watcher::Event::Restarted(clusters) => self.resync(clusters),
        }
    }

    /// Spawn a fresh control loop for a never-seen cluster name, or forward a `Modify` event to
    /// an already-running one. A handle whose task has already exited (e.g. a fatal error) is
    /// replaced with a new one rather than forwarded to, since nothing is left listening on its
    /// mailbox.
    fn upsert(&mut self, cluster: Arc<Cluster>) {
        let name = cluster.name_any();
        if let Some(handle) = self.handles.get(&name) {
            if !handle.is_finished() {
                handle.modify(cluster);
                return;
            }
            debug!(cluster = %name, "control loop had already exited, respawning");
        }
        let handle = cluster::spawn(
            self.kube_client.clone(),
            Arc::clone(&self.cluster_suffix),
            self.timing,
            cluster,
        );
        _ = self.handles.insert(name, handle);
    }

    /// Enqueue a `Delete` event for a tracked cluster and stop tracking it
    fn remove(&mut self, name: &str) {
        if let Some(handle) = self.handles.remove(name) {
            handle.delete();
        }
    }

    /// Reconcile the tracked set against a watcher restart's full listing: tear down handles for
    /// clusters that no longer exist, upsert everything the listing reports
    fn resync(&mut self, clusters: Vec<Cluster>) {
        let seen: HashSet<String> = clusters.iter().map(ResourceExt::name_any).collect();
        let gone: Vec<String> = self
            .handles
            .keys()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();
        for name in gone {
            self.remove(&name);
        }
        for cluster in clusters {
            self.upsert(Arc::new(cluster));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static CLUSTER: &str = r#"
apiVersion: xlineoperator.xline.cloud/v1alpha1
kind: XlineCluster
metadata:
  name: my-xline-cluster
  namespace: default
  uid: this-is-a-random-uid
spec:
  size: 3
  container:
    image: "datenlord/xline"
    name: "my-xline"
    "#;

    #[test]
    fn resync_set_diff_keeps_only_seen_names() {
        let cluster: Cluster = serde_yaml::from_str(CLUSTER).unwrap();
        let clusters = vec![cluster];
        let seen: HashSet<String> = clusters.iter().map(ResourceExt::name_any).collect();
        assert!(seen.contains("my-xline-cluster"));
        assert!(!seen.contains("some-other-cluster"));
    }
}
