//! The backup manager is an external collaborator: the sidecar's `CronJob` takes the actual
//! snapshot and uploads it to the configured storage backend. What the control loop needs from
//! it is narrower — whether a snapshot exists to recover from, and somewhere to record that one
//! was taken — so it is expressed here as a trait with a lightweight reference implementation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, PostParams};
use kube::Api;
use std::collections::BTreeMap;

use crate::consts::{BACKUP_MARKER_KEY, BACKUP_MARKER_SUFFIX};
use crate::error::{is_conflict, is_not_found, ClusterError};

/// What the control loop needs from the backup subsystem during setup and disaster recovery
#[async_trait]
pub(crate) trait BackupManager: Send + Sync {
    /// Provision whatever storage-side state a snapshot needs before the cluster starts,
    /// e.g. creating a marker object. Errors here are fatal: see [`ClusterError::BackupSetup`].
    async fn setup(&self) -> Result<(), ClusterError>;

    /// Whether a snapshot exists that disaster recovery could restore from
    async fn has_snapshot(&self) -> Result<bool, ClusterError>;

    /// Tear down the marker object, called when the cluster is deleted
    async fn cleanup(&self) -> Result<(), ClusterError>;
}

/// Reference [`BackupManager`] that tracks the latest snapshot name in a `ConfigMap`.
///
/// The sidecar's backup `CronJob` is expected to write the snapshot name into this same
/// `ConfigMap` after a successful upload; this type only owns the marker's lifecycle, not its
/// contents.
pub(crate) struct ConfigMapBackupManager {
    /// `ConfigMap` API scoped to the cluster's namespace
    api: Api<ConfigMap>,
    /// name of the marker `ConfigMap`
    name: String,
}

/// Name of the marker `ConfigMap` tracking `cluster_name`'s latest snapshot
fn marker_name(cluster_name: &str) -> String {
    format!("{cluster_name}-{BACKUP_MARKER_SUFFIX}")
}

impl ConfigMapBackupManager {
    /// Build a manager for `cluster_name`'s marker `ConfigMap`
    pub(crate) fn new(api: Api<ConfigMap>, cluster_name: &str) -> Self {
        Self {
            api,
            name: marker_name(cluster_name),
        }
    }
}

#[async_trait]
impl BackupManager for ConfigMapBackupManager {
    async fn setup(&self) -> Result<(), ClusterError> {
        let marker = ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            data: Some(BTreeMap::new()),
            ..Default::default()
        };
        match self.api.create(&PostParams::default(), &marker).await {
            Ok(_) => Ok(()),
            Err(err) if is_conflict(&err) => Ok(()),
            Err(err) => Err(ClusterError::BackupSetup(err.to_string())),
        }
    }

    async fn has_snapshot(&self) -> Result<bool, ClusterError> {
        match self.api.get(&self.name).await {
            Ok(cm) => Ok(cm
                .data
                .as_ref()
                .and_then(|d| d.get(BACKUP_MARKER_KEY))
                .is_some_and(|v| !v.is_empty())),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn cleanup(&self) -> Result<(), ClusterError> {
        match self.api.delete(&self.name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::marker_name;

    #[test]
    fn marker_name_matches_suffix_convention() {
        assert_eq!(marker_name("my-cluster"), "my-cluster-backup-marker");
    }
}
