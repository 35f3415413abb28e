//! The garbage collector is an external collaborator in the steady-state path: pod and
//! service deletion is normally driven directly by the member reconciler, and cascading
//! deletion of cluster-owned resources on cluster-object removal is handled by the
//! orchestrator's own owner-reference GC. What remains for this controller to own is the one
//! case the orchestrator's cascade cannot cover: the backup marker `ConfigMap`, which is
//! deliberately not owned by the cluster object so that it survives a cluster delete/recreate
//! cycle under the same name.

use async_trait::async_trait;

use crate::error::ClusterError;

use super::backup::BackupManager;

/// Sweeps resources this controller created outside of the orchestrator's owner-reference
/// cascade, invoked once when a cluster object is deleted
#[async_trait]
pub(crate) trait GarbageCollector: Send + Sync {
    /// Remove everything tagged with `cluster_name` that the orchestrator's cascading deletion
    /// of owned pods/services will not reach on its own
    async fn sweep(&self, backup: Option<&(dyn BackupManager)>) -> Result<(), ClusterError>;
}

/// Reference [`GarbageCollector`]: deletes the backup marker `ConfigMap`, if any
pub(crate) struct MarkerGarbageCollector;

impl MarkerGarbageCollector {
    /// Build a collector scoped to the cluster's namespace
    pub(crate) fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GarbageCollector for MarkerGarbageCollector {
    async fn sweep(&self, backup: Option<&(dyn BackupManager)>) -> Result<(), ClusterError> {
        if let Some(backup) = backup {
            backup.cleanup().await?;
        }
        Ok(())
    }
}
