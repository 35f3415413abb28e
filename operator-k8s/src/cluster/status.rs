//! Idempotent status subresource writer.
//!
//! Every reconcile tick computes a desired [`ClusterStatus`] and hands it here rather than
//! patching the apiserver directly: this is the one place version conflicts, not-found races,
//! and the no-op diff are handled, so the reconcile loop itself stays free of retry logic.

use std::time::Duration;

use crd_api::{Cluster, ClusterStatus};
use kube::api::{Patch, PatchParams};
use kube::Api;
use tracing::warn;

use crate::consts::FIELD_MANAGER;
use crate::error::{is_conflict, is_not_found, ClusterError};

/// Writes a cluster's `status` subresource, diffing against the last known value so that
/// unchanged ticks do not issue a write at all
pub(crate) struct StatusReporter {
    /// `XlineCluster` API scoped to the cluster's namespace
    api: Api<Cluster>,
    /// name of the cluster object this reporter writes to
    name: String,
    /// backoff between retries of a terminal status write
    retry_backoff: Duration,
}

impl StatusReporter {
    /// Build a reporter for the cluster named `name`, retrying terminal writes at `retry_backoff`
    pub(crate) fn new(api: Api<Cluster>, name: String, retry_backoff: Duration) -> Self {
        Self {
            api,
            name,
            retry_backoff,
        }
    }

    /// Patch `status` onto the apiserver, treating not-found as success since there is nothing
    /// left to persist status onto
    async fn patch(&self, desired: &ClusterStatus) -> Result<(), ClusterError> {
        let patch = serde_json::json!({ "status": desired });
        match self
            .api
            .patch_status(
                &self.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Idempotently write `desired`, skipping the call entirely when it matches `current`.
    ///
    /// On a version conflict the object is refetched once and the write retried against its
    /// current status; any other error is surfaced to the caller as transient (the reconcile
    /// loop simply tries again next tick).
    pub(crate) async fn write(
        &self,
        current: &mut ClusterStatus,
        desired: &ClusterStatus,
    ) -> Result<(), ClusterError> {
        if current == desired {
            return Ok(());
        }
        match self.patch(desired).await {
            Ok(()) => {
                *current = desired.clone();
                Ok(())
            }
            Err(ClusterError::Kube(ref err)) if is_conflict(err) => {
                if let Ok(obj) = self.api.get_status(&self.name).await {
                    *current = obj.status.unwrap_or_default();
                }
                self.patch(desired).await?;
                *current = desired.clone();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Persist a terminal status (`phase: Failed`), retrying indefinitely on any error other
    /// than the object already being gone. Used only on the fatal-error exit path, where there
    /// is nothing more useful to do than keep trying to leave a record behind.
    pub(crate) async fn write_terminal(&self, desired: &ClusterStatus) {
        loop {
            match self.patch(desired).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(
                        cluster = %self.name,
                        error = %err,
                        "failed to persist terminal status, retrying",
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crd_api::ClusterPhase;

    #[test]
    fn identical_status_is_treated_as_no_op() {
        let a = ClusterStatus {
            phase: ClusterPhase::Running,
            available: 3,
            ..ClusterStatus::default()
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn differing_phase_is_not_a_no_op() {
        let a = ClusterStatus {
            phase: ClusterPhase::Creating,
            ..ClusterStatus::default()
        };
        let b = ClusterStatus {
            phase: ClusterPhase::Running,
            ..ClusterStatus::default()
        };
        assert_ne!(a, b);
    }
}
