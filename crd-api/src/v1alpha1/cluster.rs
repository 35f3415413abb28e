// The `JsonSchema` and `CustomResource` macro generates codes that does not pass the clippy lint.
#![allow(clippy::str_to_string)]
#![allow(clippy::missing_docs_in_private_items)]

use garde::Validate;
use k8s_openapi::api::core::v1::{Affinity, Container, PersistentVolumeClaim};
use k8s_openapi::serde::{Deserialize, Serialize};
use kube::CustomResource;
use schemars::JsonSchema;
use std::collections::HashMap;
use std::net::IpAddr;

/// Xline cluster specification
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Validate)]
#[kube(
    group = "xlineoperator.xline.cloud",
    version = "v1alpha1",
    kind = "XlineCluster",
    singular = "xlinecluster",
    plural = "xlineclusters",
    struct = "Cluster",
    namespaced,
    status = "ClusterStatus",
    shortname = "xc",
    scale = r#"{"specReplicasPath":".spec.size", "statusReplicasPath":".status.available"}"#,
    printcolumn = r#"{"name":"Size", "type":"string", "description":"The cluster size", "jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Available", "type":"string", "description":"The available amount", "jsonPath":".status.available"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "description":"The cluster phase", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Backup Cron", "type":"string", "description":"The cron spec defining the interval a backup CronJob is run", "jsonPath":".spec.backup.cron"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "description":"The cluster age", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[schemars(rename_all = "camelCase")]
#[garde(allow_unvalidated)]
pub struct ClusterSpec {
    /// Size of the xline cluster, less than 1 is not allowed
    #[garde(range(min = 1))]
    #[schemars(range(min = 1))]
    pub size: usize,
    /// Xline container specification. The image tag on this container is the version the
    /// member reconciler compares running pods against when deciding whether to upgrade them.
    pub container: Container,
    /// The affinity of the xline node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
    /// Pause reconciliation of this cluster. While set, the reconcile loop still runs ticks
    /// but takes no membership action.
    #[serde(default)]
    #[garde(skip)]
    pub paused: bool,
    /// Backup specification
    #[garde(dive)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,
    /// Restore this cluster from a prior backup instead of bootstrapping an empty one.
    /// Only consulted once, at initial setup; changing it after creation has no effect.
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreSpec>,
    /// Run this cluster in self-hosted mode, optionally migrating in an already-running
    /// external member instead of seeding a brand new one.
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_hosted: Option<SelfHostedSpec>,
    /// The data PVC, if it is not specified, then use emptyDir instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PersistentVolumeClaim>,
    /// Some user defined persistent volume claim templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvcs: Option<Vec<PersistentVolumeClaim>>,
}

/// Xline cluster backup specification
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Validate)]
pub struct BackupSpec {
    /// The maximum number of backups to retain; `0` disables backups entirely, which in turn
    /// makes disaster recovery impossible (a total member loss becomes a fatal, terminal event).
    #[garde(skip)]
    #[serde(default)]
    pub max_backups: u32,
    /// Cron Spec
    #[garde(pattern(r"^(?:\*|[0-5]?\d)(?:[-/,]?(?:\*|[0-5]?\d))*(?: +(?:\*|1?[0-9]|2[0-3])(?:[-/,]?(?:\*|1?[0-9]|2[0-3]))*){4}$"))]
    #[schemars(regex(
        pattern = r"^(?:\*|[0-5]?\d)(?:[-/,]?(?:\*|[0-5]?\d))*(?: +(?:\*|1?[0-9]|2[0-3])(?:[-/,]?(?:\*|1?[0-9]|2[0-3]))*){4}$"
    ))]
    pub cron: String,
    /// Backup storage type
    #[garde(dive)]
    #[serde(flatten)]
    pub storage: StorageSpec,
}

/// Xline cluster backup storage specification
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Validate)]
#[serde(untagged)]
pub enum StorageSpec {
    /// S3 backup type
    S3 {
        /// S3 backup specification
        #[garde(dive)]
        s3: S3Spec,
    },
    /// Persistent volume backup type
    Pvc {
        /// Persistent volume claim
        #[garde(skip)]
        pvc: PersistentVolumeClaim,
    },
}

impl StorageSpec {
    pub fn as_pvc(&self) -> Option<&PersistentVolumeClaim> {
        match *self {
            Self::Pvc { ref pvc } => Some(pvc),
            Self::S3 { .. } => None,
        }
    }
}

/// Xline cluster backup S3 specification
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Validate)]
pub struct S3Spec {
    /// S3 bucket name to use for backup
    #[garde(pattern(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$"))]
    #[schemars(regex(pattern = r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$"))]
    pub bucket: String,
}

/// Reference to a prior snapshot to bootstrap this cluster from, instead of seeding empty
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RestoreSpec {
    /// Name of the backup to restore. Interpreted by the backup manager, which knows how to
    /// locate it in the configured storage backend.
    pub backup_name: String,
}

/// Self-hosted bootstrap mode: the cluster runs on infrastructure backed by itself
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct SelfHostedSpec {
    /// An already-running external member to migrate into managed ownership. When absent, a
    /// brand new self-hosted seed is created instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_endpoint: Option<String>,
}

/// Cluster lifecycle phase
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ClusterPhase {
    /// The cluster object has not yet been processed
    #[default]
    None,
    /// Bootstrap is in progress
    Creating,
    /// The cluster is up and steady-state reconciliation is in effect
    Running,
    /// The cluster has suffered a fatal error and reconciliation has stopped
    Failed,
}

/// A single entry in the cluster's condition timeline
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct Condition {
    /// Short machine-readable type, e.g. `"ControlLoop"`
    pub r#type: String,
    /// Human-readable reason for the condition
    pub reason: String,
    /// Free-form detail message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix timestamp, in seconds, of the last transition into this condition
    pub last_transition_time: String,
}

/// Xline cluster status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default, Validate)]
#[garde(context(ClusterSpec as ctx))]
pub struct ClusterStatus {
    /// Current lifecycle phase
    #[garde(skip)]
    #[serde(default)]
    pub phase: ClusterPhase,
    /// Reason for the current phase, mainly populated on `Failed`
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The available nodes' number in the cluster
    #[garde(range(max = ctx.size))]
    pub available: usize,
    /// The members registry, keyed by member name, for operator visibility only; the
    /// authoritative membership view is reconstructed from live pods on demand.
    #[garde(skip)]
    #[serde(default)]
    pub members: HashMap<String, IpAddr>,
    /// Bounded timeline of recent conditions, most recent last
    #[garde(skip)]
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod test {
    use garde::Validate;
    use k8s_openapi::api::core::v1::{Container, PersistentVolumeClaim};

    use super::{BackupSpec, ClusterSpec, S3Spec, StorageSpec};

    fn base_spec() -> ClusterSpec {
        ClusterSpec {
            size: 3,
            backup: None,
            container: Container::default(),
            affinity: None,
            paused: false,
            restore: None,
            self_hosted: None,
            pvcs: None,
            data: None,
        }
    }

    #[test]
    fn validation_ok() {
        let ok = ClusterSpec {
            backup: Some(BackupSpec {
                max_backups: 3,
                cron: "*/15 * * * *".to_owned(),
                storage: StorageSpec::Pvc {
                    pvc: PersistentVolumeClaim::default(),
                },
            }),
            ..base_spec()
        };
        assert!(Validate::validate(&ok, &()).is_ok());
    }

    #[test]
    fn validation_size_one_is_allowed() {
        let size_one = ClusterSpec {
            size: 1,
            ..base_spec()
        };
        assert!(Validate::validate(&size_one, &()).is_ok());
    }

    #[test]
    fn validation_bad_size() {
        let bad_size = ClusterSpec {
            size: 0,
            ..base_spec()
        };
        assert!(Validate::validate(&bad_size, &())
            .unwrap_err()
            .to_string()
            .contains("size"));
    }

    #[test]
    fn validation_bad_cron() {
        let bad_cron = ClusterSpec {
            backup: Some(BackupSpec {
                max_backups: 3,
                cron: "1 day".to_owned(),
                storage: StorageSpec::Pvc {
                    pvc: PersistentVolumeClaim::default(),
                },
            }),
            ..base_spec()
        };
        assert!(Validate::validate(&bad_cron, &())
            .unwrap_err()
            .to_string()
            .contains("backup.cron"));
    }

    #[test]
    fn validation_bad_s3_bucket() {
        let bad_bucket = ClusterSpec {
            backup: Some(BackupSpec {
                max_backups: 3,
                cron: "*/15 * * * *".to_owned(),
                storage: StorageSpec::S3 {
                    s3: S3Spec {
                        bucket: "&%$# /".to_owned(),
                    },
                },
            }),
            ..base_spec()
        };
        assert!(Validate::validate(&bad_bucket, &())
            .unwrap_err()
            .to_string()
            .contains("backup.storage.s3.bucket"))
    }
}
