use thiserror::Error;

/// Errors raised while driving a single cluster's control loop
///
/// Each variant is classified via [`ClusterError::is_fatal`]: fatal errors terminate the
/// controller and move the cluster to `Failed`; the rest are transient and simply abort the
/// current tick, to be retried on the next one.
#[derive(Debug, Error)]
pub(crate) enum ClusterError {
    /// The orchestrator API call failed; retried next tick
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
    /// Disaster recovery was invoked but no backup is configured or available
    #[error("no backup exists to recover from")]
    NoBackupExist,
    /// A running pod's name could not be parsed as a member of this cluster
    #[error("invalid member name: {0}")]
    InvalidMemberName(String),
    /// The replica cluster reported a member in a state the controller cannot reconcile
    #[error("unexpected unready member: {0}")]
    UnexpectedUnreadyMember(String),
    /// The cluster spec failed validation at setup
    #[error("invalid cluster spec: {0}")]
    InvalidSpec(String),
    /// Setup observed phase `Creating`, meaning a previous bootstrap attempt crashed mid-way
    #[error("cluster stuck in Creating from a previous crashed bootstrap")]
    StaleCreating,
    /// The backup manager failed to provision or validate its storage backend
    #[error("backup manager setup failed: {0}")]
    BackupSetup(String),
    /// Notifying a member's sidecar of its own removal from replica-cluster membership failed;
    /// retried next tick, since the pod/service delete that follows must not run ahead of it
    #[error("membership removal notification failed: {0}")]
    MembershipNotify(String),
}

impl ClusterError {
    /// Whether this error terminates the controller
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoBackupExist
                | Self::InvalidMemberName(_)
                | Self::UnexpectedUnreadyMember(_)
                | Self::InvalidSpec(_)
                | Self::StaleCreating
                | Self::BackupSetup(_)
        )
    }

    /// Short machine-readable reason, written to `status.reason` and the metrics label
    pub(crate) fn reason(&self) -> &'static str {
        match *self {
            Self::Kube(_) => "KubeError",
            Self::NoBackupExist => "NoBackupExist",
            Self::InvalidMemberName(_) => "InvalidMemberName",
            Self::UnexpectedUnreadyMember(_) => "UnexpectedUnreadyMember",
            Self::InvalidSpec(_) => "InvalidSpec",
            Self::StaleCreating => "StaleCreating",
            Self::BackupSetup(_) => "BackupSetup",
            Self::MembershipNotify(_) => "MembershipNotify",
        }
    }
}

/// Whether a kube API error on a status write is a version-conflict that should be retried
/// after a refetch, as opposed to some other transient failure
pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(
        err,
        kube::Error::Api(resp) if resp.code == 409
    )
}

/// Whether a kube API error on a status write means the object is already gone, which this
/// controller treats as a successful write (nothing left to persist status onto)
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(
        err,
        kube::Error::Api(resp) if resp.code == 404
    )
}
