use std::time::Duration;

/// The field manager identifier of xline operator
pub(crate) const FIELD_MANAGER: &str = "xlineoperator.datenlord.io/operator";
/// The name of xline port, the port with this name is considered to be the port of xline
pub(crate) const XLINE_PORT_NAME: &str = "xline";
/// The name of sidecar port, the port with this name is considered to be the port of sidecar
pub(crate) const SIDECAR_PORT_NAME: &str = "sidecar";
/// The default xline port
pub(crate) const DEFAULT_XLINE_PORT: i32 = 2379;
/// The default sidecar port
pub(crate) const DEFAULT_SIDECAR_PORT: i32 = 2380;
/// The environment name of the xline pod name
pub(crate) const XLINE_POD_NAME_ENV: &str = "XLINE_POD_NAME";
/// The environment carrying this member's bootstrap state, `"new"` or `"existing"`
pub(crate) const XLINE_MEMBER_STATE_ENV: &str = "XLINE_MEMBER_STATE";
/// The environment carrying the cluster token, only set for `state="new"` members
pub(crate) const XLINE_CLUSTER_TOKEN_ENV: &str = "XLINE_CLUSTER_TOKEN";
/// The environment carrying the comma separated `name=peer_url` initial member list
pub(crate) const XLINE_INITIAL_CLUSTER_ENV: &str = "XLINE_INITIAL_CLUSTER";
/// The environment that, when `"true"`, tells the sidecar to restore from the latest backup
/// before starting the replica process
pub(crate) const XLINE_RECOVERY_ENV: &str = "XLINE_RECOVERY";
/// The annotation used to inherit labels in `XlineCluster`
pub(crate) const ANNOTATION_INHERIT_LABELS_PREFIX: &str =
    "xlineoperator.datenlord.io/inherit-label-prefix";
/// The label attach to subresources, indicate the xlinecluster name
pub(crate) const LABEL_CLUSTER_NAME: &str = "xlinecluster/name";
/// The label attach to subresources, indicate the component type of this subresource
pub(crate) const LABEL_CLUSTER_COMPONENT: &str = "xlinecluster/component";
/// Indicate the version of operator that creates this subresource
pub(crate) const LABEL_OPERATOR_VERSION: &str = "xlinecluster/operator-version";
/// Suffix of the client-facing load balancer service, owned by the cluster object
pub(crate) const LB_SERVICE_SUFFIX: &str = "client";
/// Suffix of the ConfigMap the reference backup manager uses to track the latest snapshot name
pub(crate) const BACKUP_MARKER_SUFFIX: &str = "backup-marker";
/// Key inside the backup marker ConfigMap holding the latest snapshot name
pub(crate) const BACKUP_MARKER_KEY: &str = "latest";

/// Default for how often the per-cluster control loop ticks to re-reconcile steady state,
/// overridable via [`crate::config::Config::reconcile_tick_secs`]
pub(crate) const RECONCILE_TICK: Duration = Duration::from_secs(8);
/// Default grace period given to a member pod on deletion, overridable via
/// [`crate::config::Config::pod_termination_grace_secs`]
pub(crate) const POD_TERMINATION_GRACE: Duration = Duration::from_secs(5);
/// Default backoff between retries of a terminal (Failed) status write, overridable via
/// [`crate::config::Config::status_retry_backoff_secs`]
pub(crate) const STATUS_RETRY_BACKOFF: Duration = Duration::from_secs(5);
/// Default capacity of a single cluster's event mailbox, overridable via
/// [`crate::config::Config::mailbox_capacity`]
pub(crate) const MAILBOX_CAPACITY: usize = 100;
/// Default mailbox occupancy, as a fraction of capacity, at which a producer logs a warning,
/// overridable via [`crate::config::Config::mailbox_warn_ratio`]
pub(crate) const MAILBOX_WARN_RATIO: f64 = 0.8;

/// The timing/sizing knobs of a cluster's control loop, threaded in from [`crate::config::Config`]
/// so the fixed constants above act only as defaults, not hard limits
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timing {
    /// how often the control loop ticks to re-reconcile steady state
    pub(crate) reconcile_tick: Duration,
    /// grace period given to a member pod on deletion
    pub(crate) pod_termination_grace: Duration,
    /// backoff between retries of a terminal (Failed) status write
    pub(crate) status_retry_backoff: Duration,
    /// capacity of a single cluster's event mailbox
    pub(crate) mailbox_capacity: usize,
    /// mailbox occupancy, as a fraction of capacity, at which a producer logs a warning
    pub(crate) mailbox_warn_ratio: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reconcile_tick: RECONCILE_TICK,
            pod_termination_grace: POD_TERMINATION_GRACE,
            status_retry_backoff: STATUS_RETRY_BACKOFF,
            mailbox_capacity: MAILBOX_CAPACITY,
            mailbox_warn_ratio: MAILBOX_WARN_RATIO,
        }
    }
}
