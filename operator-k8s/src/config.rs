use std::time::Duration;

use clap::Parser;

use crate::consts::{self, Timing};

/// Xline operator config
#[derive(Debug, Parser)]
#[non_exhaustive]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The namespace to work, default to cluster wide
    #[arg(long, value_parser=namespace_mode_parser, default_value = "")]
    pub namespace: Namespace,
    /// The address on which the heartbeat HTTP server will listen to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: String,
    /// Whether the operator installs/upgrades the `XlineCluster` CRD itself. Disable when the
    /// CRD is managed out of band (e.g. by a cluster administrator or a separate install step).
    #[arg(long, default_value = "true")]
    pub manage_crd: bool,
    /// Whether to enable auto migration if CRD version is less than current version
    #[arg(long, default_value = "false")]
    pub auto_migration: bool,
    /// The kubernetes cluster DNS suffix
    #[arg(long, default_value = "cluster.local")]
    pub cluster_suffix: String,
    /// Maximum interval between accepted `HeartbeatStatus`
    #[arg(long, default_value = "2")]
    pub heartbeat_period: u64,
    /// Sidecar unreachable counter threshold
    #[arg(long, default_value = "4")]
    pub unreachable_thresh: usize,
    /// How often, in seconds, a cluster's control loop ticks to re-reconcile steady state
    #[arg(long, default_value_t = consts::RECONCILE_TICK.as_secs())]
    pub reconcile_tick_secs: u64,
    /// Grace period, in seconds, given to a member pod on deletion
    #[arg(long, default_value_t = consts::POD_TERMINATION_GRACE.as_secs())]
    pub pod_termination_grace_secs: u64,
    /// Backoff, in seconds, between retries of a terminal (Failed) status write
    #[arg(long, default_value_t = consts::STATUS_RETRY_BACKOFF.as_secs())]
    pub status_retry_backoff_secs: u64,
    /// Capacity of a single cluster's event mailbox
    #[arg(long, default_value_t = consts::MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,
    /// Mailbox occupancy, as a fraction of capacity, at which a producer logs a warning
    #[arg(long, default_value_t = consts::MAILBOX_WARN_RATIO)]
    pub mailbox_warn_ratio: f64,
}

impl Config {
    /// Collect this config's timing/sizing flags into the form threaded through to every
    /// per-cluster control loop
    pub(crate) fn timing(&self) -> Timing {
        Timing {
            reconcile_tick: Duration::from_secs(self.reconcile_tick_secs),
            pod_termination_grace: Duration::from_secs(self.pod_termination_grace_secs),
            status_retry_backoff: Duration::from_secs(self.status_retry_backoff_secs),
            mailbox_capacity: self.mailbox_capacity,
            mailbox_warn_ratio: self.mailbox_warn_ratio,
        }
    }
}

/// The namespace to work, `ClusterWide` means work with all namespaces
#[allow(clippy::exhaustive_enums)] // it is clear that this enum is exhaustive
#[derive(Clone, Debug)]
pub enum Namespace {
    /// A single namespace
    Single(String),
    /// All namespaces
    ClusterWide,
}

/// parse namespace mode
#[allow(clippy::unnecessary_wraps)] // required by clap
fn namespace_mode_parser(value: &str) -> Result<Namespace, String> {
    if value.is_empty() {
        return Ok(Namespace::ClusterWide);
    }
    Ok(Namespace::Single(value.to_owned()))
}
