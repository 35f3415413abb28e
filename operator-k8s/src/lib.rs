//! The main component of xline-operator: watches `XlineCluster` objects, drives each one's
//! reconcile control loop, and serves the sidecar heartbeat/metrics/health HTTP surface.

/// CLI configuration
pub mod config;
/// Operator entrypoint
pub mod operator;

mod cluster;
mod consts;
mod error;
mod manager;
mod metrics;
mod monitor;
mod registry;
mod router;

pub(crate) use monitor::SidecarClusterOwned;
