//! xline-sidecar library: the per-pod process that owns the replica's lifecycle, registers
//! with the operator, and reports heartbeat status.

/// Sidecar entrypoint
pub mod sidecar;
/// Shared config/state/protocol types
pub mod types;

mod backup;
mod controller;
mod routers;
mod utils;
mod xline;
