/// Health check helpers for sidecar data/backup volumes
pub mod health;

/// Shared constants for xline's reserved table names
pub mod consts;
