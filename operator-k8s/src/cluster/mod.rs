//! Everything that makes up a single cluster's control loop: its mailbox, in-memory member
//! bookkeeping, manifest builders, the reconcile state machine, status reporting, and the two
//! external collaborators (backup, garbage collection) it calls out to.

mod backup;
mod gc;
mod mailbox;
mod member;
mod resources;
mod status;

mod controller;

pub(crate) use controller::{spawn, ClusterHandle};
