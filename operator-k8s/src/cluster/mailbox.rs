use std::sync::Arc;

use clippy_utilities::NumericCast;
use crd_api::Cluster;
use flume::{Receiver, Sender, TrySendError};
use tracing::warn;

use crate::consts::MAILBOX_CAPACITY;

/// Events the outside watcher enqueues onto a running cluster controller
#[derive(Debug)]
pub(crate) enum Event {
    /// The cluster object changed; carries the new observed spec
    Modify(Arc<Cluster>),
    /// The cluster object was deleted
    Delete,
}

/// The producer side of a cluster's event mailbox
///
/// Wraps a bounded `flume` channel, sized and thresholded per the [`crate::consts::Timing`] it
/// was built with. Sends never block: a full mailbox drops the event after logging, since a
/// slow cluster controller must not stall the watcher that feeds every other cluster too.
#[derive(Clone)]
pub(crate) struct MailboxSender {
    /// cluster name, used only for the occupancy warning
    cluster_name: String,
    /// occupancy ratio, as a fraction of capacity, at which to log a warning
    warn_ratio: f64,
    /// underlying bounded channel
    inner: Sender<Event>,
}

impl MailboxSender {
    /// Non-blockingly enqueue an event, dropping it (with a warning) if the controller has
    /// already stopped or the mailbox is full
    pub(crate) fn try_send(&self, event: Event) {
        let occupancy = self.inner.len().numeric_cast::<f64>();
        let capacity = self.inner.capacity().unwrap_or(MAILBOX_CAPACITY).numeric_cast::<f64>();
        if capacity > 0.0 && occupancy / capacity >= self.warn_ratio {
            warn!(
                cluster = %self.cluster_name,
                occupancy = self.inner.len(),
                capacity = self.inner.capacity(),
                "cluster mailbox over {}% full",
                (self.warn_ratio * 100.0) as u32
            );
        }
        match self.inner.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(cluster = %self.cluster_name, "cluster mailbox full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                // the controller has already stopped, nothing to deliver to
            }
        }
    }
}

/// Build a fresh mailbox pair for a cluster named `cluster_name`, sized `capacity` and warning
/// at `warn_ratio` occupancy
pub(crate) fn channel(
    cluster_name: &str,
    capacity: usize,
    warn_ratio: f64,
) -> (MailboxSender, Receiver<Event>) {
    let (tx, rx) = flume::bounded(capacity);
    (
        MailboxSender {
            cluster_name: cluster_name.to_owned(),
            warn_ratio,
            inner: tx,
        },
        rx,
    )
}
