//! Small helpers shared across the sidecar binary.

/// Build exponential histogram bucket boundaries, see [`prometheus::exponential_buckets`].
pub(crate) fn exponential_time_bucket(start: f64, factor: f64, count: usize) -> Vec<f64> {
    prometheus::exponential_buckets(start, factor, count)
        .unwrap_or_else(|err| panic!("invalid histogram bucket parameters: {err}"))
}
