//! Splitting an aggregate transaction rate across workers.

/// Errors computing a rate share.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("cannot share a rate of {0} tx/s across zero active workers")]
    NoActiveWorkers(u64),
}

/// Per-worker rate for `total_rate` spread over `active_workers`.
///
/// Rounds up, so `share * active_workers >= total_rate` always holds and the
/// realised aggregate may slightly exceed the target.
pub fn rate_share(total_rate: u64, active_workers: usize) -> Result<u64, RateError> {
    if active_workers == 0 {
        return Err(RateError::NoActiveWorkers(total_rate));
    }
    Ok(total_rate.div_ceil(active_workers as u64))
}
