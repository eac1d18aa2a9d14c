use std::time::Duration;

/// Upper bound on any single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `retry_count` (0 = first retry):
/// `base * 2^retry_count`, capped at [`MAX_RETRY_DELAY`].
///
/// ```
/// use std::time::Duration;
/// use packsync_fetch::retry_delay;
///
/// let base = Duration::from_millis(200);
/// assert_eq!(retry_delay(0, base), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, base), Duration::from_millis(800));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier).min(MAX_RETRY_DELAY)
}
