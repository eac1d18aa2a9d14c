/// Returns `true` for 2xx statuses.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Statuses a server uses for temporary conditions: any 5xx, request
/// timeout and rate limiting.
///
/// ```
/// use packsync_fetch::is_retryable_status;
///
/// assert!(is_retryable_status(503));
/// assert!(is_retryable_status(429));
/// assert!(!is_retryable_status(404));
/// ```
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
