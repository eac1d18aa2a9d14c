//! Pure decisions for HTTP fetching: no I/O here.

mod retry;
mod validation;

pub use retry::{MAX_RETRY_DELAY, retry_delay};
pub use validation::{is_retryable_status, is_success};
