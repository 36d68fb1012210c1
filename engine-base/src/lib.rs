#[macro_use]
pub mod tracing_util;

#[macro_use]
pub mod global_macros;

pub mod metrics_util;
pub mod mutex_util;

pub use mutex_util::{non_blocking_lock, try_lock};
pub use tracing_util::ok_or_log_as_warn;
