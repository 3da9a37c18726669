pub(crate) mod metrics;
mod thread;
pub(crate) mod tls;

pub use metrics::UpcallStats;
pub use tls::{err_clear, err_fetch, err_occurred, PendingError};
