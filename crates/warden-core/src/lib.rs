//! Shared clock, cancellation, configuration and error taxonomy used by every
//! crate in the Warden governance core.

pub mod cancellation;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancellation::{CancellationToken, Deadline};
pub use clock::{Clock, FrozenClock, SystemClock};
pub use config::{AuditConfig, ConfigError, CoreConfig, ReportsConfig, ViolationsConfig};
pub use error::CoreError;
pub use logging::init_tracing;
