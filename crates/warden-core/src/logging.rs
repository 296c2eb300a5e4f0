//! Structured logging initialisation via `tracing` + `tracing-subscriber`,
//! matching the teacher's `agentkern-gate::observability` use of `tracing`
//! as the sole logging facade (no `log`/`env_logger` anywhere in the stack).

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber reading its filter from `RUST_LOG`
/// (falling back to `info`). Safe to call more than once; subsequent calls
/// are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
