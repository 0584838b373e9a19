//! Tracing initialization shared by the simulator binaries and tests.
//!
//! The subscriber is installed thread-locally so a host application that owns
//! its own global subscriber keeps working.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with a thread-local subscriber.
///
/// Respects `RUST_LOG` (defaults to "info") and prints compact lines without
/// file or line metadata. Keep the returned guard alive for as long as logs
/// should be emitted.
///
/// # Example
/// ```no_run
/// use mecanum_sim_lib::init_tracing;
///
/// let _guard = init_tracing();
/// ```
pub fn init_tracing() -> DefaultGuard {
    init_tracing_with_default("info")
}

/// Same as [`init_tracing`] but with a caller-chosen fallback filter,
/// used when `RUST_LOG` is unset or unparsable.
pub fn init_tracing_with_default(default_filter: &str) -> DefaultGuard {
    use tracing_subscriber::layer::SubscriberExt;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false);

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_default(subscriber)
}
