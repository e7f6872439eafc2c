use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops so tests and the
/// binary entry point can both initialize logging without coordination.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,daybook=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
