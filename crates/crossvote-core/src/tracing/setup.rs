//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "CROSSVOTE_LOG";

/// Filter used when `CROSSVOTE_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "crossvote=info";

/// Initialize the crossvote tracing/logging system.
///
/// Reads `CROSSVOTE_LOG` for per-module log levels, e.g.
/// `CROSSVOTE_LOG=crossvote_analysis::sampler=debug,crossvote_analysis::preparation=warn`.
///
/// Idempotent: later calls are no-ops. Also a no-op if another global
/// subscriber was installed first.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
