//! Logging setup for the index.
//!
//! Builds one `EnvFilter` from the configured default level plus sorted
//! per-module overrides, then installs a compact-format subscriber. The
//! `RUST_LOG` environment variable, when set, replaces the configured
//! filter entirely:
//!
//! ```bash
//! RUST_LOG=groovy_index=debug
//! RUST_LOG=groovy_index::store=trace,groovy_index::deps=debug
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock `HH:MM:SS.mmm` timestamps; dates add no value in an
/// editor-session log.
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        w.write_str(&stamp)
    }
}

/// Render the configured levels as an `EnvFilter` directive string.
/// Module overrides are sorted so the filter is stable across runs.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut overrides: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{module}={level}"))
        .collect();
    overrides.sort();

    let mut directives = Vec::with_capacity(overrides.len() + 1);
    directives.push(config.default.clone());
    directives.extend(overrides);
    directives.join(",")
}

/// Initialize logging with configuration.
///
/// Call once at startup; later calls are no-ops. `RUST_LOG` wins over the
/// config file.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

        // try_init so an ambient subscriber (tests, embedding hosts) is
        // tolerated rather than panicked over.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(ClockTime)
            .with_target(true)
            .try_init();
    });
}

/// Initialize logging with the default, quiet configuration.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}
