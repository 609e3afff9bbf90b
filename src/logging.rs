//! Diagnostic logging.
//!
//! Logs go to stderr through `tracing-subscriber`, so they never mix with
//! the chat transcript on stdout. The filter comes from `RAGBOT_LOG` when
//! set, otherwise from `[logging].level` (default `warn`).
//!
//! ```bash
//! RAGBOT_LOG=debug ragbot chat
//! RAGBOT_LOG=ragbot=info,ragbot_core=debug ragbot serve
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Environment variable that overrides `[logging].level`.
pub const LOG_ENV: &str = "RAGBOT_LOG";

static INIT: Once = Once::new();

/// HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = match std::env::var(LOG_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
            _ => EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}
