//! Compact timestamped logging with per-target levels.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"   # quiet by default
//!
//! [logging.modules]
//! ingest = "info"    # document commits
//! http = "debug"     # retries and backoff
//! ```
//!
//! Targets used across the crate: `ingest`, `query`, `qa`, `embedding`,
//! `llm`, `loader`, `news`, `http`, `cli`.
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug hsbc-assist ask "How do I open an account?" --docs ./documents
//! RUST_LOG=ingest=info,http=debug hsbc-assist news HSBC
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directive built from `config`, e.g. `warn,ingest=info`.
pub fn filter_directive(config: &LoggingConfig) -> String {
    let mut directive = config.default.clone();
    for (target, level) in &config.modules {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directive(config))
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

/// Log an info event under the stage's target.
///
/// # Examples
/// ```ignore
/// log_event!("ingest", "committed", "{} chunk(s)", n);
/// ```
#[macro_export]
macro_rules! log_event {
    ($stage:expr, $event:expr) => {
        tracing::info!(target: $stage, "{}", $event)
    };
    ($stage:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: $stage, "{}: {}", $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("query", "hits", "{} for {:?}", rows.len(), question);
/// ```
#[macro_export]
macro_rules! debug_event {
    ($stage:expr, $event:expr) => {
        tracing::debug!(target: $stage, "{}", $event)
    };
    ($stage:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!(target: $stage, "{}: {}", $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let mut config = LoggingConfig::default();
        assert_eq!(filter_directive(&config), "warn");
        config.modules.insert("ingest".to_string(), "info".to_string());
        config.modules.insert("http".to_string(), "debug".to_string());
        assert_eq!(filter_directive(&config), "warn,http=debug,ingest=info");
    }
}
