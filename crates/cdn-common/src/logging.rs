//! Structured logging setup
//!
//! - `LOG_FORMAT=json` selects JSON lines for log aggregation (CloudWatch, Loki, ...)
//! - anything else selects human-readable output
//! - `RUST_LOG` controls filtering, defaulting to `info`
//!   (e.g. `RUST_LOG=cdn_invalidator=debug,aws_config=warn`)
//!
//! Per-message context is attached with spans; the controller opens an
//! `invalidation` span carrying `target_id`, `path` and `retry_count` so every
//! line logged while handling that message includes them.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }
}

/// Initialize the global subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(service_name: &str) {
    let format = LogFormat::from_env();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .flatten_event(true)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(service = service_name, format = ?format, "Logging initialized");
    }
}
