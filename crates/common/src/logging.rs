//! Tracing subscriber setup shared by the shard and gateway processes.
//!
//! Stdout gets human-readable logs filtered by `RUST_LOG` (falling back to the configured
//! level). With `json_files` enabled, the `queries` and `errors` targets are also written as
//! JSON lines to daily rolling files.

use crate::config::LoggingSettings;
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(filter);

    let registry = tracing_subscriber::registry().with(stdout_layer);

    if settings.json_files {
        std::fs::create_dir_all(&settings.directory)?;

        let queries_appender =
            tracing_appender::rolling::daily(&settings.directory, "queries.jsonl");
        let errors_appender = tracing_appender::rolling::daily(&settings.directory, "errors.jsonl");

        let queries_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(queries_appender)
            .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                metadata.target() == "queries"
            }));

        let errors_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(errors_appender)
            .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                metadata.target() == "errors"
            }));

        registry.with(queries_layer).with(errors_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }
    Ok(())
}
