//! Tracing and logging configuration for the server
//!
//! Development gets readable multi-line output, production gets one JSON
//! object per event so plan and session ids can be queried by field.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

/// Default filter in development: engine decisions and SQL warnings only
const DEVELOPMENT_FILTER: &str = "debug,studycal_planner=debug,tower_http=debug,sqlx=warn";

const PRODUCTION_FILTER: &str = "info,studycal_planner=info,tower_http=info,sqlx=warn";

/// Initialize tracing/logging based on the environment
///
/// # Development Mode
/// - Pretty-printed logs with file locations and line numbers
/// - Default level: DEBUG, including the planner's strategy and volume events
///
/// # Production Mode
/// - JSON-formatted events with the current span flattened in
/// - Default level: INFO
///
/// # Environment Variables
/// - `RUST_LOG`: Override the default filter (e.g., `RUST_LOG=info,studycal_planner=debug`)
pub fn init_tracing(env: &Environment) {
    if env.is_development() {
        init_development_tracing();
    } else {
        init_production_tracing();
    }
}

fn init_development_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEVELOPMENT_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .pretty()
                .with_filter(env_filter),
        )
        .init();

    tracing::info!("Tracing initialized in development mode");
}

fn init_production_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(PRODUCTION_FILTER));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_target(true)
                .with_filter(env_filter),
        )
        .init();

    tracing::info!("Tracing initialized in production mode");
}
