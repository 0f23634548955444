use axum::{Router, middleware, routing::get};
use studycal_api::{config::ApiConfig, state::ApiState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    studycal_api::tracing::init_tracing(&config.env);

    let metrics_handle = studycal_api::metrics::init_metrics()?;
    tracing::info!("Prometheus metrics exporter initialized");

    let pool = studycal_db::create_pool(&config.database_url, config.db_max_connections).await?;
    studycal_db::ensure_db_and_migrate(&config.database_url, &pool).await?;

    let state = ApiState::new(&config, pool)?;

    if config.missed_session_sweep {
        let _job_handles = studycal_api::jobs::start_background_jobs(state.clone());
        tracing::info!("Background jobs started (missed-session sweep daily)");
    }

    let cors = studycal_api::middleware::cors::create_cors_layer(config.parsed_allowed_origins());

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(
            DefaultMakeSpan::new()
                .level(Level::INFO)
                .include_headers(true),
        )
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Metrics endpoint carries its own state
    let metrics_app = Router::new()
        .route("/metrics", get(studycal_api::metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = studycal_api::router::router()
        .merge(metrics_app)
        .with_state(state)
        .layer(cors)
        .layer(trace_layer)
        .layer(middleware::from_fn(studycal_api::metrics::track_metrics))
        .layer(middleware::from_fn(
            studycal_api::middleware::request_id::request_id_middleware,
        ));

    let app = studycal_api::middleware::security_headers::apply_security_headers(app, config.env);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(environment = ?config.env, "Server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
