mod routes;
mod logger;
mod config;
mod response;
mod error;
mod models;
mod middleware;
mod state;
mod handler;
mod service;
mod pipeline;

mod tracer;

use log::{error, info, warn};
use opentelemetry::global;
use opentelemetry::global::shutdown_tracer_provider;
use tokio::signal;
use crate::logger::logger::setup_logger;
use crate::config::settings::SETTINGS;
use crate::pipeline::verify_pipeline::verify_pipeline::VerifyPipeline;
use crate::routes::root::{root_routes, RouterState};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
use crate::tracer::tracer::init_tracer_provider;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() {
    crate::config::parameter::init();

    // Setup logger
    setup_logger(SETTINGS.logger.as_ref());
    let addr = format!("0.0.0.0:{}", SETTINGS.server.http_port);

    // Setup pipeline
    let verify_pipeline = VerifyPipeline::new(&SETTINGS)
        .await
        .unwrap_or_else(|e| panic!("Failed to init verify pipeline: {e:#}"));
    info!("environment: {}", SETTINGS.environment.as_deref().unwrap_or("development"));
    info!("completed initializing pipeline, reference images in {}", SETTINGS.database_dir);

    if !verify_pipeline.reference_database().is_available().await {
        warn!("database directory {} does not exist yet", SETTINGS.database_dir);
    }

    // Setup tracing
    let tracing_enabled = match &SETTINGS.tracer {
        Some(tracer) => match init_tracer_provider(tracer, &SETTINGS.app.name) {
            Ok(tracer_provider) => {
                global::set_tracer_provider(tracer_provider);
                true
            }
            Err(e) => {
                error!("failed to initialize tracer provider: {e}");
                false
            }
        },
        None => false,
    };

    // Init server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to create new listener: {e}"));
    info!("starting api server on {:?}", addr);
    let router_state = RouterState::new(verify_pipeline, &SETTINGS);

    axum::serve(listener, root_routes(router_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| panic!("Failed to start api server: {e}"));

    if tracing_enabled {
        shutdown_tracer_provider();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
