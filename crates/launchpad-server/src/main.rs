mod args;
mod handlers;
mod metrics;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use launchpad_coordinator::{Coordinator, CoordinatorConfig};
use launchpad_events::EventBus;
use launchpad_store::{RecipeStore, RedbRecipeStore};

use crate::args::Args;
use crate::handlers::{
    cancel_launch, create_recipe, delete_recipe, events_stream, evict, get_recipe, launch,
    list_recipes, not_found, update_recipe, wait_ready,
};
use crate::metrics::{healthz, metrics_handler, track_requests, Metrics};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    launchpad_common::telemetry::init_tracing(&args.log_format);

    tracing::info!(listen_addr = %args.listen_addr, store_path = %args.store_path, "launchpad starting");

    let store: Arc<dyn RecipeStore> = match RedbRecipeStore::open(&args.store_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, path = %args.store_path, "failed to open recipe store");
            std::process::exit(1);
        }
    };

    let events = Arc::new(EventBus::new());

    let coordinator_config = CoordinatorConfig {
        log_dir: PathBuf::from(&args.log_dir),
        ready_timeout: Duration::from_secs(args.ready_timeout_secs),
        health_poll_interval: Duration::from_secs(args.health_poll_secs),
        runtime_bin_override: args.runtime_bin_override.clone(),
        llama_server_path: args.llama_server_path.clone(),
        sd_cli_path: args.sd_cli_path.clone(),
        inference_bearer_token: args.inference_api_key.clone(),
        ..CoordinatorConfig::default()
    };
    let coordinator = Arc::new(Coordinator::new(store.clone(), events.clone(), coordinator_config));

    let st = AppState {
        store,
        events,
        coordinator,
        metrics: Arc::new(Metrics::default()),
        inference_api_key: args.inference_api_key.clone(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/:id", get(get_recipe).put(update_recipe).delete(delete_recipe))
        .route("/launch/:id", post(launch))
        .route("/launch/:id/cancel", post(cancel_launch))
        .route("/evict", post(evict))
        .route("/wait-ready", get(wait_ready))
        .route("/events", get(events_stream))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(st.clone(), track_requests))
        .with_state(st);

    let listener = match tokio::net::TcpListener::bind(&args.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %args.listen_addr, "failed to bind launchpad address");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "launchpad server exited");
    }
}
