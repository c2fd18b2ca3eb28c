use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::json;

use launchpad_common::{AppError, Recipe, RecipeStatus, StoredRecipe};
use launchpad_events::Topic;
use launchpad_process::find_inference_process;

use crate::state::AppState;

fn recipe_status(st: &AppState, recipe: &Recipe) -> RecipeStatus {
    if st.coordinator.launch_state().current().as_deref() == Some(recipe.id.as_str()) {
        return RecipeStatus::Starting;
    }
    match find_inference_process(recipe.port) {
        Some(incumbent) if incumbent.serves_same_model(recipe.backend, &recipe.model_path, recipe.served_model_name.as_deref()) => {
            RecipeStatus::Running
        }
        _ => RecipeStatus::Stopped,
    }
}

pub async fn list_recipes(State(st): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let recipes = st.store.list().await.map_err(|e| AppError::internal(e.to_string()))?;
    let stored: Vec<StoredRecipe> = recipes
        .into_iter()
        .map(|recipe| {
            let status = recipe_status(&st, &recipe);
            StoredRecipe { recipe, status }
        })
        .collect();
    Ok(Json(stored))
}

pub async fn get_recipe(State(st): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let recipe = st
        .store
        .get(&id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("recipe {id} not found")))?;
    Ok(Json(recipe.to_detail_json()))
}

async fn upsert_recipe(st: &AppState, recipe: Recipe) -> Result<impl IntoResponse, AppError> {
    recipe.validate().map_err(AppError::bad_request)?;
    st.store.save(recipe.clone()).await.map_err(|e| AppError::internal(e.to_string()))?;
    Ok((axum::http::StatusCode::OK, Json(recipe.to_detail_json())))
}

pub async fn create_recipe(State(st): State<AppState>, Json(recipe): Json<Recipe>) -> Result<impl IntoResponse, AppError> {
    upsert_recipe(&st, recipe).await
}

pub async fn update_recipe(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(mut recipe): Json<Recipe>,
) -> Result<impl IntoResponse, AppError> {
    recipe.id = id;
    upsert_recipe(&st, recipe).await
}

/// Refuses deletion of a recipe that is currently starting or running,
/// matching the store-boundary convention: callers must stop a recipe before
/// removing its definition.
pub async fn delete_recipe(State(st): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let recipe = st
        .store
        .get(&id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("recipe {id} not found")))?;

    if recipe_status(&st, &recipe) != RecipeStatus::Stopped {
        return Err(AppError::bad_request(format!(
            "recipe {id} is running; stop it before deleting"
        )));
    }

    st.store.delete(&id).await.map_err(|e| AppError::internal(e.to_string()))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn launch(State(st): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    st.metrics.launches_started.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    match st.coordinator.launch(&id).await {
        Ok(result) => {
            if result.success {
                st.metrics.launches_succeeded.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            } else {
                st.metrics.launches_cancelled.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            Ok(Json(result).into_response())
        }
        Err(AppError::LaunchFailure { reason, message, log_file }) => {
            st.metrics.launches_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Err(AppError::LaunchFailure { reason, message, log_file })
        }
        Err(e) => Err(e),
    }
}

pub async fn cancel_launch(State(st): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    st.coordinator.cancel(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct EvictQuery {
    pub port: u16,
    #[serde(default)]
    pub force: Option<bool>,
}

/// `force` is parsed as a real boolean (default `false`) rather than mere
/// query-key presence, so an explicit `force=false` is honored.
pub async fn evict(State(st): State<AppState>, Query(query): Query<EvictQuery>) -> impl IntoResponse {
    let pid = st.coordinator.evict(query.port, query.force.unwrap_or(false)).await;
    Json(json!({"pid": pid}))
}

#[derive(Debug, Deserialize)]
pub struct WaitReadyQuery {
    pub id: String,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Polls the inference health endpoint of the named recipe until it answers
/// or `timeout` seconds elapse (default 30s). The core spec names only
/// `timeout`; `id` selects which recipe's `host:port` to probe since the
/// operation is inherently target-scoped.
pub async fn wait_ready(State(st): State<AppState>, Query(query): Query<WaitReadyQuery>) -> Result<impl IntoResponse, AppError> {
    let recipe = st
        .store
        .get(&query.id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("recipe {} not found", query.id)))?;

    let timeout = Duration::from_secs(query.timeout.unwrap_or(30));
    let ready = launchpad_process::wait_for_health(
        &recipe.host,
        recipe.port,
        st.inference_api_key.as_deref(),
        timeout,
        Duration::from_millis(500),
    )
    .await;
    Ok(Json(json!({"ready": ready})))
}

fn sse_event(envelope: launchpad_events::Envelope) -> Result<Event, Infallible> {
    Ok(Event::default().event(envelope.topic).data(envelope.data.to_string()))
}

pub async fn events_stream(State(st): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut progress = st.events.subscribe(Topic::LaunchProgress);
    let mut status = st.events.subscribe(Topic::Status);
    let mut gpu = st.events.subscribe(Topic::Gpu);
    let mut metrics = st.events.subscribe(Topic::Metrics);

    let stream = async_stream::stream! {
        loop {
            let envelope = tokio::select! {
                ev = progress.recv() => ev,
                ev = status.recv() => ev,
                ev = gpu.recv() => ev,
                ev = metrics.recv() => ev,
            };
            match envelope {
                Some(envelope) => yield sse_event(envelope),
                // All four channels are process-lifetime singletons; a close
                // only happens on shutdown.
                None => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

pub async fn not_found() -> Response {
    AppError::not_found("no such route").into_response()
}
