use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Coordinator-internal counters. Scoped to the control plane's own
/// operation, not to the inference backends it launches (those remain out of
/// scope for metrics scraping).
#[derive(Debug, Default)]
pub struct Metrics {
    pub launches_started: AtomicU64,
    pub launches_succeeded: AtomicU64,
    pub launches_failed: AtomicU64,
    pub launches_cancelled: AtomicU64,
    pub requests_total: AtomicU64,
    pub requests_inflight: AtomicU64,
}

pub fn render_metrics(metrics: &Metrics, subscribers: &[(&'static str, usize)], recipe_count: usize) -> String {
    let mut out = format!(
        "launchpad_launches_started_total {}\nlaunchpad_launches_succeeded_total {}\nlaunchpad_launches_failed_total {}\nlaunchpad_launches_cancelled_total {}\nlaunchpad_requests_total {}\nlaunchpad_requests_inflight {}\nlaunchpad_recipes_total {}\n",
        metrics.launches_started.load(Ordering::Relaxed),
        metrics.launches_succeeded.load(Ordering::Relaxed),
        metrics.launches_failed.load(Ordering::Relaxed),
        metrics.launches_cancelled.load(Ordering::Relaxed),
        metrics.requests_total.load(Ordering::Relaxed),
        metrics.requests_inflight.load(Ordering::Relaxed),
        recipe_count,
    );
    for (topic, count) in subscribers {
        out.push_str(&format!("launchpad_event_subscribers{{topic=\"{topic}\"}} {count}\n"));
    }
    out
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let recipe_count = st.store.list().await.map(|r| r.len()).unwrap_or(0);
    let subscribers: Vec<(&'static str, usize)> = launchpad_events::Topic::all()
        .iter()
        .map(|t| (t.as_str(), st.events.subscriber_count(*t)))
        .collect();
    let body = render_metrics(&st.metrics, &subscribers, recipe_count);
    (axum::http::StatusCode::OK, body)
}

pub async fn healthz() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

pub async fn track_requests(State(st): State<AppState>, req: Request<Body>, next: Next) -> Response {
    st.metrics.requests_inflight.fetch_add(1, Ordering::Relaxed);
    let resp = next.run(req).await;
    st.metrics.requests_inflight.fetch_sub(1, Ordering::Relaxed);
    st.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    resp
}
