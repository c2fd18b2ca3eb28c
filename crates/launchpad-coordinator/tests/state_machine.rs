//! Integration tests driving the coordinator state machine against fake
//! collaborators: a real spawned child process (a shell script standing in
//! for a backend binary) and, where readiness must be observed, a minimal
//! HTTP server bound to an ephemeral port answering `/health`.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use launchpad_common::{AppError, Backend, LaunchStage, Recipe};
use launchpad_coordinator::{Coordinator, CoordinatorConfig};
use launchpad_events::{EventBus, SharedEventBus, Topic};
use launchpad_store::{MemoryRecipeStore, RecipeStore};

/// Writes an executable shell script to `dir` under the literal filename
/// `llama-server` so `find_inference_process`'s substring classifier
/// recognizes it the same way it would the real binary.
fn write_fake_backend(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("llama-server");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn recipe(id: &str, port: u16) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: id.to_string(),
        backend: Backend::LlamaCpp,
        model_path: format!("/models/{id}.gguf"),
        host: "127.0.0.1".to_string(),
        port,
        tensor_parallel_size: 1,
        pipeline_parallel_size: 1,
        max_model_len: None,
        gpu_memory_utilization: None,
        max_num_seqs: None,
        kv_cache_dtype: Default::default(),
        dtype: None,
        quantization: None,
        trust_remote_code: false,
        tool_call_parser: None,
        reasoning_parser: None,
        served_model_name: None,
        python_path: None,
        extra_args: HashMap::new(),
        env_vars: HashMap::new(),
    }
}

/// Binds an ephemeral port and serves `/health` with 200 once `healthy` is
/// set, 503 otherwise. Returns the bound port.
async fn spawn_health_server(healthy: Arc<AtomicBool>) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().route(
        "/health",
        get(move || {
            let healthy = healthy.clone();
            async move {
                if healthy.load(Ordering::SeqCst) {
                    axum::http::StatusCode::OK
                } else {
                    axum::http::StatusCode::SERVICE_UNAVAILABLE
                }
            }
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    port
}

async fn coordinator_with(config: CoordinatorConfig) -> (Arc<Coordinator>, Arc<dyn RecipeStore>, SharedEventBus) {
    let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());
    let events: SharedEventBus = Arc::new(EventBus::new());
    (Arc::new(Coordinator::new(store.clone(), events.clone(), config)), store, events)
}

#[tokio::test]
async fn happy_path_reaches_ready_once_health_probe_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "sleep 30");

    let healthy = Arc::new(AtomicBool::new(true));
    let port = spawn_health_server(healthy).await;

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(10),
        health_poll_interval: Duration::from_millis(100),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    store.save(recipe("happy", port)).await.unwrap();

    let result = coordinator.launch("happy").await.unwrap();
    assert!(result.success);
    assert!(result.pid.is_some());
}

#[tokio::test]
async fn fatal_log_pattern_wins_over_a_concurrently_arriving_200() {
    let dir = tempfile::tempdir().unwrap();
    // Prints the fatal line immediately, then lingers so the coordinator has
    // something to kill.
    let script = write_fake_backend(dir.path(), "echo 'CUDA out of memory. Tried to allocate 8.0 GiB'\nsleep 30");

    let healthy = Arc::new(AtomicBool::new(true));
    let port = spawn_health_server(healthy).await;

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(10),
        health_poll_interval: Duration::from_millis(50),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    store.save(recipe("fatal", port)).await.unwrap();

    let err = coordinator.launch("fatal").await.unwrap_err();
    match err {
        AppError::LaunchFailure { reason, message, log_file } => {
            assert_eq!(reason.as_str(), "fatal");
            assert!(message.contains("CUDA out of memory"));
            assert!(log_file.is_some());
        }
        other => panic!("expected LaunchFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn process_exiting_before_ready_is_a_fatal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "echo 'boom'\nexit 1");

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(10),
        health_poll_interval: Duration::from_millis(50),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    // A port nothing will ever answer on.
    store.save(recipe("early-exit", 18321)).await.unwrap();

    let err = coordinator.launch("early-exit").await.unwrap_err();
    assert!(matches!(err, AppError::LaunchFailure { reason, .. } if reason.as_str() == "fatal"));
}

#[tokio::test]
async fn timeout_without_health_or_fatal_pattern_fails_with_timeout_reason() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "sleep 30");

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_millis(200),
        health_poll_interval: Duration::from_millis(50),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    store.save(recipe("never-ready", 18322)).await.unwrap();

    let err = coordinator.launch("never-ready").await.unwrap_err();
    match err {
        AppError::LaunchFailure { reason, message, .. } => {
            assert_eq!(reason.as_str(), "timeout");
            assert!(message.starts_with("Model failed to become ready"));
        }
        other => panic!("expected LaunchFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_during_waiting_kills_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "sleep 30");

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(30),
        health_poll_interval: Duration::from_millis(100),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    store.save(recipe("cancel-me", 18323)).await.unwrap();

    let coordinator_clone = coordinator.clone();
    let launch_task = tokio::spawn(async move { coordinator_clone.launch("cancel-me").await });

    // Give the attempt time to reach Waiting before cancelling it.
    tokio::time::sleep(Duration::from_millis(300)).await;
    coordinator.cancel("cancel-me").await.unwrap();

    let result = launch_task.await.unwrap().unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "launch cancelled");
}

#[tokio::test]
async fn preempting_an_in_flight_launch_cancels_it_and_lets_the_new_one_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "sleep 30");

    let healthy_b = Arc::new(AtomicBool::new(true));
    let port_b = spawn_health_server(healthy_b).await;

    let (coordinator, store, events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(10),
        health_poll_interval: Duration::from_millis(100),
        eviction_settle_delay: Duration::from_millis(1),
        preemption_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    // "a" sits on a port nothing answers on, so it stays in Waiting until preempted.
    store.save(recipe("a", 18324)).await.unwrap();
    store.save(recipe("b", port_b)).await.unwrap();

    let mut progress = events.subscribe(Topic::LaunchProgress);
    let progress_task = tokio::spawn(async move {
        let mut a_stages = Vec::new();
        while let Some(envelope) = progress.recv().await {
            if envelope.data["recipe_id"] != "a" {
                continue;
            }
            let Ok(stage) = serde_json::from_value::<LaunchStage>(envelope.data["stage"].clone()) else {
                continue;
            };
            let terminal = stage.is_terminal();
            a_stages.push(stage);
            if terminal {
                break;
            }
        }
        a_stages
    });

    let coordinator_a = coordinator.clone();
    let a_task = tokio::spawn(async move { coordinator_a.launch("a").await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    let b_result = coordinator.launch("b").await.unwrap();
    assert!(b_result.success);

    let a_result = a_task.await.unwrap().unwrap();
    assert!(!a_result.success);
    assert_eq!(a_result.message, "launch cancelled");

    let a_stages = progress_task.await.unwrap();
    let terminal_count = a_stages.iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminal_count, 1, "expected exactly one terminal stage for 'a', got {a_stages:?}");
    assert_eq!(a_stages.last(), Some(&LaunchStage::Cancelled));
}

#[tokio::test]
async fn relaunching_the_incumbent_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_fake_backend(dir.path(), "sleep 30");

    let healthy = Arc::new(AtomicBool::new(true));
    let port = spawn_health_server(healthy).await;

    let (coordinator, store, _events) = coordinator_with(CoordinatorConfig {
        log_dir: dir.path().to_path_buf(),
        ready_timeout: Duration::from_secs(10),
        health_poll_interval: Duration::from_millis(100),
        eviction_settle_delay: Duration::from_millis(1),
        llama_server_path: Some(script.to_string_lossy().into_owned()),
        ..CoordinatorConfig::default()
    })
    .await;

    let mut r = recipe("same", port);
    r.served_model_name = Some("same-model".to_string());
    store.save(r).await.unwrap();

    let first = coordinator.launch("same").await.unwrap();
    assert!(first.success);
    let first_pid = first.pid.unwrap();

    let second = coordinator.launch("same").await.unwrap();
    assert!(second.success);
    assert_eq!(second.message, "already running");
    assert_eq!(second.pid, Some(first_pid));
}
