use std::time::Duration;

/// Probe `GET http://{host}:{port}/health` once. `None` bearer token omits
/// the `Authorization` header. Any network error or non-200 is treated as
/// "not yet ready" — exceptions here are expected, not exceptional.
pub async fn probe_health(host: &str, port: u16, bearer: Option<&str>) -> bool {
    let host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
    let url = format!("http://{host}:{port}/health");

    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build health-probe client");
            return false;
        }
    };

    let mut req = client.get(&url);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }

    match req.send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// Poll `probe_health` until it returns true or `timeout` elapses.
pub async fn wait_for_health(host: &str, port: u16, bearer: Option<&str>, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe_health(host, port, bearer).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
