use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long, env = "LAUNCHPAD_LISTEN_ADDR", default_value = "0.0.0.0:8900")]
    pub listen_addr: String,

    /// Path to the redb recipe store file.
    #[arg(long, env = "LAUNCHPAD_STORE_PATH", default_value = "/var/lib/launchpad/recipes.redb")]
    pub store_path: String,

    /// Directory backend stdout/stderr logs are written to.
    #[arg(long, env = "LAUNCHPAD_LOG_DIR", default_value = "/tmp")]
    pub log_dir: String,

    /// Seconds to wait for a launched backend to report healthy before failing.
    #[arg(long, env = "LAUNCHPAD_READY_TIMEOUT_SECS", default_value_t = 300)]
    pub ready_timeout_secs: u64,

    /// Seconds between health probes while waiting for readiness.
    #[arg(long, env = "LAUNCHPAD_HEALTH_POLL_SECS", default_value_t = 2)]
    pub health_poll_secs: u64,

    /// Log output format: "text" (human-readable, default) or "json" (structured).
    #[arg(long, env = "LAUNCHPAD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Alternative binary search root consulted ahead of `PATH`.
    #[arg(long, env = "VLLM_STUDIO_RUNTIME_BIN")]
    pub runtime_bin_override: Option<String>,

    /// Direct override for the `llama-server` binary.
    #[arg(long, env = "LLAMA_SERVER_PATH")]
    pub llama_server_path: Option<String>,

    /// Direct override for the `sd` CLI binary used by the sdcpp shim.
    #[arg(long, env = "SD_CLI_PATH")]
    pub sd_cli_path: Option<String>,

    /// Bearer token presented to `Authorization` on inference health probes.
    #[arg(long, env = "LAUNCHPAD_INFERENCE_API_KEY")]
    pub inference_api_key: Option<String>,
}
