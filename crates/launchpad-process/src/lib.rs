pub mod discover;
pub mod health;
pub mod kill;
pub mod spawn;

pub use discover::find_inference_process;
pub use health::wait_for_health;
pub use kill::{evict_port, kill_pid};
pub use spawn::{launch_model, LaunchOutcome};

use std::time::Duration;

/// Grace period between a polite `SIGTERM` and a forced `SIGKILL`.
pub const POLITE_WAIT: Duration = Duration::from_secs(5);
