use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::discover::find_inference_process;
use crate::POLITE_WAIT;

/// Signal-0 liveness probe. A `zombie` process (reaped by the kernel but not
/// yet collected by its parent) is treated as not-alive so an eviction isn't
/// blocked on it.
pub fn pid_alive(pid: u32) -> bool {
    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => !is_zombie(pid),
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(status) = std::fs::read_to_string(format!("/proc/{pid}/status")) else {
        return false;
    };
    status.lines().any(|line| line.starts_with("State:") && line.contains('Z'))
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

fn send_signal(pid: u32, signal: Signal) {
    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, signal = ?signal, error = %e, "signal delivery failed (process likely already gone)");
    }
}

async fn escalate(pid: u32, force: bool) {
    send_signal(pid, Signal::SIGTERM);
    let deadline = Instant::now() + POLITE_WAIT;
    while pid_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    if force && pid_alive(pid) {
        send_signal(pid, Signal::SIGKILL);
    }
}

/// Terminate the process bound to `port`, if any. Sends `SIGTERM`, waits up
/// to [`POLITE_WAIT`], and escalates to `SIGKILL` when `force`. Returns the
/// pid that was targeted.
pub async fn evict_port(port: u16, force: bool) -> Option<u32> {
    let info = find_inference_process(port)?;
    escalate(info.pid, force).await;
    Some(info.pid)
}

/// Terminate a specific pid the same way.
pub async fn kill_pid(pid: u32, force: bool) {
    escalate(pid, force).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        // PID 1 is always alive on a real system (init); pick an absurd one instead.
        assert!(!pid_alive(u32::MAX - 1));
    }
}
