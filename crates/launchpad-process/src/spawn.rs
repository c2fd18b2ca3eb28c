use std::path::{Path, PathBuf};

use launchpad_commands::BuiltCommand;
use launchpad_common::Recipe;
use tokio::process::{Child, Command};

/// Result of a successful spawn: the live child handle, its pid, and the log
/// file its stdout/stderr were redirected to.
pub struct LaunchOutcome {
    pub child: Child,
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Spawn `cmd` for `recipe`, redirecting stdout+stderr to
/// `{log_dir}/{backend}_{recipe_id}.log` (truncated on each launch).
pub fn launch_model(recipe: &Recipe, cmd: &BuiltCommand, log_dir: &Path) -> anyhow::Result<LaunchOutcome> {
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(format!("{}_{}.log", recipe.backend.as_str(), recipe.id));
    let log_file = std::fs::File::create(&log_path)?;
    let log_file_err = log_file.try_clone()?;

    let mut command = Command::new(&cmd.program);
    command.args(&cmd.args);
    command.envs(&cmd.env);
    command.stdout(log_file);
    command.stderr(log_file_err);
    command.stdin(std::process::Stdio::null());
    command.kill_on_drop(false);

    let child = command.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| anyhow::anyhow!("spawned child has no pid (already reaped)"))?;

    tracing::info!(recipe_id = %recipe.id, pid, log_path = %log_path.display(), "spawned inference process");

    Ok(LaunchOutcome { child, pid, log_path })
}
