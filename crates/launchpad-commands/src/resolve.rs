use std::path::{Path, PathBuf};

/// Search order: runtime override, `PATH`, `~/.local/bin`, `~/bin`. First
/// existing wins.
pub fn resolve_binary(name: &str, runtime_override: Option<&str>) -> Option<PathBuf> {
    if let Some(dir) = runtime_override {
        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    if let Some(home) = std::env::var_os("HOME") {
        for sub in [".local/bin", "bin"] {
            let candidate = Path::new(&home).join(sub).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

/// Resolution order for the device mask handed to a spawned backend:
/// an explicit `CUDA_VISIBLE_DEVICES` in `recipe.env_vars` wins, then
/// `extra_args.cuda_visible_devices`, then the externally supplied
/// [`crate::BuildContext::cuda_visible_devices`] (e.g. a future GPU
/// allocator); absent all three, the child inherits the controller's own
/// environment unchanged.
pub fn resolve_cuda_visible_devices(recipe: &launchpad_common::Recipe, ctx: &crate::BuildContext) -> Option<String> {
    if let Some(explicit) = recipe.env_vars.get("CUDA_VISIBLE_DEVICES") {
        return Some(explicit.clone());
    }
    if let Some(v) = recipe.extra_args.get("cuda_visible_devices").and_then(|v| v.as_str()) {
        return Some(v.to_string());
    }
    ctx.cuda_visible_devices.clone()
}

/// Python interpreter resolution: explicit `python_path` on the recipe wins;
/// else `extra_args.venv_path/bin/python` if it exists; else `default`.
pub fn resolve_python(recipe: &launchpad_common::Recipe, default: &str) -> String {
    if let Some(path) = &recipe.python_path {
        return path.clone();
    }
    if let Some(venv) = recipe.extra_args.get("venv_path").and_then(|v| v.as_str()) {
        let candidate = Path::new(venv).join("bin").join("python");
        if candidate.is_file() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    default.to_string()
}
