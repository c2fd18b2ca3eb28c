use std::collections::HashMap;

use launchpad_common::Recipe;

use crate::resolve::resolve_python;
use crate::{BuildContext, BuiltCommand};

/// stable-diffusion.cpp runs behind a Python shim server
/// (`sdcpp-server.py`) that wraps the underlying `sd` CLI.
pub fn build(recipe: &Recipe, ctx: &BuildContext) -> BuiltCommand {
    let program = resolve_python(recipe, "python3");
    let mut args = vec!["sdcpp-server.py".to_string()];

    args.push("--host".to_string());
    args.push(recipe.host.clone());
    args.push("--port".to_string());
    args.push(recipe.port.to_string());

    // Precedence: an explicit per-recipe `extra_args.sd_cli` wins, then the
    // `SD_CLI_PATH` environment override, then the bare `sd` on `PATH`.
    let sd_cli = recipe
        .extra_args
        .get("sd_cli")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| ctx.sd_cli_path.clone())
        .unwrap_or_else(|| "sd".to_string());
    args.push("--sd-cli".to_string());
    args.push(sd_cli);

    args.push("--model".to_string());
    args.push(recipe.model_path.clone());

    if let Some(base_args) = recipe.extra_args.get("base_args") {
        args.push("--base-args-json".to_string());
        args.push(base_args.to_string());
    }
    if let Some(timeout) = recipe.extra_args.get("timeout_seconds").and_then(|v| v.as_u64()) {
        args.push("--timeout-seconds".to_string());
        args.push(timeout.to_string());
    }
    if let Some(output_dir) = recipe.extra_args.get("output_dir").and_then(|v| v.as_str()) {
        args.push("--output-dir".to_string());
        args.push(output_dir.to_string());
    }

    let mut env: HashMap<String, String> = recipe.env_vars.clone();
    if let Some(devices) = crate::resolve_cuda_visible_devices(recipe, ctx) {
        env.insert("CUDA_VISIBLE_DEVICES".to_string(), devices);
    }

    BuiltCommand { program, args, env }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_common::Backend;

    fn recipe() -> Recipe {
        Recipe {
            id: "sd-xl".to_string(),
            name: "Stable Diffusion XL".to_string(),
            backend: Backend::Sdcpp,
            model_path: "/models/sdxl.safetensors".to_string(),
            host: "0.0.0.0".to_string(),
            port: 7860,
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

    #[test]
    fn defaults_sd_cli_to_sd() {
        let cmd = build(&recipe(), &BuildContext::default());
        assert!(cmd.args.windows(2).any(|w| w == ["--sd-cli", "sd"]));
    }

    #[test]
    fn model_path_passed_through() {
        let cmd = build(&recipe(), &BuildContext::default());
        assert!(cmd.args.windows(2).any(|w| w == ["--model", "/models/sdxl.safetensors"]));
    }

    #[test]
    fn sd_cli_path_override_used_when_no_explicit_extra_arg() {
        let ctx = BuildContext {
            sd_cli_path: Some("/opt/sdcpp/sd".to_string()),
            ..Default::default()
        };
        let cmd = build(&recipe(), &ctx);
        assert!(cmd.args.windows(2).any(|w| w == ["--sd-cli", "/opt/sdcpp/sd"]));
    }

    #[test]
    fn explicit_extra_arg_sd_cli_wins_over_env_override() {
        let mut r = recipe();
        r.extra_args.insert("sd_cli".to_string(), serde_json::json!("/custom/sd"));
        let ctx = BuildContext {
            sd_cli_path: Some("/opt/sdcpp/sd".to_string()),
            ..Default::default()
        };
        let cmd = build(&r, &ctx);
        assert!(cmd.args.windows(2).any(|w| w == ["--sd-cli", "/custom/sd"]));
    }
}
