use std::collections::HashMap;

use launchpad_common::Recipe;

use crate::extras::append_extras;
use crate::resolve::resolve_binary;
use crate::{BuildContext, BuiltCommand};

/// `llama-server`. `LLAMA_SERVER_PATH` (via `ctx.llama_server_path`) is a
/// direct override and wins outright; otherwise falls back to the shared
/// binary search order, and finally to the bare name (left to `PATH` lookup
/// by the child-process spawn) if unresolved.
pub fn build(recipe: &Recipe, ctx: &BuildContext) -> BuiltCommand {
    let program = ctx
        .llama_server_path
        .clone()
        .or_else(|| resolve_binary("llama-server", ctx.runtime_bin_override.as_deref()).map(|p| p.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "llama-server".to_string());

    let mut args = Vec::new();
    let mut emitted = Vec::new();

    args.push("-m".to_string());
    args.push(recipe.model_path.clone());
    args.push("--host".to_string());
    args.push(recipe.host.clone());
    args.push("--port".to_string());
    args.push(recipe.port.to_string());
    emitted.extend(["host", "port"]);

    if let Some(len) = recipe.max_model_len {
        args.push("-c".to_string());
        args.push(len.to_string());
        emitted.push("max_model_len");
    }

    let n_gpu_layers = recipe
        .extra_args
        .get("n_gpu_layers")
        .and_then(|v| v.as_u64())
        .unwrap_or(99);
    args.push("-ngl".to_string());
    args.push(n_gpu_layers.to_string());
    emitted.push("n_gpu_layers");

    if let Some(seqs) = recipe.max_num_seqs {
        args.push("-np".to_string());
        args.push(seqs.to_string());
        emitted.push("max_num_seqs");
    }

    args.push("--cont-batching".to_string());
    args.push("--metrics".to_string());

    if recipe.tensor_parallel_size > 1 {
        args.push("--split-mode".to_string());
        args.push("layer".to_string());
        if let Some(split) = recipe.extra_args.get("tensor_split").and_then(|v| v.as_str()) {
            args.push("--tensor-split".to_string());
            args.push(split.to_string());
        }
        emitted.push("tensor_split");
    }

    if let Some(batch) = recipe.extra_args.get("batch_size").and_then(|v| v.as_u64()) {
        args.push("-b".to_string());
        args.push(batch.to_string());
        emitted.push("batch_size");
    }
    if recipe
        .extra_args
        .get("flash_attn")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        args.push("--flash-attn".to_string());
        emitted.push("flash_attn");
    }

    if let Some(name) = &recipe.served_model_name {
        args.push("--alias".to_string());
        args.push(name.clone());
        emitted.push("served_model_name");
    }

    append_extras(&mut args, &recipe.extra_args, &emitted);

    let mut env: HashMap<String, String> = recipe.env_vars.clone();
    if let Some(devices) = crate::resolve_cuda_visible_devices(recipe, ctx) {
        env.insert("CUDA_VISIBLE_DEVICES".to_string(), devices);
    }

    BuiltCommand { program, args, env }
}
