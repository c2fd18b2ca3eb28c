use std::collections::HashMap;

use launchpad_common::Recipe;

use crate::auto_detect::{auto_reasoning_parser, auto_tool_call_parser, wants_expert_parallel};
use crate::extras::append_extras;
use crate::resolve::{resolve_binary, resolve_python};
use crate::{BuildContext, BuiltCommand};

/// Resolution order: `<pydir>/vllm serve`, else `python -m
/// vllm.entrypoints.openai.api_server`, else `vllm serve` found on `PATH`.
pub fn build(recipe: &Recipe, ctx: &BuildContext) -> BuiltCommand {
    let mut args = Vec::new();
    let mut emitted = Vec::new();

    let (program, lead_args) = if let Some(bin) = resolve_binary("vllm", ctx.runtime_bin_override.as_deref()) {
        (bin.to_string_lossy().into_owned(), vec!["serve".to_string()])
    } else {
        let python = resolve_python(recipe, "python3");
        (python, vec!["-m".to_string(), "vllm.entrypoints.openai.api_server".to_string()])
    };
    args.extend(lead_args);

    args.push(recipe.model_path.clone());
    args.push("--host".to_string());
    args.push(recipe.host.clone());
    args.push("--port".to_string());
    args.push(recipe.port.to_string());
    emitted.extend(["host", "port"]);

    if let Some(name) = &recipe.served_model_name {
        args.push("--served-model-name".to_string());
        args.push(name.clone());
        emitted.push("served_model_name");
    }

    args.push("--tensor-parallel-size".to_string());
    args.push(recipe.tensor_parallel_size.to_string());
    emitted.push("tensor_parallel_size");

    if recipe.pipeline_parallel_size > 1 {
        args.push("--pipeline-parallel-size".to_string());
        args.push(recipe.pipeline_parallel_size.to_string());
        emitted.push("pipeline_parallel_size");
    }

    if let Some(len) = recipe.max_model_len {
        args.push("--max-model-len".to_string());
        args.push(len.to_string());
        emitted.push("max_model_len");
    }
    if let Some(util) = recipe.gpu_memory_utilization {
        args.push("--gpu-memory-utilization".to_string());
        args.push(util.to_string());
        emitted.push("gpu_memory_utilization");
    }
    if let Some(seqs) = recipe.max_num_seqs {
        args.push("--max-num-seqs".to_string());
        args.push(seqs.to_string());
        emitted.push("max_num_seqs");
    }

    use launchpad_common::recipe::KvCacheDtype;
    match recipe.kv_cache_dtype {
        KvCacheDtype::Auto => {}
        KvCacheDtype::Fp8 => args.extend(["--kv-cache-dtype".to_string(), "fp8".to_string()]),
        KvCacheDtype::Fp8E5m2 => args.extend(["--kv-cache-dtype".to_string(), "fp8_e5m2".to_string()]),
        KvCacheDtype::Fp8E4m3 => args.extend(["--kv-cache-dtype".to_string(), "fp8_e4m3".to_string()]),
    }
    emitted.push("kv_cache_dtype");

    if recipe.trust_remote_code {
        args.push("--trust-remote-code".to_string());
    }
    emitted.push("trust_remote_code");

    let model_id_lower = recipe.model_path.to_ascii_lowercase();
    let reasoning_parser = recipe
        .reasoning_parser
        .clone()
        .or_else(|| auto_reasoning_parser(&model_id_lower).map(str::to_string));
    let tool_call_parser = recipe
        .tool_call_parser
        .clone()
        .or_else(|| auto_tool_call_parser(&model_id_lower).map(str::to_string));

    if let Some(parser) = &reasoning_parser {
        args.push("--reasoning-parser".to_string());
        args.push(parser.clone());
        emitted.push("reasoning_parser");
    }
    if let Some(parser) = &tool_call_parser {
        args.push("--tool-call-parser".to_string());
        args.push(parser.clone());
        args.push("--enable-auto-tool-choice".to_string());
        emitted.push("tool_call_parser");
    }

    if wants_expert_parallel(&model_id_lower, recipe.tensor_parallel_size) {
        args.push("--enable-expert-parallel".to_string());
    }

    if let Some(q) = &recipe.quantization {
        args.push("--quantization".to_string());
        args.push(q.clone());
        emitted.push("quantization");
    }
    if let Some(dtype) = &recipe.dtype {
        args.push("--dtype".to_string());
        args.push(dtype.clone());
        emitted.push("dtype");
    }

    append_extras(&mut args, &recipe.extra_args, &emitted);

    let mut env: HashMap<String, String> = recipe.env_vars.clone();
    if let Some(devices) = crate::resolve_cuda_visible_devices(recipe, ctx) {
        env.insert("CUDA_VISIBLE_DEVICES".to_string(), devices);
    }

    BuiltCommand { program, args, env }
}
