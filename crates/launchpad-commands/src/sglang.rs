use std::collections::HashMap;

use launchpad_common::Recipe;

use crate::auto_detect::{auto_reasoning_parser, auto_tool_call_parser};
use crate::extras::append_extras;
use crate::resolve::resolve_python;
use crate::{BuildContext, BuiltCommand};

/// `<python> -m sglang.launch_server`.
pub fn build(recipe: &Recipe, ctx: &BuildContext) -> BuiltCommand {
    let program = resolve_python(recipe, "python3");
    let mut args = vec!["-m".to_string(), "sglang.launch_server".to_string()];
    let mut emitted = Vec::new();

    args.push("--model-path".to_string());
    args.push(recipe.model_path.clone());
    args.push("--host".to_string());
    args.push(recipe.host.clone());
    args.push("--port".to_string());
    args.push(recipe.port.to_string());
    emitted.extend(["model_path", "host", "port"]);

    if let Some(name) = &recipe.served_model_name {
        args.push("--served-model-name".to_string());
        args.push(name.clone());
        emitted.push("served_model_name");
    }

    args.push("--tp".to_string());
    args.push(recipe.tensor_parallel_size.to_string());
    emitted.push("tensor_parallel_size");

    if recipe.pipeline_parallel_size > 1 {
        args.push("--dp".to_string());
        args.push(recipe.pipeline_parallel_size.to_string());
        emitted.push("pipeline_parallel_size");
    }

    if let Some(len) = recipe.max_model_len {
        args.push("--context-length".to_string());
        args.push(len.to_string());
        emitted.push("max_model_len");
    }
    if let Some(util) = recipe.gpu_memory_utilization {
        args.push("--mem-fraction-static".to_string());
        args.push(util.to_string());
        emitted.push("gpu_memory_utilization");
    }
    if let Some(seqs) = recipe.max_num_seqs {
        args.push("--max-running-requests".to_string());
        args.push(seqs.to_string());
        emitted.push("max_num_seqs");
    }

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
        emitted.push("tool_call_parser");
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
