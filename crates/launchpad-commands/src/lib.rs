mod auto_detect;
mod extras;
mod llama_cpp;
mod resolve;
mod sdcpp;
mod sglang;
mod vllm;

use std::collections::HashMap;

use launchpad_common::{Backend, Recipe};

pub use resolve::{resolve_binary, resolve_cuda_visible_devices, resolve_python};

/// The argv + environment produced for a backend, ready to hand to the
/// process manager for spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Configuration knobs not carried on the recipe itself: binary search
/// overrides and the CUDA device mask to apply.
///
/// `runtime_bin_override` is `VLLM_STUDIO_RUNTIME_BIN`, an alternative search
/// root consulted ahead of `PATH`. `llama_server_path` and `sd_cli_path` are
/// direct binary overrides (`LLAMA_SERVER_PATH`, `SD_CLI_PATH`) rather than
/// search directories, and win outright when set.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub runtime_bin_override: Option<String>,
    pub cuda_visible_devices: Option<String>,
    pub llama_server_path: Option<String>,
    pub sd_cli_path: Option<String>,
}

/// Assemble the argv + environment for `recipe`. Pure: no filesystem or
/// process access beyond the binary-resolution search performed inside.
pub fn build_command(recipe: &Recipe, ctx: &BuildContext) -> BuiltCommand {
    match recipe.backend {
        Backend::Vllm => vllm::build(recipe, ctx),
        Backend::Sglang => sglang::build(recipe, ctx),
        Backend::LlamaCpp => llama_cpp::build(recipe, ctx),
        Backend::Sdcpp => sdcpp::build(recipe, ctx),
    }
}

pub use auto_detect::{auto_reasoning_parser, auto_tool_call_parser};
