/// Infer vLLM's `--reasoning-parser` value from a lowercased model id
/// substring. Explicit `recipe.reasoning_parser` always overrides this.
///
/// This mapping is intentionally literal and should not be "improved" —
/// tests lock in the exact substrings.
pub fn auto_reasoning_parser(model_id_lower: &str) -> Option<&'static str> {
    if model_id_lower.contains("qwen3") {
        Some("qwen3")
    } else if model_id_lower.contains("glm")
        && (model_id_lower.contains("4.5") || model_id_lower.contains("4.6") || model_id_lower.contains("4.7"))
    {
        Some("glm45")
    } else if model_id_lower.contains("minimax") && model_id_lower.contains("m2") {
        Some("minimax_m2_append_think")
    } else {
        None
    }
}

/// Infer vLLM's `--tool-call-parser` value the same way.
pub fn auto_tool_call_parser(model_id_lower: &str) -> Option<&'static str> {
    if model_id_lower.contains("qwen3") {
        Some("qwen3")
    } else if model_id_lower.contains("glm")
        && (model_id_lower.contains("4.5") || model_id_lower.contains("4.6") || model_id_lower.contains("4.7"))
    {
        Some("glm45")
    } else if model_id_lower.contains("minimax") && model_id_lower.contains("m2") {
        Some("minimax_m2")
    } else {
        None
    }
}

/// MiniMax-M2 at tensor-parallel > 4 benefits from expert parallelism.
pub fn wants_expert_parallel(model_id_lower: &str, tensor_parallel_size: u32) -> bool {
    model_id_lower.contains("minimax") && model_id_lower.contains("m2") && tensor_parallel_size > 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qwen3_maps_to_qwen3_parser() {
        assert_eq!(auto_reasoning_parser("qwen/qwen3-32b"), Some("qwen3"));
        assert_eq!(auto_tool_call_parser("qwen/qwen3-32b"), Some("qwen3"));
    }

    #[test]
    fn glm45_maps_to_glm45_parser() {
        assert_eq!(auto_reasoning_parser("zai/glm-4.5-air"), Some("glm45"));
    }

    #[test]
    fn glm_without_version_tag_has_no_mapping() {
        assert_eq!(auto_reasoning_parser("zai/glm-4"), None);
    }

    #[test]
    fn minimax_m2_has_distinct_reasoning_and_tool_parsers() {
        assert_eq!(auto_reasoning_parser("minimax-m2"), Some("minimax_m2_append_think"));
        assert_eq!(auto_tool_call_parser("minimax-m2"), Some("minimax_m2"));
    }

    #[test]
    fn unknown_model_has_no_mapping() {
        assert_eq!(auto_reasoning_parser("mistral-7b"), None);
    }

    #[test]
    fn expert_parallel_only_above_tp4_for_minimax_m2() {
        assert!(!wants_expert_parallel("minimax-m2", 4));
        assert!(wants_expert_parallel("minimax-m2", 8));
        assert!(!wants_expert_parallel("qwen3-32b", 8));
    }
}
