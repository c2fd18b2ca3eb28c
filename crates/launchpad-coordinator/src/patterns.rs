use launchpad_common::Backend;

const VLLM_FATAL_PATTERNS: &[&str] = &[
    "raise ValueError",
    "raise RuntimeError",
    "CUDA out of memory",
    "OutOfMemoryError",
    "torch.OutOfMemoryError",
    "not enough memory",
    "Cannot allocate",
    "larger than the available KV cache memory",
    "EngineCore failed to start",
];

const LLAMA_CPP_FATAL_PATTERNS: &[&str] = &[
    "failed to load model",
    "error loading model",
    "GGML_ASSERT",
    "ggml_cuda_error",
    "not enough VRAM",
    "failed to allocate",
    "model file not found",
    "invalid model file",
];

fn patterns_for(backend: Backend) -> &'static [&'static str] {
    match backend {
        Backend::Vllm | Backend::Sglang => VLLM_FATAL_PATTERNS,
        Backend::LlamaCpp => LLAMA_CPP_FATAL_PATTERNS,
        Backend::Sdcpp => LLAMA_CPP_FATAL_PATTERNS,
    }
}

/// Scan `log_tail` for the first fatal pattern matching `backend`, returning
/// a short window around the match. `None` if no fatal pattern is present.
pub fn scan_fatal(backend: Backend, log_tail: &str) -> Option<String> {
    for pattern in patterns_for(backend) {
        if let Some(idx) = log_tail.find(pattern) {
            let start = idx.saturating_sub(40);
            let end = (idx + pattern.len() + 200).min(log_tail.len());
            // find() / saturating_sub operate on byte offsets; clamp to char
            // boundaries so the slice below never panics on multi-byte UTF-8.
            let start = floor_char_boundary(log_tail, start);
            let end = ceil_char_boundary(log_tail, end);
            return Some(log_tail[start..end].trim().to_string());
        }
    }
    None
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
