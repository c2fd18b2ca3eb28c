use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend a recipe targets. Drives command assembly and fatal-pattern matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Vllm,
    Sglang,
    LlamaCpp,
    Sdcpp,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Vllm => "vllm",
            Backend::Sglang => "sglang",
            Backend::LlamaCpp => "llama_cpp",
            Backend::Sdcpp => "sdcpp",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KvCacheDtype {
    Auto,
    Fp8,
    Fp8E5m2,
    Fp8E4m3,
}

impl Default for KvCacheDtype {
    fn default() -> Self {
        KvCacheDtype::Auto
    }
}

/// A named, durable launch configuration for one of the four backends.
///
/// Validated syntactically on write (`validate`); semantic checks such as
/// "does the model file exist" are deferred to launch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Slug identity, `[a-z0-9-]+`. Immutable after creation.
    pub id: String,
    pub name: String,
    pub backend: Backend,

    pub model_path: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "one")]
    pub tensor_parallel_size: u32,
    #[serde(default = "one")]
    pub pipeline_parallel_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_memory_utilization: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_seqs: Option<u32>,

    #[serde(default)]
    pub kv_cache_dtype: KvCacheDtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,

    #[serde(default)]
    pub trust_remote_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_parser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_parser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_model_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_path: Option<String>,

    #[serde(default)]
    pub extra_args: HashMap<String, Value>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn one() -> u32 {
    1
}

/// Internal `extra_args` keys handled elsewhere in the pipeline and never
/// re-emitted verbatim as a CLI flag.
pub const RESERVED_EXTRA_ARG_KEYS: &[&str] = &[
    "venv_path",
    "env_vars",
    "cuda_visible_devices",
    "description",
    "tags",
    "status",
];

impl Recipe {
    /// Syntactic validation at the store boundary. Semantic checks (model
    /// file presence, binary resolvability) happen at launch time.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(format!("invalid recipe id: {:?}", self.id));
        }
        if self.port == 0 {
            return Err("port must be in 1..65535".to_string());
        }
        if let Some(util) = self.gpu_memory_utilization {
            if !(util > 0.0 && util <= 1.0) {
                return Err("gpu_memory_utilization must be within (0, 1]".to_string());
            }
        }
        if self.tensor_parallel_size == 0 || self.pipeline_parallel_size == 0 {
            return Err("tensor_parallel_size and pipeline_parallel_size must be >= 1".to_string());
        }
        for value in self.extra_args.values() {
            if value.is_null() {
                return Err("extra_args values must not be null".to_string());
            }
        }
        Ok(())
    }
}

/// Runtime status annotation attached to a [`Recipe`] when listed over HTTP.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    Stopped,
    Starting,
    Running,
}

/// A [`Recipe`] annotated with its current [`RecipeStatus`] for `GET /recipes`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub status: RecipeStatus,
}

impl Recipe {
    /// Serialization used by `GET /recipes/:id`: `tensor_parallel_size` and
    /// `pipeline_parallel_size` are rendered as `tp`/`pp` aliases.
    pub fn to_detail_json(&self) -> Value {
        let mut v = serde_json::to_value(self).expect("Recipe always serializes");
        if let Value::Object(map) = &mut v {
            if let Some(tp) = map.remove("tensor_parallel_size") {
                map.insert("tp".to_string(), tp);
            }
            if let Some(pp) = map.remove("pipeline_parallel_size") {
                map.insert("pp".to_string(), pp);
            }
        }
        v
    }
}
