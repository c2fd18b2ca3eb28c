use serde::{Deserialize, Serialize};

use crate::recipe::Backend;

/// A snapshot of a live process discovered by scanning the host process
/// table, produced by parsing the argv of a process bound to a known port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub backend: Backend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_model_name: Option<String>,
    pub port: u16,
    pub command: String,
    pub args: Vec<String>,
}

impl ProcessInfo {
    /// The equivalence used to decide whether a re-launch of `recipe` against
    /// this incumbent process is a no-op. See launch coordinator design notes.
    pub fn serves_same_model(&self, backend: Backend, model_path: &str, served_model_name: Option<&str>) -> bool {
        if backend == Backend::Sdcpp && self.backend == Backend::Sdcpp {
            return true;
        }
        if backend != self.backend {
            return false;
        }
        if let (Some(a), Some(b)) = (self.served_model_name.as_deref(), served_model_name) {
            if a == b {
                return true;
            }
        }
        let norm = |p: &str| p.trim_end_matches('/').to_string();
        if norm(&self.model_path.clone().unwrap_or_default()) == norm(model_path) {
            return true;
        }
        let tail = |p: &str| p.trim_end_matches('/').rsplit('/').next().unwrap_or(p).to_string();
        tail(&self.model_path.clone().unwrap_or_default()) == tail(model_path)
    }
}
