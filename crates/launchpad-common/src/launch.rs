use serde::{Deserialize, Serialize};

/// A stage in a launch attempt's lifetime. `Ready`, `Error`, and `Cancelled`
/// are terminal; a well-formed attempt emits exactly one of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStage {
    Preempting,
    Evicting,
    Launching,
    Waiting,
    Ready,
    Cancelled,
    Error,
}

impl LaunchStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchStage::Ready | LaunchStage::Cancelled | LaunchStage::Error)
    }
}

/// Progress event published on the `launch_progress` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchProgress {
    pub recipe_id: String,
    pub stage: LaunchStage,
    pub message: String,
    pub progress: f32,
}

impl LaunchProgress {
    pub fn new(recipe_id: impl Into<String>, stage: LaunchStage, message: impl Into<String>, progress: f32) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            stage,
            message: message.into(),
            progress,
        }
    }
}
