pub mod error;
pub mod launch;
pub mod process_info;
pub mod recipe;
pub mod telemetry;

pub use error::AppError;
pub use launch::{LaunchProgress, LaunchStage};
pub use process_info::ProcessInfo;
pub use recipe::{Backend, KvCacheDtype, Recipe, RecipeStatus, StoredRecipe};
