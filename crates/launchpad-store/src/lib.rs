pub mod memory;
pub mod redb_backend;

use async_trait::async_trait;
use launchpad_common::Recipe;

/// Durable key-value store of [`Recipe`]s. Validation at the boundary is
/// syntactic; callers are responsible for calling `recipe.validate()` before
/// `save`.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn save(&self, recipe: Recipe) -> anyhow::Result<()>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<Recipe>>;
    async fn list(&self) -> anyhow::Result<Vec<Recipe>>;
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}

pub use memory::MemoryRecipeStore;
pub use redb_backend::RedbRecipeStore;
