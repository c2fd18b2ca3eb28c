use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use launchpad_common::Recipe;
use tokio::sync::RwLock;

use crate::RecipeStore;

/// In-process store backing unit and integration tests without touching disk.
#[derive(Clone, Default)]
pub struct MemoryRecipeStore {
    inner: Arc<RwLock<BTreeMap<String, Recipe>>>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn save(&self, recipe: Recipe) -> anyhow::Result<()> {
        self.inner.write().await.insert(recipe.id.clone(), recipe);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Recipe>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Recipe>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.inner.write().await.remove(id).is_some())
    }
}
