use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use launchpad_common::Recipe;
use lru::LruCache;
use redb::{Database, ReadableTable, TableDefinition};

use crate::RecipeStore;

const RECIPES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("recipes");

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Embedded, single-file key-value store for [`Recipe`]s.
///
/// Opened once at process start and shared behind an `Arc`. Reads go through
/// a bounded in-process LRU so repeated `GET /recipes` polling does not
/// re-parse JSON on every call; writes go straight to the backend and
/// invalidate the corresponding cache entry.
pub struct RedbRecipeStore {
    db: Arc<Database>,
    cache: Arc<StdMutex<LruCache<String, Recipe>>>,
}

impl RedbRecipeStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)?;
        {
            let txn = db.begin_write()?;
            txn.open_table(RECIPES_TABLE)?;
            txn.commit()?;
        }
        Ok(Self {
            db: Arc::new(db),
            cache: Arc::new(StdMutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap(),
            ))),
        })
    }

}

#[async_trait]
impl RecipeStore for RedbRecipeStore {
    async fn save(&self, recipe: Recipe) -> anyhow::Result<()> {
        let json = serde_json::to_string(&recipe)?;
        let db = self.db.clone();
        let id = recipe.id.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(RECIPES_TABLE)?;
                table.insert(id.as_str(), json.as_str())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await??;
        self.cache.lock().unwrap().put(recipe.id.clone(), recipe);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Recipe>> {
        let this_db = self.db.clone();
        let cache = self.cache.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Recipe>> {
            if let Some(hit) = cache.lock().unwrap().get(&id) {
                return Ok(Some(hit.clone()));
            }
            let txn = this_db.begin_read()?;
            let table = txn.open_table(RECIPES_TABLE)?;
            let Some(raw) = table.get(id.as_str())? else {
                return Ok(None);
            };
            let recipe: Recipe = serde_json::from_str(raw.value())?;
            cache.lock().unwrap().put(id, recipe.clone());
            Ok(Some(recipe))
        })
        .await?
    }

    async fn list(&self) -> anyhow::Result<Vec<Recipe>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Recipe>> {
            let txn = db.begin_read()?;
            let table = txn.open_table(RECIPES_TABLE)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, raw) = entry?;
                out.push(serde_json::from_str(raw.value())?);
            }
            Ok(out)
        })
        .await?
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let db = self.db.clone();
        let key = id.to_string();
        let existed = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let txn = db.begin_write()?;
            let existed = {
                let mut table = txn.open_table(RECIPES_TABLE)?;
                let removed = table.remove(key.as_str())?.is_some();
                removed
            };
            txn.commit()?;
            Ok(existed)
        })
        .await??;
        self.cache.lock().unwrap().pop(id);
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_common::Backend;
    use std::collections::HashMap;

    fn recipe(id: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            backend: Backend::Vllm,
            model_path: "/models/x".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            tensor_parallel_size: 1,
            pipeline_parallel_size: 1,
            max_model_len: None,
            gpu_memory_utilization: None,
            max_num_seqs: None,
            kv_cache_dtype: Default::default(),
            dtype: None,
            quantization: None,
            trust_remote_code: false,
            tool_call_parser: None,
            reasoning_parser: None,
            served_model_name: None,
            python_path: None,
            extra_args: HashMap::new(),
            env_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.redb");
        {
            let store = RedbRecipeStore::open(&path).unwrap();
            store.save(recipe("a")).await.unwrap();
        }
        let store = RedbRecipeStore::open(&path).unwrap();
        let got = store.get("a").await.unwrap();
        assert_eq!(got.unwrap().id, "a");
    }

    #[tokio::test]
    async fn delete_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbRecipeStore::open(dir.path().join("recipes.redb")).unwrap();
        store.save(recipe("a")).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_all_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbRecipeStore::open(dir.path().join("recipes.redb")).unwrap();
        store.save(recipe("a")).await.unwrap();
        store.save(recipe("b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
