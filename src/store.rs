//! 状態の永続化
//!
//! - `JsonFileStore`: JSON ファイル（一時ファイル経由で置き換え）
//! - `MemoryStore`: プロセス内のみ

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::archive::migrate_state;
use crate::error::ScraperError;
use crate::traits::StateStore;
use crate::types::{LoaderSettings, LoadingState, PersistedState, Post};

/// JSON ファイルに状態を保存するストア
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // 最後に書き込んだ内容。部分更新をファイル全体に反映するために保持する
    cache: AsyncMutex<PersistedState>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: AsyncMutex::new(PersistedState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, state: &PersistedState) -> Result<(), ScraperError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(
            "Saved state to {:?} ({} posts, {})",
            self.path,
            state.posts.len(),
            state.loading_state
        );
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> Result<(), ScraperError>
    where
        F: FnOnce(&mut PersistedState) + Send,
    {
        let mut cache = self.cache.lock().await;
        let mut next = cache.clone();
        apply(&mut next);
        self.write(&next).await?;
        *cache = next;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState, ScraperError> {
        let state = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => migrate_state(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No saved state at {:?}, starting empty", self.path);
                PersistedState::default()
            }
            Err(e) => return Err(e.into()),
        };

        *self.cache.lock().await = state.clone();
        Ok(state)
    }

    async fn save_posts(&self, posts: &[Post]) -> Result<(), ScraperError> {
        let posts = posts.to_vec();
        self.update(move |state| state.posts = posts).await
    }

    async fn save_loading_state(&self, loading_state: LoadingState) -> Result<(), ScraperError> {
        self.update(move |state| state.loading_state = loading_state)
            .await
    }

    async fn save_settings(&self, settings: &LoaderSettings) -> Result<(), ScraperError> {
        let settings = settings.clone();
        self.update(move |state| state.settings = settings).await
    }
}

/// メモリ上のストア
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new(initial: PersistedState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    /// 現在の保存内容
    pub fn snapshot(&self) -> PersistedState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn with_state<F>(&self, apply: F) -> Result<(), ScraperError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut state = self
            .state
            .lock()
            .map_err(|e| ScraperError::Storage(e.to_string()))?;
        apply(&mut state);
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PersistedState, ScraperError> {
        self.state
            .lock()
            .map(|state| state.clone())
            .map_err(|e| ScraperError::Storage(e.to_string()))
    }

    async fn save_posts(&self, posts: &[Post]) -> Result<(), ScraperError> {
        self.with_state(|state| state.posts = posts.to_vec())
    }

    async fn save_loading_state(&self, loading_state: LoadingState) -> Result<(), ScraperError> {
        self.with_state(|state| state.loading_state = loading_state)
    }

    async fn save_settings(&self, settings: &LoaderSettings) -> Result<(), ScraperError> {
        self.with_state(|state| state.settings = settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(url: &str) -> Post {
        Post {
            url: url.into(),
            username: "alice".into(),
            display_name: "Alice".into(),
            avatar: None,
            content: String::new(),
            media: vec![],
            timestamp: None,
            scraped_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let state = store.load().await.unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[tokio::test]
    async fn test_json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = JsonFileStore::new(&path);
        store.load().await.unwrap();
        store.save_posts(&[post("a"), post("b")]).await.unwrap();
        store.save_loading_state(LoadingState::Completed).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let state = reopened.load().await.unwrap();
        assert_eq!(state.posts.len(), 2);
        assert_eq!(state.loading_state, LoadingState::Completed);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["loadingState"], "completed");
        assert_eq!(raw["posts"][1]["url"], "b");
    }

    #[tokio::test]
    async fn test_json_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::default();
        store.save_posts(&[post("a")]).await.unwrap();
        store.save_loading_state(LoadingState::Paused).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.posts.len(), 1);
        assert_eq!(snapshot.loading_state, LoadingState::Paused);
    }
}
