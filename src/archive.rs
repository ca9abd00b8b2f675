//! エクスポート / インポートと保存データの移行

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::extractor::now_iso;
use crate::merge::merge_into;
use crate::types::{LoaderSettings, LoadingState, PersistedState, Post};

/// エクスポート形式のバージョン
pub const EXPORT_VERSION: &str = "1.0.0";

/// エクスポートデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub export_date: String,
    pub posts: Vec<Post>,
    pub settings: LoaderSettings,
}

/// 古い形式や欠けたフィールドを許容するポスト
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredPost {
    url: Option<String>,
    username: Option<String>,
    display_name: Option<String>,
    avatar: Option<String>,
    content: Option<String>,
    media: Option<Vec<String>>,
    timestamp: Option<String>,
    scraped_at: Option<String>,
}

impl StoredPost {
    fn into_post(self) -> Option<Post> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let display_name = self
            .display_name
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| username.clone());

        Some(Post {
            url,
            username,
            display_name,
            avatar: self.avatar.filter(|a| !a.is_empty()),
            content: self.content.unwrap_or_default(),
            media: self.media.unwrap_or_default(),
            timestamp: self.timestamp.filter(|t| !t.is_empty()),
            scraped_at: self.scraped_at.unwrap_or_else(now_iso),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredState {
    posts: Vec<Value>,
    loading_state: LoadingState,
    settings: LoaderSettings,
}

/// JSON 配列をポスト列に変換（URL のない要素と重複は除外）
fn posts_from_values(values: Vec<Value>) -> Vec<Post> {
    let total = values.len();
    let mut posts = Vec::with_capacity(total);
    let parsed = values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<StoredPost>(value).ok())
        .filter_map(StoredPost::into_post)
        .collect();
    merge_into(&mut posts, parsed);

    if posts.len() < total {
        warn!("Dropped {} invalid or duplicate posts", total - posts.len());
    }
    posts
}

/// 保存済み状態を読み込み、現在の形式に揃える
pub fn migrate_state(raw: &str) -> Result<PersistedState, ScraperError> {
    let stored: StoredState = serde_json::from_str(raw)?;

    Ok(PersistedState {
        posts: posts_from_values(stored.posts),
        loading_state: stored.loading_state,
        settings: stored.settings,
    })
}

/// 状態をエクスポート形式に包む
pub fn export(state: &PersistedState) -> ExportData {
    ExportData {
        version: EXPORT_VERSION.to_string(),
        export_date: Utc::now().to_rfc3339(),
        posts: state.posts.clone(),
        settings: state.settings.clone(),
    }
}

/// インポートデータを既存の状態にマージ（既存レコード優先）
///
/// `posts` 配列がなければ何も変更せずにエラー。戻り値は追加件数。
pub fn import(state: &mut PersistedState, data: Value) -> Result<usize, ScraperError> {
    let Value::Object(mut object) = data else {
        return Err(ScraperError::InvalidImport("オブジェクトではありません".into()));
    };

    let posts = match object.remove("posts") {
        Some(Value::Array(items)) => posts_from_values(items),
        Some(_) => return Err(ScraperError::InvalidImport("posts が配列ではありません".into())),
        None => return Err(ScraperError::InvalidImport("posts がありません".into())),
    };

    let settings = match object.remove("settings") {
        Some(Value::Null) | None => None,
        Some(value) => Some(
            serde_json::from_value::<LoaderSettings>(value)
                .map_err(|e| ScraperError::InvalidImport(format!("settings: {}", e)))?,
        ),
    };

    let added = merge_into(&mut state.posts, posts);
    if let Some(settings) = settings {
        state.settings = settings;
    }

    info!("Imported {} new posts, {} total", added, state.posts.len());
    Ok(added)
}
