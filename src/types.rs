//! 収集データと状態の型定義

use serde::{Deserialize, Serialize};

/// 収集したポスト
///
/// `url` が同一性キー。コレクション内で重複しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// パーマリンク（同一性キー）
    pub url: String,
    pub username: String,
    /// 表示名（取得できない場合は username）
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Vec<String>,
    /// 投稿日時 (ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// 抽出日時 (ISO-8601)。マージで上書きされない
    pub scraped_at: String,
}

/// 読み込み状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Paused,
    Completed,
}

impl LoadingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingState::Idle => "idle",
            LoadingState::Loading => "loading",
            LoadingState::Paused => "paused",
            LoadingState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for LoadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 進捗スナップショット（毎サイクル再計算、永続化しない）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub posts_loaded: usize,
    /// 0〜100
    pub progress: f64,
    /// 0 は件数不明
    pub total_expected: u64,
}

/// 永続化される設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    /// false の場合はスクロールせず1回だけ収集して完了
    pub auto_scroll: bool,
    /// サイクル間の待機（ミリ秒）
    pub scroll_delay: u64,
    /// 新規ポストなしサイクルの連続上限
    pub max_consecutive_no_new_posts: u32,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            auto_scroll: true,
            scroll_delay: 1500,
            max_consecutive_no_new_posts: 5,
        }
    }
}

/// ストレージに保存される状態全体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub posts: Vec<Post>,
    pub loading_state: LoadingState,
    pub settings: LoaderSettings,
}

/// コントローラーが発行するイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoaderEvent {
    #[serde(rename_all = "camelCase")]
    LoadingStarted { total_posts: usize },
    #[serde(rename_all = "camelCase")]
    LoadingResumed { total_posts: usize },
    ProgressUpdate(ProgressSnapshot),
    #[serde(rename_all = "camelCase")]
    LoadingStopped { total_posts: usize },
    #[serde(rename_all = "camelCase")]
    LoadingComplete { total_posts: usize },
}
