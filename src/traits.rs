use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ScraperError;
use crate::types::{LoaderSettings, LoadingState, PersistedState, Post};

/// ポストノードから取り出すフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostField {
    /// `time` 要素を囲むリンクの href
    Permalink,
    /// 投稿者プロフィールリンクの href
    ProfileLink,
    DisplayName,
    Avatar,
    Content,
    /// 添付画像の src 一覧
    Media,
    /// `time` 要素の datetime 属性
    Timestamp,
}

/// フィールドの生の値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// 空白を除いた文字列。空なら None
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            FieldValue::Text(text) => text,
            FieldValue::List(items) => items.into_iter().next()?,
        };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            FieldValue::Text(text) => vec![text],
            FieldValue::List(items) => items,
        }
    }
}

/// スクロール位置とドキュメントの高さ
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub viewport_height: f64,
}

/// 収集ループが依存するページ操作
///
/// DOM へのアクセスはすべてこのトレイト経由で行う。
#[async_trait]
pub trait PageAdapter: Send + Sync {
    type Node: Send + Sync;

    /// 現在描画されているポストノード
    async fn find_post_nodes(&self) -> Result<Vec<Self::Node>, ScraperError>;

    /// ノードからフィールドを1つ取り出す。要素がなければ `Ok(None)`
    async fn extract_field(
        &self,
        node: &Self::Node,
        field: PostField,
    ) -> Result<Option<FieldValue>, ScraperError>;

    async fn current_scroll_metrics(&self) -> Result<ScrollMetrics, ScraperError>;

    /// 最下部までスクロール
    async fn scroll_to_bottom(&self) -> Result<(), ScraperError>;

    /// いいね件数ラベルのテキスト
    async fn find_expected_count_label(&self) -> Result<Option<String>, ScraperError>;
}

/// 状態の永続化
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<PersistedState, ScraperError>;

    async fn save_posts(&self, posts: &[Post]) -> Result<(), ScraperError>;

    async fn save_loading_state(&self, state: LoadingState) -> Result<(), ScraperError>;

    async fn save_settings(&self, settings: &LoaderSettings) -> Result<(), ScraperError>;
}

#[async_trait]
impl<T: PageAdapter + ?Sized> PageAdapter for Arc<T> {
    type Node = T::Node;

    async fn find_post_nodes(&self) -> Result<Vec<Self::Node>, ScraperError> {
        (**self).find_post_nodes().await
    }

    async fn extract_field(
        &self,
        node: &Self::Node,
        field: PostField,
    ) -> Result<Option<FieldValue>, ScraperError> {
        (**self).extract_field(node, field).await
    }

    async fn current_scroll_metrics(&self) -> Result<ScrollMetrics, ScraperError> {
        (**self).current_scroll_metrics().await
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        (**self).scroll_to_bottom().await
    }

    async fn find_expected_count_label(&self) -> Result<Option<String>, ScraperError> {
        (**self).find_expected_count_label().await
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load(&self) -> Result<PersistedState, ScraperError> {
        (**self).load().await
    }

    async fn save_posts(&self, posts: &[Post]) -> Result<(), ScraperError> {
        (**self).save_posts(posts).await
    }

    async fn save_loading_state(&self, state: LoadingState) -> Result<(), ScraperError> {
        (**self).save_loading_state(state).await
    }

    async fn save_settings(&self, settings: &LoaderSettings) -> Result<(), ScraperError> {
        (**self).save_settings(settings).await
    }
}
