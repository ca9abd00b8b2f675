//! ポストノードからの抽出
//!
//! 各フィールドは独立したフォールバックで取得する。
//! パーマリンクが取れないノードだけを無効として捨てる。

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;
use url::Url;

use crate::error::ScraperError;
use crate::merge::dedupe_batch;
use crate::traits::{FieldValue, PageAdapter, PostField};
use crate::types::Post;

/// プレースホルダー画像の判定
const PLACEHOLDER_MARKER: &str = "placeholder";

/// 描画中のポストをすべて抽出（無効ノードを除外し、バッチ内で重複排除）
pub async fn scrape_posts<P: PageAdapter>(page: &P) -> Vec<Post> {
    let nodes = match page.find_post_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            debug!("Failed to query post nodes: {}", e);
            return Vec::new();
        }
    };

    let mut posts = Vec::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        match extract_post(page, node).await {
            Ok(post) => posts.push(post),
            Err(e) => debug!("Skipping post node {}: {}", index, e),
        }
    }

    dedupe_batch(posts)
}

/// 1ノードから Post を抽出
pub async fn extract_post<P: PageAdapter>(page: &P, node: &P::Node) -> Result<Post, ScraperError> {
    let url = page
        .extract_field(node, PostField::Permalink)
        .await?
        .and_then(FieldValue::into_text)
        .map(|href| canonical_permalink(&href))
        .ok_or_else(|| ScraperError::Extraction("パーマリンクがありません".into()))?;

    let username = optional_text(page, node, PostField::ProfileLink)
        .await
        .and_then(|href| username_from_profile_link(&href))
        .or_else(|| username_from_permalink(&url))
        .unwrap_or_default();

    let display_name = optional_text(page, node, PostField::DisplayName)
        .await
        .unwrap_or_else(|| username.clone());

    let avatar = optional_text(page, node, PostField::Avatar).await;

    let content = optional_field(page, node, PostField::Content)
        .await
        .map(|value| match value {
            FieldValue::Text(text) => text,
            FieldValue::List(parts) => parts.join(""),
        })
        .unwrap_or_default();

    let media = optional_field(page, node, PostField::Media)
        .await
        .map(|value| clean_media(value.into_list()))
        .unwrap_or_default();

    let timestamp = optional_text(page, node, PostField::Timestamp)
        .await
        .filter(|ts| DateTime::parse_from_rfc3339(ts).is_ok());

    Ok(Post {
        url,
        username,
        display_name,
        avatar,
        content,
        media,
        timestamp,
        scraped_at: now_iso(),
    })
}

/// 現在時刻 (ISO-8601, ミリ秒, UTC)
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn optional_field<P: PageAdapter>(
    page: &P,
    node: &P::Node,
    field: PostField,
) -> Option<FieldValue> {
    match page.extract_field(node, field).await {
        Ok(value) => value,
        Err(e) => {
            debug!("Field {:?} extraction failed, using default: {}", field, e);
            None
        }
    }
}

async fn optional_text<P: PageAdapter>(
    page: &P,
    node: &P::Node,
    field: PostField,
) -> Option<String> {
    optional_field(page, node, field)
        .await
        .and_then(FieldValue::into_text)
}

/// クエリとフラグメントを落としたパーマリンク
fn canonical_permalink(href: &str) -> String {
    match Url::parse(href) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => href.to_string(),
    }
}

/// プロフィールリンクの最後のパス要素
fn username_from_profile_link(href: &str) -> Option<String> {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// `/{user}/status/{id}` 形式のパーマリンクからユーザー名
fn username_from_permalink(permalink: &str) -> Option<String> {
    let url = Url::parse(permalink).ok()?;
    let mut segments = url.path_segments()?;
    let user = segments.next().filter(|s| !s.is_empty())?;
    (segments.next() == Some("status")).then(|| user.to_string())
}

fn clean_media(sources: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty() && !src.contains(PLACEHOLDER_MARKER))
        .filter(|src| seen.insert(src.clone()))
        .collect()
}
