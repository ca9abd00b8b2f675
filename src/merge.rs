//! URL キーによる重複排除とマージ
//!
//! 先に保存されたレコードが常に優先される。

use std::collections::HashSet;

use tracing::debug;

use crate::types::Post;

/// マージ結果
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub posts: Vec<Post>,
    /// 実際に追加された件数
    pub added: usize,
}

/// `existing` の末尾に未知の `incoming` を出現順で追加
pub fn merge(existing: &[Post], incoming: Vec<Post>) -> MergeOutcome {
    let mut posts = existing.to_vec();
    let added = merge_into(&mut posts, incoming);
    MergeOutcome { posts, added }
}

/// `posts` をその場で拡張し、追加件数を返す
pub fn merge_into(posts: &mut Vec<Post>, incoming: Vec<Post>) -> usize {
    let mut seen: HashSet<String> = posts.iter().map(|p| p.url.clone()).collect();
    let before = posts.len();

    for post in dedupe_batch(incoming) {
        if seen.insert(post.url.clone()) {
            posts.push(post);
        }
    }

    let added = posts.len() - before;
    debug!("Merged posts: {} new, {} total", added, posts.len());
    added
}

/// バッチ内の重複と空 URL を除去（最初の出現を残す）
pub fn dedupe_batch(batch: Vec<Post>) -> Vec<Post> {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .filter(|post| !post.url.is_empty() && seen.insert(post.url.clone()))
        .collect()
}
