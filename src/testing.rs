//! テスト用のフェイク実装

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::traits::{FieldValue, PageAdapter, PostField, ScrollMetrics, StateStore};
use crate::types::{LoaderSettings, LoadingState, PersistedState, Post};

const VIEWPORT_HEIGHT: f64 = 800.0;
const INITIAL_HEIGHT: f64 = 2000.0;
const GROWTH_PER_SCROLL: f64 = 1000.0;

/// 描画済みポストノードの代わり
#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    fields: HashMap<PostField, FieldValue>,
    failing: HashSet<PostField>,
}

impl FakeNode {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 全フィールドが揃ったノード
    pub fn post(id: u32) -> Self {
        Self::empty()
            .with(
                PostField::Permalink,
                FieldValue::Text(format!("https://x.com/user{id}/status/{id}")),
            )
            .with(
                PostField::ProfileLink,
                FieldValue::Text(format!("https://x.com/user{id}")),
            )
            .with(PostField::DisplayName, FieldValue::Text(format!("User {id}")))
            .with(
                PostField::Avatar,
                FieldValue::Text(format!("https://pbs.twimg.com/profile_images/{id}.jpg")),
            )
            .with(PostField::Content, FieldValue::Text(format!("post body {id}")))
            .with(
                PostField::Media,
                FieldValue::List(vec![format!("https://pbs.twimg.com/media/{id}.jpg")]),
            )
            .with(
                PostField::Timestamp,
                FieldValue::Text("2024-03-01T12:00:00.000Z".into()),
            )
    }

    pub fn with(mut self, field: PostField, value: FieldValue) -> Self {
        self.fields.insert(field, value);
        self
    }

    pub fn without(mut self, field: PostField) -> Self {
        self.fields.remove(&field);
        self
    }

    /// 取得時にエラーを返すフィールド
    pub fn failing(mut self, field: PostField) -> Self {
        self.failing.insert(field);
        self
    }
}

/// `FakeNode::post` を `range` の id 分並べる
pub fn posts(range: std::ops::Range<u32>) -> Vec<FakeNode> {
    range.map(FakeNode::post).collect()
}

/// 1サイクル分の描画内容
#[derive(Debug, Clone, Default)]
pub struct FakeCycle {
    nodes: Vec<FakeNode>,
    growth_steps: u32,
}

impl FakeCycle {
    pub fn new(nodes: Vec<FakeNode>) -> Self {
        Self {
            nodes,
            growth_steps: 0,
        }
    }

    /// このサイクルで高さが伸びるスクロール回数
    pub fn growing(mut self, steps: u32) -> Self {
        self.growth_steps = steps;
        self
    }
}

#[derive(Debug)]
struct FakeState {
    cycles: Vec<FakeCycle>,
    cursor: usize,
    remaining_growth: u32,
    metrics: ScrollMetrics,
    scroll_calls: usize,
}

/// スクリプト通りに DOM を返す PageAdapter
///
/// `find_post_nodes` の呼び出しごとに次のサイクルへ進む。
/// スクリプトを使い切った後は空で伸びないページになる。
#[derive(Debug)]
pub struct FakePage {
    state: Mutex<FakeState>,
    count_label: Option<String>,
    broken_scroll: bool,
}

impl FakePage {
    pub fn new(cycles: Vec<FakeCycle>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                cycles,
                cursor: 0,
                remaining_growth: 0,
                metrics: ScrollMetrics {
                    scroll_height: INITIAL_HEIGHT,
                    scroll_top: 0.0,
                    viewport_height: VIEWPORT_HEIGHT,
                },
                scroll_calls: 0,
            }),
            count_label: None,
            broken_scroll: false,
        }
    }

    pub fn with_count_label(mut self, label: impl Into<String>) -> Self {
        self.count_label = Some(label.into());
        self
    }

    pub fn with_broken_scroll(mut self) -> Self {
        self.broken_scroll = true;
        self
    }

    /// 次のサイクルへ進み、そのノードを返す
    pub fn begin_cycle(&self) -> Vec<FakeNode> {
        let mut state = self.state.lock().unwrap();
        let cycle = state.cycles.get(state.cursor).cloned().unwrap_or_default();
        state.cursor += 1;
        state.remaining_growth = cycle.growth_steps;
        cycle.nodes
    }

    pub fn scroll_calls(&self) -> usize {
        self.state.lock().unwrap().scroll_calls
    }

    pub fn cycles_rendered(&self) -> usize {
        self.state.lock().unwrap().cursor
    }
}

#[async_trait]
impl PageAdapter for FakePage {
    type Node = FakeNode;

    async fn find_post_nodes(&self) -> Result<Vec<FakeNode>, ScraperError> {
        Ok(self.begin_cycle())
    }

    async fn extract_field(
        &self,
        node: &FakeNode,
        field: PostField,
    ) -> Result<Option<FieldValue>, ScraperError> {
        if node.failing.contains(&field) {
            return Err(ScraperError::JavaScript(format!("{:?} lookup failed", field)));
        }
        Ok(node.fields.get(&field).cloned())
    }

    async fn current_scroll_metrics(&self) -> Result<ScrollMetrics, ScraperError> {
        Ok(self.state.lock().unwrap().metrics)
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        if self.broken_scroll {
            return Err(ScraperError::JavaScript("scroll failed".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.scroll_calls += 1;
        state.metrics.scroll_top = state.metrics.scroll_height - state.metrics.viewport_height;
        // 最下部に着いてから次の分が読み込まれる
        if state.remaining_growth > 0 {
            state.remaining_growth -= 1;
            state.metrics.scroll_height += GROWTH_PER_SCROLL;
        }
        Ok(())
    }

    async fn find_expected_count_label(&self) -> Result<Option<String>, ScraperError> {
        Ok(self.count_label.clone())
    }
}

/// 書き込みが常に失敗するストア
#[derive(Debug, Default)]
pub struct FailingStore {
    pub initial: PersistedState,
    pub write_attempts: Mutex<usize>,
    pub unavailable: AtomicBool,
}

impl FailingStore {
    pub fn attempts(&self) -> usize {
        *self.write_attempts.lock().unwrap()
    }

    fn fail(&self) -> Result<(), ScraperError> {
        *self.write_attempts.lock().unwrap() += 1;
        Err(ScraperError::Storage("disk full".into()))
    }
}

#[async_trait]
impl StateStore for FailingStore {
    async fn load(&self) -> Result<PersistedState, ScraperError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScraperError::Storage("unavailable".into()));
        }
        Ok(self.initial.clone())
    }

    async fn save_posts(&self, _posts: &[Post]) -> Result<(), ScraperError> {
        self.fail()
    }

    async fn save_loading_state(&self, _state: LoadingState) -> Result<(), ScraperError> {
        self.fail()
    }

    async fn save_settings(&self, _settings: &LoaderSettings) -> Result<(), ScraperError> {
        self.fail()
    }
}
