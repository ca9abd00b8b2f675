//! 収集ループ（コントローラー）
//!
//! 状態は1つのタスクが所有する。コマンドはキューに積まれ、
//! サイクルの区切り（サイクル間の待機中か停止中）でだけ処理される。
//!
//! 1サイクル:
//! 1. 描画中のポストを抽出
//! 2. マージして保存（毎サイクル書き込み）
//! 3. 進捗イベント
//! 4. 停滞カウンターの更新
//! 5. スクロール
//! 6. 終了判定（期待件数到達 → 伸びなし → 新規なし の順）

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::archive::{self, ExportData};
use crate::error::ScraperError;
use crate::estimator::parse_expected_count;
use crate::extractor::scrape_posts;
use crate::merge::merge_into;
use crate::scroll::{ScrollDriver, ScrollOutcome, ScrollTiming};
use crate::service::LoaderService;
use crate::traits::{PageAdapter, StateStore};
use crate::types::{LoaderEvent, LoaderSettings, LoadingState, PersistedState, Post, ProgressSnapshot};

/// 伸びも新規ポストもないスクロールの連続上限
pub const NO_NEW_CONTENT_THRESHOLD: u32 = 5;
/// 件数不明時の進捗: このスクロール回数で 100% 相当
const SYNTHETIC_PROGRESS_SCROLLS: f64 = 50.0;
/// 件数不明時の進捗上限
const SYNTHETIC_PROGRESS_CAP: f64 = 90.0;

const COMMAND_QUEUE_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// コントローラーへのコマンド
#[derive(Debug, Clone)]
pub enum Command {
    Start,
    Stop,
    Resume,
    GetPosts,
    GetState,
    /// 破壊的。実行中なら先に停止する
    Reset,
    Ping,
    Export,
    Import(Value),
}

/// コマンドの応答
#[derive(Debug, Clone)]
pub enum Response {
    Ack,
    Posts(Vec<Post>),
    State(LoadingState),
    Ready,
    Export(ExportData),
    Imported { added: usize, total: usize },
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Result<Response, ScraperError>>,
}

/// 自然終了の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 期待件数に到達
    ReachedExpected,
    /// スクロールしても伸びず新規もない
    NoNewContent,
    /// 新規ポストなしのサイクルが続いた
    Stalled,
    /// 自動スクロール無効のため1回で終了
    SinglePass,
}

/// 1回の実行中だけ使うカウンター
#[derive(Debug, Clone, Default)]
struct RunCounters {
    expected: u64,
    scroll_count: u32,
    stall: u32,
    no_new_content: u32,
}

pub struct Controller<P, S> {
    page: P,
    store: S,
    scroll: ScrollDriver,
    posts: Vec<Post>,
    state: LoadingState,
    settings: LoaderSettings,
    run: RunCounters,
    events: broadcast::Sender<LoaderEvent>,
}

impl<P, S> Controller<P, S>
where
    P: PageAdapter + 'static,
    S: StateStore + 'static,
{
    /// 保存済みの状態を読み込んで作成
    ///
    /// 実行中のまま保存されていた場合（異常終了）は paused として扱う。
    pub async fn new(page: P, store: S) -> Result<Self, ScraperError> {
        let PersistedState {
            posts,
            loading_state,
            settings,
        } = store.load().await?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut controller = Self {
            page,
            store,
            scroll: ScrollDriver::default(),
            posts,
            state: loading_state,
            settings,
            run: RunCounters::default(),
            events,
        };

        if controller.state == LoadingState::Loading {
            info!("Found interrupted run in stored state, marking as paused");
            controller.transition(LoadingState::Paused).await;
        }

        info!(
            "Controller ready: {} stored posts, state={}",
            controller.posts.len(),
            controller.state
        );
        Ok(controller)
    }

    pub fn with_scroll_timing(mut self, timing: ScrollTiming) -> Self {
        self.scroll = ScrollDriver::new(timing);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    /// タスクとして起動し、操作用のサービスを返す
    pub fn spawn(self) -> (LoaderService, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let service = LoaderService::new(tx, self.events.clone());
        let handle = tokio::spawn(self.run(rx));
        (service, handle)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Envelope>) {
        let mut open = true;

        loop {
            if self.state == LoadingState::Loading {
                match self.run_cycle().await {
                    Some(reason) => self.complete(reason).await,
                    None => self.wait_between_cycles(&mut commands, &mut open).await,
                }
                continue;
            }

            if !open {
                break;
            }
            match commands.recv().await {
                Some(envelope) => self.handle(envelope).await,
                None => break,
            }
        }

        debug!("Controller task finished");
    }

    /// サイクル間の待機。待機中に届いたコマンドを処理する
    async fn wait_between_cycles(
        &mut self,
        commands: &mut mpsc::Receiver<Envelope>,
        open: &mut bool,
    ) {
        let deadline = Instant::now() + Duration::from_millis(self.settings.scroll_delay);

        while self.state == LoadingState::Loading {
            if !*open {
                sleep_until(deadline).await;
                return;
            }

            tokio::select! {
                biased;
                envelope = commands.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => {
                        debug!("Command channel closed, finishing current run");
                        *open = false;
                    }
                },
                _ = sleep_until(deadline) => return,
            }
        }
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { command, reply } = envelope;
        debug!("Received command: {:?}", command);

        let result = self.apply(command).await;
        if reply.send(result).is_err() {
            debug!("Command issuer dropped before reply");
        }
    }

    async fn apply(&mut self, command: Command) -> Result<Response, ScraperError> {
        match command {
            Command::Start => {
                self.start().await;
                Ok(Response::Ack)
            }
            Command::Stop => {
                self.stop().await;
                Ok(Response::Ack)
            }
            Command::Resume => {
                self.resume().await?;
                Ok(Response::Ack)
            }
            Command::GetPosts => Ok(Response::Posts(self.posts.clone())),
            Command::GetState => Ok(Response::State(self.state)),
            Command::Reset => {
                self.reset().await;
                Ok(Response::Ack)
            }
            Command::Ping => Ok(Response::Ready),
            Command::Export => Ok(Response::Export(archive::export(&self.snapshot()))),
            Command::Import(data) => self.import(data).await,
        }
    }

    async fn start(&mut self) {
        if self.state == LoadingState::Loading {
            debug!("Start ignored: already loading");
            return;
        }

        self.run = RunCounters::default();
        self.transition(LoadingState::Loading).await;
        self.run.expected = self.read_expected_count().await;

        info!("Starting to load liked posts... (expected: {})", self.run.expected);
        self.emit(LoaderEvent::LoadingStarted {
            total_posts: self.posts.len(),
        });
    }

    async fn stop(&mut self) {
        if self.state != LoadingState::Loading {
            debug!("Stop ignored: state is {}", self.state);
            return;
        }

        self.transition(LoadingState::Paused).await;
        info!("Loading stopped at {} posts", self.posts.len());
        self.emit(LoaderEvent::LoadingStopped {
            total_posts: self.posts.len(),
        });
    }

    async fn resume(&mut self) -> Result<(), ScraperError> {
        match self.state {
            LoadingState::Loading => {
                debug!("Resume ignored: already loading");
                return Ok(());
            }
            LoadingState::Paused => {}
            other => {
                return Err(ScraperError::InvalidState(format!(
                    "paused ではありません (現在: {})",
                    other
                )))
            }
        }

        self.run.stall = 0;
        self.run.no_new_content = 0;
        self.transition(LoadingState::Loading).await;
        self.run.expected = self.read_expected_count().await;

        info!("Resuming loading... ({} posts so far)", self.posts.len());
        self.emit(LoaderEvent::LoadingResumed {
            total_posts: self.posts.len(),
        });
        Ok(())
    }

    async fn reset(&mut self) {
        if self.state == LoadingState::Loading {
            info!("Reset requested while loading, stopping first");
            self.stop().await;
        }

        self.posts.clear();
        self.run = RunCounters::default();
        self.persist_posts().await;
        self.transition(LoadingState::Idle).await;
        info!("Collected posts reset");
    }

    async fn import(&mut self, data: Value) -> Result<Response, ScraperError> {
        let mut state = PersistedState {
            posts: std::mem::take(&mut self.posts),
            loading_state: self.state,
            settings: self.settings.clone(),
        };
        let result = archive::import(&mut state, data);
        self.posts = state.posts;
        self.settings = state.settings;
        let added = result?;

        self.persist_posts().await;
        if let Err(e) = self.store.save_settings(&self.settings).await {
            warn!("Failed to save settings: {}", e);
        }

        Ok(Response::Imported {
            added,
            total: self.posts.len(),
        })
    }

    /// 1サイクル実行。終了すべきなら理由を返す
    async fn run_cycle(&mut self) -> Option<StopReason> {
        let batch = scrape_posts(&self.page).await;
        let scraped = batch.len();
        let added = merge_into(&mut self.posts, batch);
        info!(
            "Scraped {} posts, added {} new. Total: {}",
            scraped,
            added,
            self.posts.len()
        );

        self.persist_posts().await;
        self.emit(LoaderEvent::ProgressUpdate(self.progress()));

        if added == 0 {
            self.run.stall += 1;
            debug!("No new posts found. Consecutive count: {}", self.run.stall);
        } else {
            self.run.stall = 0;
            self.run.no_new_content = 0;
        }

        if !self.settings.auto_scroll {
            return Some(if self.reached_expected() {
                StopReason::ReachedExpected
            } else {
                StopReason::SinglePass
            });
        }

        let outcome = match self.scroll.scroll_step(&self.page).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Scroll step failed: {}", e);
                ScrollOutcome::stalled(0.0)
            }
        };
        self.run.scroll_count += 1;

        if outcome.new_content_loaded {
            self.run.no_new_content = 0;
        } else if added == 0 {
            self.run.no_new_content += 1;
            debug!(
                "No growth and no new posts. Count: {} (at bottom: {})",
                self.run.no_new_content, outcome.reached_bottom
            );
        }

        self.check_termination()
    }

    fn check_termination(&self) -> Option<StopReason> {
        if self.reached_expected() {
            info!(
                "Reached expected total: {}/{}",
                self.posts.len(),
                self.run.expected
            );
            return Some(StopReason::ReachedExpected);
        }
        if self.run.no_new_content >= NO_NEW_CONTENT_THRESHOLD {
            info!("No new content after {} scrolls", self.run.no_new_content);
            return Some(StopReason::NoNewContent);
        }
        if self.run.stall >= self.settings.max_consecutive_no_new_posts.max(1) {
            info!("No new posts for {} consecutive cycles", self.run.stall);
            return Some(StopReason::Stalled);
        }
        None
    }

    fn reached_expected(&self) -> bool {
        self.run.expected > 0 && self.posts.len() as u64 >= self.run.expected
    }

    async fn complete(&mut self, reason: StopReason) {
        self.transition(LoadingState::Completed).await;
        info!(
            "Loading completed ({:?}). Total posts: {}",
            reason,
            self.posts.len()
        );
        self.emit(LoaderEvent::LoadingComplete {
            total_posts: self.posts.len(),
        });
    }

    async fn read_expected_count(&self) -> u64 {
        match self.page.find_expected_count_label().await {
            Ok(Some(label)) => {
                let count = parse_expected_count(&label);
                info!("Found likes count label {:?} -> {}", label, count);
                count
            }
            Ok(None) => {
                info!("Likes count label not found, total unknown");
                0
            }
            Err(e) => {
                warn!("Failed to read likes count: {}", e);
                0
            }
        }
    }

    fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            posts_loaded: self.posts.len(),
            progress: compute_progress(self.posts.len(), self.run.expected, self.run.scroll_count),
            total_expected: self.run.expected,
        }
    }

    fn snapshot(&self) -> PersistedState {
        PersistedState {
            posts: self.posts.clone(),
            loading_state: self.state,
            settings: self.settings.clone(),
        }
    }

    async fn transition(&mut self, state: LoadingState) {
        debug!("Loading state: {} -> {}", self.state, state);
        self.state = state;
        if let Err(e) = self.store.save_loading_state(state).await {
            warn!("Failed to save loading state: {}", e);
        }
    }

    async fn persist_posts(&self) {
        if let Err(e) = self.store.save_posts(&self.posts).await {
            warn!("Failed to save posts (will retry next cycle): {}", e);
        }
    }

    fn emit(&self, event: LoaderEvent) {
        if self.events.send(event).is_err() {
            debug!("No event listeners");
        }
    }
}

/// 進捗率 (0〜100)
///
/// 期待件数が分かっていれば件数比、分からなければスクロール回数から
/// 最大 90% までの見込み値。
pub fn compute_progress(loaded: usize, expected: u64, scroll_count: u32) -> f64 {
    if expected > 0 {
        (loaded as f64 / expected as f64 * 100.0).min(100.0)
    } else {
        (scroll_count as f64 / SYNTHETIC_PROGRESS_SCROLLS * 100.0).min(SYNTHETIC_PROGRESS_CAP)
    }
}
