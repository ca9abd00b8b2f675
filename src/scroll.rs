//! スクロールドライバー
//!
//! 1ステップ = スクロール → 段階的な待機 → 高さと位置の計測。
//! 遅延読み込みの完了はページから観測できないため、固定の待機で描画を待つ。

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::{PageAdapter, ScrollMetrics};

/// 最下部判定の許容誤差（px）
pub const BOTTOM_TOLERANCE_PX: f64 = 50.0;
/// 新規コンテンツとみなす最小の高さ増加（px）
pub const MIN_GROWTH_PX: f64 = 10.0;

/// 各段階の待機時間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTiming {
    /// スクロール直後の待機
    pub settle: Duration,
    /// コンテンツ読み込み待ち
    pub content_load: Duration,
    /// 再スクロール後の確認待ち
    pub recheck: Duration,
    /// 追加スクロール後の待機
    pub retry: Duration,
}

impl Default for ScrollTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1500),
            content_load: Duration::from_millis(3000),
            recheck: Duration::from_millis(1000),
            retry: Duration::from_millis(1500),
        }
    }
}

impl ScrollTiming {
    /// 待機なし（テスト用）
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            content_load: Duration::ZERO,
            recheck: Duration::ZERO,
            retry: Duration::ZERO,
        }
    }

    /// 1ステップの最小所要時間（追加スクロールなし）
    pub fn base_total(&self) -> Duration {
        self.settle + self.content_load + self.recheck
    }
}

/// スクロール1ステップの結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOutcome {
    pub reached_bottom: bool,
    pub new_content_loaded: bool,
    pub scroll_height: f64,
}

impl ScrollOutcome {
    /// スクロールできなかった場合の結果
    pub fn stalled(scroll_height: f64) -> Self {
        Self {
            reached_bottom: true,
            new_content_loaded: false,
            scroll_height,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollDriver {
    timing: ScrollTiming,
}

impl ScrollDriver {
    pub fn new(timing: ScrollTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &ScrollTiming {
        &self.timing
    }

    /// 1ステップ実行
    pub async fn scroll_step<P: PageAdapter>(&self, page: &P) -> Result<ScrollOutcome, ScraperError> {
        let before = page.current_scroll_metrics().await?;
        debug!(
            "Before scroll - height: {}, top: {}",
            before.scroll_height, before.scroll_top
        );

        page.scroll_to_bottom().await?;
        sleep(self.timing.settle).await;
        sleep(self.timing.content_load).await;

        // もう一度最下部へ
        page.scroll_to_bottom().await?;
        sleep(self.timing.recheck).await;

        let after = page.current_scroll_metrics().await?;
        let at_bottom = is_at_bottom(&after);
        let grew = has_grown(&before, &after);
        debug!(
            "After scroll - height: {}, top: {}, at bottom: {}, new content: {}",
            after.scroll_height, after.scroll_top, at_bottom, grew
        );

        // 伸びたのに最下部に届いていなければ追加で1回
        if !at_bottom && grew {
            debug!("Doing final scroll to reach bottom...");
            page.scroll_to_bottom().await?;
            sleep(self.timing.retry).await;
        }

        let last = page.current_scroll_metrics().await?;
        let outcome = ScrollOutcome {
            reached_bottom: is_at_bottom(&last),
            new_content_loaded: has_grown(&before, &last),
            scroll_height: last.scroll_height,
        };
        debug!("Scroll step finished: {:?}", outcome);

        Ok(outcome)
    }
}

/// ビューポート下端が許容誤差内で最下部に達しているか
pub fn is_at_bottom(metrics: &ScrollMetrics) -> bool {
    metrics.scroll_top + metrics.viewport_height >= metrics.scroll_height - BOTTOM_TOLERANCE_PX
}

fn has_grown(before: &ScrollMetrics, after: &ScrollMetrics) -> bool {
    after.scroll_height > before.scroll_height + MIN_GROWTH_PX
}
