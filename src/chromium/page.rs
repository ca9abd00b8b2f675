use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{FieldValue, PageAdapter, PostField, ScrollMetrics};

use super::scripts;

/// ポスト一覧の描画待ちのポーリング間隔
const RENDER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Chromium 上のいいね一覧ページ
pub struct ChromiumPage {
    config: ScraperConfig,
    browser: Browser,
    page: Page,
}

impl ChromiumPage {
    /// ブラウザを起動していいね一覧ページを開く
    pub async fn launch(config: ScraperConfig) -> Result<Self, ScraperError> {
        info!("Launching browser for {}", config.likes_url);

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(config.resolve_chrome_path())
            .window_size(width, height)
            .no_sandbox()
            .request_timeout(config.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage");

        // ログイン済みプロファイルがなければ一覧は表示されない
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page(config.likes_url.as_str())
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        let adapter = Self {
            config,
            browser,
            page,
        };
        adapter.wait_for_posts().await;

        info!("Browser ready");
        Ok(adapter)
    }

    /// 最初のポストが描画されるまで待つ（タイムアウトしても続行）
    async fn wait_for_posts(&self) {
        let started = std::time::Instant::now();

        loop {
            let count: u64 = match self.page.evaluate(scripts::POST_COUNT).await {
                Ok(result) => result.into_value().unwrap_or(0),
                Err(e) => {
                    debug!("Post count check failed: {}", e);
                    0
                }
            };

            if count > 0 {
                debug!("{} posts rendered after {:?}", count, started.elapsed());
                return;
            }

            if started.elapsed() > self.config.timeout {
                warn!(
                    "No posts rendered within {:?}, is the profile logged in?",
                    self.config.timeout
                );
                self.debug_screenshot().await;
                return;
            }

            sleep(RENDER_POLL_INTERVAL).await;
        }
    }

    async fn debug_screenshot(&self) {
        if !self.config.debug {
            return;
        }

        match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(png) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
                debug!("Page screenshot: data:image/png;base64,{}", encoded);
            }
            Err(e) => debug!("Screenshot failed: {}", e),
        }
    }

    /// ブラウザを終了
    pub async fn close(mut self) -> Result<(), ScraperError> {
        self.browser
            .close()
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ終了エラー: {}", e)))?;
        info!("Browser closed");
        Ok(())
    }
}

/// スクリプトの戻り値をフィールド値に変換
fn field_value(field: PostField, value: Option<Value>) -> Result<Option<FieldValue>, ScraperError> {
    let text = match value {
        Some(Value::String(text)) => text,
        Some(Value::Null) | None => return Ok(None),
        Some(other) => {
            return Err(ScraperError::JavaScript(format!(
                "{:?}: 想定外の戻り値 {}",
                field, other
            )))
        }
    };

    match field {
        PostField::Media => {
            let items: Vec<String> = serde_json::from_str(&text)?;
            Ok(Some(FieldValue::List(items)))
        }
        _ => Ok(Some(FieldValue::Text(text))),
    }
}

#[async_trait]
impl PageAdapter for ChromiumPage {
    type Node = Element;

    async fn find_post_nodes(&self) -> Result<Vec<Element>, ScraperError> {
        let nodes = self
            .page
            .find_elements(scripts::POST_SELECTOR)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("ポスト: {}", e)))?;

        if nodes.is_empty() {
            debug!("No post nodes on page");
            self.debug_screenshot().await;
        }
        Ok(nodes)
    }

    async fn extract_field(
        &self,
        node: &Element,
        field: PostField,
    ) -> Result<Option<FieldValue>, ScraperError> {
        let returns = node
            .call_js_fn(scripts::field_script(field), false)
            .await
            .map_err(|e| ScraperError::JavaScript(format!("{:?}: {}", field, e)))?;

        field_value(field, returns.result.value)
    }

    async fn current_scroll_metrics(&self) -> Result<ScrollMetrics, ScraperError> {
        self.page
            .evaluate(scripts::SCROLL_METRICS)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()
            .map_err(ScraperError::from)
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        self.page
            .evaluate(scripts::SCROLL_TO_BOTTOM)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(())
    }

    async fn find_expected_count_label(&self) -> Result<Option<String>, ScraperError> {
        let label: Option<String> = self
            .page
            .evaluate(scripts::EXPECTED_COUNT_LABEL)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()?;

        debug!("Expected count label: {:?}", label);
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_text() {
        let value = field_value(PostField::Content, Some(json!("hello"))).unwrap();
        assert_eq!(value, Some(FieldValue::Text("hello".into())));
    }

    #[test]
    fn test_field_value_missing() {
        assert_eq!(field_value(PostField::Avatar, None).unwrap(), None);
        assert_eq!(field_value(PostField::Avatar, Some(Value::Null)).unwrap(), None);
    }

    #[test]
    fn test_field_value_media_list() {
        let value = field_value(PostField::Media, Some(json!(r#"["a.jpg","b.jpg"]"#))).unwrap();
        assert_eq!(
            value,
            Some(FieldValue::List(vec!["a.jpg".into(), "b.jpg".into()]))
        );
    }

    #[test]
    fn test_field_value_unexpected_type() {
        let err = field_value(PostField::Permalink, Some(json!(42))).unwrap_err();
        assert!(matches!(err, ScraperError::JavaScript(_)));
    }

    /// 実ブラウザが必要
    /// CHROME_PATH=/usr/bin/chromium cargo test -- --ignored test_launch_blank_page
    #[tokio::test]
    #[ignore]
    async fn test_launch_blank_page() {
        let config = ScraperConfig::new("about:blank").with_timeout(Duration::from_secs(2));
        let page = ChromiumPage::launch(config).await.unwrap();

        assert!(page.find_post_nodes().await.unwrap().is_empty());
        let metrics = page.current_scroll_metrics().await.unwrap();
        assert!(metrics.viewport_height > 0.0);
        assert_eq!(page.find_expected_count_label().await.unwrap(), None);

        page.close().await.unwrap();
    }
}
