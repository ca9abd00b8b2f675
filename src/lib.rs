//! いいね一覧の収集ライブラリ
//!
//! - 無限スクロールのいいね一覧から描画済みポストを繰り返し抽出
//! - URL で重複排除しながら蓄積し、毎サイクル保存
//! - 期待件数への到達・スクロールの停滞で自動終了
//! - エクスポート / インポートと HTML 書き出し
//!
//! # 使用例
//!
//! ```rust,ignore
//! use likes_scraper::{ChromiumPage, Controller, JsonFileStore, LoaderEvent, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::default().with_user_data_dir("./profile");
//!     let store = JsonFileStore::new(&config.state_path);
//!     let page = ChromiumPage::launch(config).await.unwrap();
//!
//!     let controller = Controller::new(page, store).await.unwrap();
//!     let mut events = controller.subscribe();
//!     let (service, _task) = controller.spawn();
//!
//!     service.start().await.unwrap();
//!     while let Ok(event) = events.recv().await {
//!         if let LoaderEvent::LoadingComplete { total_posts } = event {
//!             println!("Collected {} posts", total_posts);
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! # tower::Service として使う
//!
//! ```rust,ignore
//! use likes_scraper::{Command, Response};
//! use tower::Service;
//!
//! let mut service = service.clone();
//! if let Response::Posts(posts) = service.call(Command::GetPosts).await? {
//!     let html = likes_scraper::render::render_html(&posts, chrono::Utc::now());
//! }
//! ```

pub mod archive;
pub mod chromium;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod extractor;
pub mod merge;
pub mod render;
pub mod scroll;
pub mod service;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型をリエクスポート
pub use archive::ExportData;
pub use chromium::ChromiumPage;
pub use config::ScraperConfig;
pub use controller::{Command, Controller, Response};
pub use error::ScraperError;
pub use scroll::ScrollTiming;
pub use service::LoaderService;
pub use store::{JsonFileStore, MemoryStore};
pub use traits::{PageAdapter, StateStore};
pub use types::{LoaderEvent, LoaderSettings, LoadingState, Post, ProgressSnapshot};
