use std::path::PathBuf;
use std::time::Duration;

/// いいね一覧ページ（既定値）
pub const DEFAULT_LIKES_URL: &str = "https://x.com/i/likes";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// 収集対象のいいね一覧ページ
    pub likes_url: String,
    /// Chrome 実行ファイル（未指定なら CHROME_PATH / CHROMIUM_PATH）
    pub chrome_path: Option<PathBuf>,
    /// ログイン済みプロファイルを使う場合のユーザーデータディレクトリ
    pub user_data_dir: Option<PathBuf>,
    /// 状態ファイルの保存先
    pub state_path: PathBuf,
    pub headless: bool,
    /// デバッグモード（ポストが見つからない時にスクリーンショットを出力）
    pub debug: bool,
    pub timeout: Duration,
    pub window_size: (u32, u32),
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            likes_url: DEFAULT_LIKES_URL.to_string(),
            chrome_path: None,
            user_data_dir: None,
            state_path: PathBuf::from("./data/likes_state.json"),
            headless: true,
            debug: false,
            timeout: Duration::from_secs(60),
            window_size: (1280, 800),
        }
    }
}

impl ScraperConfig {
    pub fn new(likes_url: impl Into<String>) -> Self {
        Self {
            likes_url: likes_url.into(),
            ..Default::default()
        }
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Chrome 実行ファイルを解決（設定 → 環境変数 → "chromium"）
    pub fn resolve_chrome_path(&self) -> PathBuf {
        self.chrome_path.clone().unwrap_or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .unwrap_or_else(|_| "chromium".to_string())
                .into()
        })
    }
}
