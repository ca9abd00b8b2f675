use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("抽出エラー: {0}")]
    Extraction(String),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ストレージエラー: {0}")]
    Storage(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("インポートデータが不正です: {0}")]
    InvalidImport(String),

    #[error("現在の状態では実行できません: {0}")]
    InvalidState(String),

    #[error("通信エラー: {0}")]
    Transport(String),
}
