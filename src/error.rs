use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("選択肢が見つかりません: {field} = {choice}")]
    OptionNotFound { field: String, choice: String },

    #[error("ダウンロードエラー: {0}")]
    Download(String),

    #[error("ダウンロードファイルがありません: {0}")]
    MissingFile(PathBuf),

    #[error("データ値がありません: {file} のキー {key}")]
    MissingValue { file: PathBuf, key: String },

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("タスク失敗 ({county}, {month}): {source}")]
    Task {
        county: String,
        month: String,
        #[source]
        source: Box<ScraperError>,
    },

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),
}
