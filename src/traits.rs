use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;

use crate::error::ScraperError;

/// 要素表示待機のポーリング間隔
pub const VISIBILITY_POLL: Duration = Duration::from_millis(250);

/// フォーム操作に必要なブラウザ機能
#[async_trait]
pub trait FormDriver: Send {
    /// ページ遷移
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError>;

    /// ドロップダウン（id指定）の選択肢テキスト。要素がなければ None
    async fn option_texts(&mut self, field_id: &str) -> Result<Option<Vec<String>>, ScraperError>;

    /// 表示テキストで選択肢を確定。該当なしなら false
    async fn select_option(&mut self, field_id: &str, choice: &str) -> Result<bool, ScraperError>;

    /// CSSセレクタの要素が表示されているか
    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScraperError>;

    async fn click(&mut self, selector: &str) -> Result<(), ScraperError>;

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// デバッグ用スクリーンショット（PNG, base64）
    async fn screenshot_base64(&mut self) -> Option<String> {
        None
    }

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 要素が表示されるまで待機
    async fn wait_visible(&mut self, selector: &str, timeout: Duration) -> Result<(), ScraperError> {
        let start = Instant::now();
        loop {
            if self.is_visible(selector).await? {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(ScraperError::Timeout(format!(
                    "要素 '{}' が{:?}以内に表示されませんでした",
                    selector, timeout
                )));
            }
            sleep(VISIBILITY_POLL.min(timeout)).await;
        }
    }
}

/// ダウンロード一覧の先頭エントリ
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DownloadEntry {
    /// 一覧に表示されているファイル名
    #[serde(default)]
    pub file_name: Option<String>,
    /// エントリ内の状態表示要素ごとの可視性
    #[serde(default)]
    pub status_visible: Vec<bool>,
}

impl DownloadEntry {
    pub fn in_progress(&self) -> bool {
        self.status_visible.iter().any(|visible| *visible)
    }
}

/// ブラウザのダウンロード一覧
#[async_trait]
pub trait DownloadsList: Send {
    /// 現在のページ（ダウンロード一覧）から先頭エントリを取得
    async fn top_download(&mut self) -> Result<DownloadEntry, ScraperError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_in_progress() {
        let hidden = DownloadEntry {
            file_name: Some("data.json".into()),
            status_visible: vec![false],
        };
        assert!(!hidden.in_progress());

        let shown = DownloadEntry {
            file_name: None,
            status_visible: vec![false, true],
        };
        assert!(shown.in_progress());

        assert!(!DownloadEntry::default().in_progress());
    }

    #[test]
    fn test_entry_from_script_result() {
        let entry: DownloadEntry =
            serde_json::from_str(r#"{"file_name":"data (2).json","status_visible":[true]}"#)
                .unwrap();
        assert_eq!(entry.file_name.as_deref(), Some("data (2).json"));
        assert!(entry.in_progress());
    }
}
