//! ダウンロード完了待機
//!
//! ブラウザのダウンロード一覧の先頭エントリを監視し、状態表示が消えるまで待つ。
//! 正常完了と失敗・キャンセルは区別しない。

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::{DownloadEntry, DownloadsList};

/// 待機結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleDownload {
    /// 確認回数
    pub checks: u32,
    /// 先頭エントリに表示されていたファイル名
    pub file_name: Option<String>,
}

/// 先頭エントリがダウンロード中か
pub async fn is_downloading<L>(downloads: &mut L) -> Result<bool, ScraperError>
where
    L: DownloadsList + ?Sized,
{
    Ok(top_entry(downloads).await?.in_progress())
}

async fn top_entry<L>(downloads: &mut L) -> Result<DownloadEntry, ScraperError>
where
    L: DownloadsList + ?Sized,
{
    let entry = downloads.top_download().await?;
    debug!(
        "Top download: {:?}, in progress: {}",
        entry.file_name,
        entry.in_progress()
    );
    Ok(entry)
}

/// ダウンロード中でなくなるまでポーリングする
///
/// `max_wait` が None の場合は無制限に待つ。
pub async fn wait_until_idle<L>(
    downloads: &mut L,
    poll_interval: Duration,
    max_wait: Option<Duration>,
) -> Result<IdleDownload, ScraperError>
where
    L: DownloadsList + ?Sized,
{
    let start = Instant::now();
    let mut checks = 0;

    loop {
        checks += 1;
        let entry = top_entry(downloads).await?;
        if !entry.in_progress() {
            debug!("Download idle after {} check(s), {:?}", checks, start.elapsed());
            return Ok(IdleDownload {
                checks,
                file_name: entry.file_name,
            });
        }

        if let Some(limit) = max_wait {
            if start.elapsed() >= limit {
                return Err(ScraperError::Timeout(format!(
                    "ダウンロードが{:?}以内に完了しませんでした",
                    limit
                )));
            }
        }

        sleep(poll_interval).await;
    }
}
