//! ダウンロードディレクトリの監視

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::manifest::MANIFEST_FILE;

/// 新規ファイル出現待ちの追加ポーリング回数
const SETTLE_CHECKS: u32 = 5;

#[derive(Debug, Clone)]
pub struct DownloadDir {
    path: PathBuf,
}

impl DownloadDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&self) -> Result<(), ScraperError> {
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// 現在のファイル名一覧
    pub fn snapshot(&self) -> Result<BTreeSet<String>, ScraperError> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }

        let mut names = BTreeSet::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.insert(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    /// スナップショット以降に完了したファイル（古い順）
    pub fn completed_since(&self, before: &BTreeSet<String>) -> Result<Vec<String>, ScraperError> {
        let mut fresh: Vec<(SystemTime, String)> = Vec::new();
        for name in self.snapshot()?.difference(before) {
            if !is_completed_download(name) {
                continue;
            }
            let modified = std::fs::metadata(self.path.join(name))?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            fresh.push((modified, name.clone()));
        }
        fresh.sort();
        Ok(fresh.into_iter().map(|(_, name)| name).collect())
    }

    /// 新しいファイルが現れるまで少し待つ
    ///
    /// `expected` (ダウンロード一覧の表示名) と一致するファイルを優先し、
    /// 一致しなければ最も新しいファイルを使う。
    pub async fn await_new_file(
        &self,
        before: &BTreeSet<String>,
        expected: Option<&str>,
        poll_interval: Duration,
    ) -> Result<String, ScraperError> {
        for _ in 0..=SETTLE_CHECKS {
            let mut fresh = self.completed_since(before)?;

            if let Some(expected) = expected {
                if fresh.iter().any(|name| name == expected) {
                    info!("Downloaded file detected: {}", expected);
                    return Ok(expected.to_string());
                }
            }

            if let Some(name) = fresh.pop() {
                if let Some(expected) = expected {
                    warn!("Download list shows {}, but found {}", expected, name);
                }
                if !fresh.is_empty() {
                    warn!(
                        "Multiple new files in {:?}, using newest {} (also {:?})",
                        self.path, name, fresh
                    );
                }
                info!("Downloaded file detected: {}", name);
                return Ok(name);
            }
            sleep(poll_interval).await;
        }

        Err(ScraperError::Download(format!(
            "{:?} に新しいファイルが作成されませんでした",
            self.path
        )))
    }
}

/// ダウンロード途中のファイルやマニフェストを除外
fn is_completed_download(name: &str) -> bool {
    !(name.ends_with(".crdownload") || name.ends_with(".tmp") || name == MANIFEST_FILE)
}
