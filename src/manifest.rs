//! タスクと実際のダウンロードファイルの対応表

use std::path::{Path, PathBuf};

use chrono::Month;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GrabberConfig;
use crate::error::ScraperError;
use crate::plan::FetchTask;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub county: String,
    pub month: String,
    /// ダウンロードディレクトリ内のファイル名（失敗時は None）
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub parameter: String,
    pub year_start: i32,
    pub year_end: i32,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(config: &GrabberConfig) -> Self {
        Self {
            parameter: config.parameter.clone(),
            year_start: config.year_start,
            year_end: config.year_end,
            entries: Vec::new(),
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn load(dir: &Path) -> Result<Option<Self>, ScraperError> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Ok(None);
        }
        let manifest = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        debug!("Loaded manifest from {:?}", path);
        Ok(Some(manifest))
    }

    /// 一時ファイルに書いてから置き換える（書き込み途中で壊れたJSONを残さない）
    pub fn save(&self, dir: &Path) -> Result<(), ScraperError> {
        let path = Self::path_in(dir);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// 同じパラメータ・期間の取得結果か
    pub fn matches(&self, config: &GrabberConfig) -> bool {
        self.parameter == config.parameter
            && self.year_start == config.year_start
            && self.year_end == config.year_end
    }

    pub fn record(&mut self, task: &FetchTask, file: Option<String>) {
        let month = task.month.name().to_string();
        match self
            .entries
            .iter_mut()
            .find(|e| e.county == task.county && e.month == month)
        {
            Some(entry) => entry.file = file,
            None => self.entries.push(ManifestEntry {
                county: task.county.clone(),
                month,
                file,
            }),
        }
    }

    pub fn entry(&self, county: &str, month: Month) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|e| e.county == county && e.month.eq_ignore_ascii_case(month.name()))
    }

    /// 記録されている郡（出現順、重複なし）
    pub fn counties(&self) -> Vec<String> {
        let mut counties: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !counties.contains(&entry.county) {
                counties.push(entry.county.clone());
            }
        }
        counties
    }
}
