//! テスト用のフェイクブラウザ

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ScraperError;
use crate::fetch::{
    BEGIN_YEAR_FIELD, END_YEAR_FIELD, JSON_DOWNLOAD_LINK, LOCATION_FIELD, MONTH_FIELD,
    PARAMETER_FIELD, PLOT_BUTTON, STATE_FIELD, TIMESCALE_FIELD,
};
use crate::plan::parse_month;
use crate::traits::{DownloadEntry, DownloadsList, FormDriver};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Debug, Default)]
pub(crate) struct FakeDriver {
    options: HashMap<String, Vec<String>>,
    options_delay: HashMap<String, usize>,
    selections: HashMap<String, String>,
    visible: HashSet<String>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    download_dir: Option<PathBuf>,
    last_download: Option<String>,
    write_files: bool,
    download_polls: usize,
    remaining_polls: usize,
    no_downloads_list: bool,
    closed: bool,
}

impl FakeDriver {
    pub(crate) fn new() -> Self {
        Self {
            write_files: true,
            ..Default::default()
        }
    }

    /// 取得フォーム一式とダウンロード先を備えたフェイク
    pub(crate) fn site<const N: usize>(download_dir: PathBuf, counties: [&str; N]) -> Self {
        let years: Vec<String> = (1895..=2030).map(|y| y.to_string()).collect();
        let mut driver = Self::new()
            .with_options(PARAMETER_FIELD, ["Average Temperature", "Precipitation"])
            .with_options(TIMESCALE_FIELD, ["1-Month", "Year-to-Date"])
            .with_options(MONTH_FIELD, MONTH_NAMES)
            .with_options(BEGIN_YEAR_FIELD, years.clone())
            .with_options(END_YEAR_FIELD, years)
            .with_options(STATE_FIELD, ["Arizona", "California", "Nevada"])
            .with_options(LOCATION_FIELD, counties)
            .with_visible(PLOT_BUTTON)
            .with_visible(JSON_DOWNLOAD_LINK);
        driver.download_dir = Some(download_dir);
        driver
    }

    pub(crate) fn with_options<S: Into<String>>(
        mut self,
        field_id: &str,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        self.options.insert(
            field_id.to_string(),
            options.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// 最初の `calls` 回は要素が存在しない扱いにする
    pub(crate) fn with_options_delay(mut self, field_id: &str, calls: usize) -> Self {
        self.options_delay.insert(field_id.to_string(), calls);
        self
    }

    pub(crate) fn with_visible(mut self, selector: &str) -> Self {
        self.visible.insert(selector.to_string());
        self
    }

    /// ダウンロード開始後、状態表示が見えている確認回数
    pub(crate) fn with_download_polls(mut self, polls: usize) -> Self {
        self.download_polls = polls;
        self.remaining_polls = polls;
        self
    }

    pub(crate) fn without_downloads_list(mut self) -> Self {
        self.no_downloads_list = true;
        self
    }

    pub(crate) fn without_file_writes(mut self) -> Self {
        self.write_files = false;
        self
    }

    pub(crate) fn selected(&self, field_id: &str) -> Option<&str> {
        self.selections.get(field_id).map(String::as_str)
    }

    pub(crate) fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub(crate) fn clicks(&self) -> &[String] {
        &self.clicks
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Chromeと同じ連番でファイル名を決める
    fn next_download_name(dir: &std::path::Path) -> String {
        if !dir.join("data.json").exists() {
            return "data.json".to_string();
        }
        (1..)
            .map(|n| format!("data ({}).json", n))
            .find(|name| !dir.join(name).exists())
            .unwrap_or_default()
    }

    /// 現在の選択内容からダウンロードJSONを作成し、ファイル名を返す
    fn write_download(&self) -> Option<String> {
        let dir = self.download_dir.as_ref()?;
        let county = self.selected(LOCATION_FIELD).unwrap_or_default();
        let ordinal = self
            .selected(MONTH_FIELD)
            .and_then(|m| parse_month(m).ok())
            .map(|m| m.number_from_month())
            .unwrap_or_default();
        let start: i32 = self
            .selected(BEGIN_YEAR_FIELD)
            .and_then(|y| y.parse().ok())
            .unwrap_or_default();
        let end: i32 = self
            .selected(END_YEAR_FIELD)
            .and_then(|y| y.parse().ok())
            .unwrap_or_default();

        let mut data = serde_json::Map::new();
        for year in start..=end {
            data.insert(
                format!("{}{}", year, ordinal),
                json!({ "value": format!("{}-{}-{}", county, year, ordinal), "anomaly": 0.0 }),
            );
        }
        let body = json!({ "description": { "title": county }, "data": data });

        std::fs::create_dir_all(dir).unwrap();
        let name = Self::next_download_name(dir);
        std::fs::write(dir.join(&name), body.to_string()).unwrap();
        Some(name)
    }
}

#[async_trait]
impl FormDriver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        self.navigations.push(url.to_string());
        if url != crate::fetch::DOWNLOADS_URL {
            self.selections.clear();
        }
        Ok(())
    }

    async fn option_texts(&mut self, field_id: &str) -> Result<Option<Vec<String>>, ScraperError> {
        if let Some(delay) = self.options_delay.get_mut(field_id) {
            if *delay > 0 {
                *delay -= 1;
                return Ok(None);
            }
        }
        Ok(self.options.get(field_id).cloned())
    }

    async fn select_option(&mut self, field_id: &str, choice: &str) -> Result<bool, ScraperError> {
        let present = self
            .options
            .get(field_id)
            .map(|opts| opts.iter().any(|o| o == choice))
            .unwrap_or(false);
        if present {
            self.selections
                .insert(field_id.to_string(), choice.to_string());
        }
        Ok(present)
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScraperError> {
        Ok(self.visible.contains(selector))
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScraperError> {
        if !self.visible.contains(selector) {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        self.clicks.push(selector.to_string());
        if selector == JSON_DOWNLOAD_LINK {
            self.remaining_polls = self.download_polls;
            if self.write_files {
                self.last_download = self.write_download();
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError> {
        if self.visible.contains(selector) {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(selector.to_string()))
        }
    }

    async fn screenshot_base64(&mut self) -> Option<String> {
        Some("ZmFrZQ==".to_string())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closed = true;
        Ok(())
    }
}

#[async_trait]
impl DownloadsList for FakeDriver {
    async fn top_download(&mut self) -> Result<DownloadEntry, ScraperError> {
        if self.no_downloads_list {
            return Err(ScraperError::ElementNotFound("downloads-manager".into()));
        }
        let in_progress = self.remaining_polls > 0;
        if in_progress {
            self.remaining_polls -= 1;
        }
        Ok(DownloadEntry {
            file_name: self.last_download.clone(),
            status_visible: vec![in_progress],
        })
    }
}
