use std::path::PathBuf;
use std::time::Duration;

use chrono::Month;

use crate::error::ScraperError;
use crate::manifest::Manifest;

/// NOAA Climate at a Glance 郡別時系列ページ
pub const DEFAULT_SOURCE_URL: &str =
    "https://www.ncei.noaa.gov/access/monitoring/climate-at-a-glance/county/time-series";

/// タスク失敗時の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// ログに記録して次のタスクへ進む
    #[default]
    BestEffort,
    /// 最初の失敗で中断する
    FailFast,
}

#[derive(Debug, Clone)]
pub struct GrabberConfig {
    /// 取得する気候パラメータ (例: "Precipitation")
    pub parameter: String,
    pub timescale: String,
    pub state: String,
    pub months: Vec<Month>,
    /// 開始年（含む）
    pub year_start: i32,
    /// 終了年（含む）
    pub year_end: i32,
    /// 空の場合はドロップダウンから全郡を取得
    pub counties: Vec<String>,
    /// ダウンロード済みデータの集計のみ行う
    pub skip_download: bool,
    pub data_root: PathBuf,
    pub output_dir: PathBuf,
    pub source_url: String,
    pub headless: bool,
    pub debug: bool,
    /// ドロップダウン・要素待機のタイムアウト
    pub select_timeout: Duration,
    /// ダウンロード一覧のポーリング間隔
    pub poll_interval: Duration,
    /// ダウンロード完了待機の上限（None: 無制限）
    pub download_timeout: Option<Duration>,
    pub error_policy: ErrorPolicy,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            parameter: "Precipitation".to_string(),
            timescale: "Year-to-Date".to_string(),
            state: "California".to_string(),
            months: vec![Month::December],
            year_start: 1985,
            year_end: 2023,
            counties: Vec::new(),
            skip_download: false,
            data_root: PathBuf::from("./data"),
            output_dir: PathBuf::from("./output"),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            headless: true,
            debug: false,
            select_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            download_timeout: None,
            error_policy: ErrorPolicy::BestEffort,
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

impl GrabberConfig {
    pub fn new(parameter: impl Into<String>, year_start: i32, year_end: i32) -> Self {
        Self {
            parameter: parameter.into(),
            year_start,
            year_end,
            ..Default::default()
        }
    }

    pub fn with_months(mut self, months: impl IntoIterator<Item = Month>) -> Self {
        self.months = months.into_iter().collect();
        self
    }

    pub fn with_counties<S: Into<String>>(mut self, counties: impl IntoIterator<Item = S>) -> Self {
        self.counties = counties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    pub fn with_data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
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

    pub fn with_select_timeout(mut self, timeout: Duration) -> Self {
        self.select_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// ダウンロード先: `<data_root>/<parameter>/<start>-<end>`
    pub fn download_dir(&self) -> PathBuf {
        self.data_root
            .join(&self.parameter)
            .join(format!("{}-{}", self.year_start, self.year_end))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.year_start..=self.year_end
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.parameter.trim().is_empty() {
            return Err(ScraperError::Config("パラメータが空です".into()));
        }
        if self.months.is_empty() {
            return Err(ScraperError::Config("月が指定されていません".into()));
        }
        if self.year_start > self.year_end {
            return Err(ScraperError::Config(format!(
                "開始年 {} が終了年 {} より後です",
                self.year_start, self.year_end
            )));
        }
        Ok(())
    }

    /// ブラウザ起動が必要か（ダウンロードまたは郡一覧の取得）
    pub fn needs_browser(&self) -> bool {
        if !self.skip_download {
            return true;
        }
        self.counties.is_empty() && !Manifest::path_in(&self.download_dir()).exists()
    }
}
