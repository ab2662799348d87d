use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Month;
use tower::Service;
use tracing::info;

use crate::chrome::ChromeDriver;
use crate::config::{ErrorPolicy, GrabberConfig};
use crate::error::ScraperError;
use crate::pipeline::{self, GrabResult};

/// 取得リクエスト
#[derive(Debug, Clone)]
pub struct GrabRequest {
    pub parameter: String,
    pub months: Vec<Month>,
    pub year_start: i32,
    pub year_end: i32,
    pub counties: Vec<String>,
    pub skip_download: bool,
    pub data_root: PathBuf,
    pub output_dir: PathBuf,
    pub headless: bool,
    pub debug: bool,
    pub fail_fast: bool,
    pub download_timeout: Option<Duration>,
}

impl GrabRequest {
    pub fn new(parameter: impl Into<String>, year_start: i32, year_end: i32) -> Self {
        let defaults = GrabberConfig::default();
        Self {
            parameter: parameter.into(),
            months: defaults.months,
            year_start,
            year_end,
            counties: Vec::new(),
            skip_download: false,
            data_root: defaults.data_root,
            output_dir: defaults.output_dir,
            headless: true,
            debug: false,
            fail_fast: false,
            download_timeout: None,
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

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }
}

impl From<GrabRequest> for GrabberConfig {
    fn from(req: GrabRequest) -> Self {
        let policy = if req.fail_fast {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::BestEffort
        };
        GrabberConfig::new(req.parameter, req.year_start, req.year_end)
            .with_months(req.months)
            .with_counties(req.counties)
            .with_skip_download(req.skip_download)
            .with_data_root(req.data_root)
            .with_output_dir(req.output_dir)
            .with_headless(req.headless)
            .with_debug(req.debug)
            .with_error_policy(policy)
            .with_download_timeout(req.download_timeout)
    }
}

/// tower::Serviceを実装した取得サービス
#[derive(Debug, Clone, Default)]
pub struct GrabberService {}

impl GrabberService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<GrabRequest> for GrabberService {
    type Response = GrabResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GrabRequest) -> Self::Future {
        info!(
            "取得リクエスト受信: parameter={}, {}-{}, months={}",
            req.parameter,
            req.year_start,
            req.year_end,
            req.months.len()
        );

        Box::pin(async move {
            let config: GrabberConfig = req.into();
            config.validate()?;

            let mut driver = if config.needs_browser() {
                Some(ChromeDriver::launch(&config).await?)
            } else {
                None
            };

            let result = pipeline::run(&config, driver.as_mut()).await?;

            info!("取得完了: {} file(s) written", result.csv_paths.len());
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grab_request_builder() {
        let req = GrabRequest::new("Precipitation", 1990, 1995)
            .with_months([Month::July])
            .with_counties(["Alameda County"])
            .with_data_root("/tmp/dl")
            .with_headless(false)
            .with_fail_fast(true);

        assert_eq!(req.parameter, "Precipitation");
        assert_eq!(req.months, vec![Month::July]);
        assert_eq!(req.data_root, PathBuf::from("/tmp/dl"));
        assert!(!req.headless);
        assert!(req.fail_fast);
    }

    #[test]
    fn test_grab_request_to_config() {
        let req = GrabRequest::new("Precipitation", 1985, 2023).with_fail_fast(true);
        let config: GrabberConfig = req.into();

        assert_eq!(config.parameter, "Precipitation");
        assert_eq!(config.months, vec![Month::December]);
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
        assert_eq!(config.timescale, "Year-to-Date");
    }

    #[tokio::test]
    async fn test_service_aggregates_without_browser() {
        let root = tempfile::tempdir().unwrap();
        let req = GrabRequest::new("Precipitation", 1985, 1985)
            .with_months([Month::January])
            .with_counties(["Alameda"])
            .with_skip_download(true)
            .with_data_root(root.path().join("data"))
            .with_output_dir(root.path().join("output"));
        let dir = root.path().join("data").join("Precipitation").join("1985-1985");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("data.json"), r#"{"data": {"19851": {"value": "1.2"}}}"#).unwrap();

        let result = GrabberService::new().call(req).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&result.csv_paths[0]).unwrap(),
            "Alameda, 1.2\n"
        );
    }

    #[tokio::test]
    async fn test_service_rejects_invalid_request() {
        let req = GrabRequest::new("Precipitation", 2000, 1999).with_skip_download(true);

        let err = GrabberService::new().call(req).await.unwrap_err();

        assert!(matches!(err, ScraperError::Config(_)));
    }
}
