//! 郡 × 月ごとのデータ取得ループ

use chrono::Month;
use tracing::{debug, error, info, warn};

use crate::config::{ErrorPolicy, GrabberConfig};
use crate::download::DownloadDir;
use crate::error::ScraperError;
use crate::manifest::Manifest;
use crate::plan::{FetchPlan, FetchTask};
use crate::selector::{make_selection, wait_for_options};
use crate::traits::{DownloadsList, FormDriver};
use crate::watcher;

/// フォームのドロップダウンID
pub const PARAMETER_FIELD: &str = "parameter";
pub const TIMESCALE_FIELD: &str = "timescale";
pub const MONTH_FIELD: &str = "month";
pub const BEGIN_YEAR_FIELD: &str = "begyear";
pub const END_YEAR_FIELD: &str = "endyear";
pub const STATE_FIELD: &str = "state";
pub const LOCATION_FIELD: &str = "location";

/// グラフ作成ボタン（押すとデータリンクが生成される）
pub const PLOT_BUTTON: &str = "input[value='Plot']";
pub const JSON_DOWNLOAD_LINK: &str = "span#data-access > a#json-download";
pub const DOWNLOADS_URL: &str = "chrome://downloads";

/// 失敗したタスク
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub county: String,
    pub month: Month,
    pub error: String,
}

/// 取得結果
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// 以前の取得分も含むマニフェスト
    pub manifest: Manifest,
    /// 今回実行したタスク数
    pub tasks: usize,
    pub failures: Vec<TaskFailure>,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.tasks - self.failures.len()
    }
}

/// 州を選択して郡の選択肢を全て取得
pub async fn discover_counties<D>(
    driver: &mut D,
    config: &GrabberConfig,
) -> Result<Vec<String>, ScraperError>
where
    D: FormDriver + ?Sized,
{
    info!("Discovering counties for {}...", config.state);
    driver.navigate(&config.source_url).await?;
    make_selection(driver, STATE_FIELD, &config.state, config.select_timeout).await?;

    let counties = wait_for_options(driver, LOCATION_FIELD, config.select_timeout).await?;
    info!("Found {} counties", counties.len());
    Ok(counties)
}

pub struct FetchLoop<'a, D> {
    driver: &'a mut D,
    config: &'a GrabberConfig,
    downloads: DownloadDir,
}

impl<'a, D> FetchLoop<'a, D>
where
    D: FormDriver + DownloadsList,
{
    pub fn new(driver: &'a mut D, config: &'a GrabberConfig) -> Self {
        Self {
            driver,
            config,
            downloads: DownloadDir::new(config.download_dir()),
        }
    }

    /// 全タスクを順番に実行
    ///
    /// マニフェストは各タスク後に保存する。同じパラメータ・期間の既存マニフェストには追記する。
    pub async fn run(&mut self, plan: &FetchPlan) -> Result<FetchReport, ScraperError> {
        self.downloads.create()?;
        let mut manifest = self.existing_manifest()?;
        let mut failures = Vec::new();
        let total = plan.len();

        info!(
            "Fetching {} x {} ({} task(s)) into {:?}",
            plan.counties().len(),
            plan.months().len(),
            total,
            self.downloads.path()
        );

        for (i, task) in plan.tasks().enumerate() {
            info!(
                "[{}/{}] {} {} {}",
                i + 1,
                total,
                self.config.parameter,
                task.month.name(),
                task.county
            );

            match self.run_task(&task).await {
                Ok(file) => manifest.record(&task, Some(file)),
                Err(e) => {
                    error!(
                        "Task failed for {{{}, {}, {}}}: {}",
                        self.config.parameter,
                        task.month.name(),
                        task.county,
                        e
                    );
                    self.log_screenshot().await;
                    manifest.record(&task, None);

                    if self.config.error_policy == ErrorPolicy::FailFast {
                        manifest.save(self.downloads.path())?;
                        return Err(ScraperError::Task {
                            county: task.county,
                            month: task.month.name().to_string(),
                            source: Box::new(e),
                        });
                    }

                    failures.push(TaskFailure {
                        county: task.county.clone(),
                        month: task.month,
                        error: e.to_string(),
                    });
                }
            }

            manifest.save(self.downloads.path())?;
        }

        if !failures.is_empty() {
            warn!("{} of {} task(s) failed", failures.len(), total);
        }

        Ok(FetchReport {
            manifest,
            tasks: total,
            failures,
        })
    }

    fn existing_manifest(&self) -> Result<Manifest, ScraperError> {
        match Manifest::load(self.downloads.path())? {
            Some(manifest) if manifest.matches(self.config) => {
                info!(
                    "Appending to existing manifest ({} entries)",
                    manifest.entries.len()
                );
                Ok(manifest)
            }
            Some(_) => {
                warn!("Existing manifest is for a different parameter/year range, replacing it");
                Ok(Manifest::new(self.config))
            }
            None => Ok(Manifest::new(self.config)),
        }
    }

    /// 1タスク分: フォーム入力 → リンク生成 → ダウンロード → 完了待機
    async fn run_task(&mut self, task: &FetchTask) -> Result<String, ScraperError> {
        let timeout = self.config.select_timeout;
        let before = self.downloads.snapshot()?;

        // 毎回読み込み直して前回の選択をクリア
        self.driver.navigate(&self.config.source_url).await?;

        let year_start = self.config.year_start.to_string();
        let year_end = self.config.year_end.to_string();
        let selections = [
            (PARAMETER_FIELD, self.config.parameter.as_str()),
            (TIMESCALE_FIELD, self.config.timescale.as_str()),
            (MONTH_FIELD, task.month.name()),
            (BEGIN_YEAR_FIELD, year_start.as_str()),
            (END_YEAR_FIELD, year_end.as_str()),
            (STATE_FIELD, self.config.state.as_str()),
            (LOCATION_FIELD, task.county.as_str()),
        ];
        for (field, choice) in selections {
            make_selection(&mut *self.driver, field, choice, timeout).await?;
        }

        self.driver.wait_visible(PLOT_BUTTON, timeout).await?;
        self.driver.click(PLOT_BUTTON).await?;
        debug!("Plot requested");

        // リンクは画面内にないとクリックできない
        self.driver.wait_visible(JSON_DOWNLOAD_LINK, timeout).await?;
        self.driver.scroll_into_view(JSON_DOWNLOAD_LINK).await?;
        self.driver.click(JSON_DOWNLOAD_LINK).await?;
        debug!("JSON download link clicked");

        self.driver.navigate(DOWNLOADS_URL).await?;
        let listed = match watcher::wait_until_idle(
            &mut *self.driver,
            self.config.poll_interval,
            self.config.download_timeout,
        )
        .await
        {
            Ok(idle) => idle.file_name,
            Err(e) => {
                warn!(
                    "Failed checking downloads for {{{}, {}, {}}}: {}",
                    self.config.parameter,
                    task.month.name(),
                    task.county,
                    e
                );
                None
            }
        };

        self.downloads
            .await_new_file(&before, listed.as_deref(), self.config.poll_interval)
            .await
    }

    async fn log_screenshot(&mut self) {
        if !self.config.debug {
            return;
        }
        if let Some(encoded) = self.driver.screenshot_base64().await {
            debug!("Failure screenshot: data:image/png;base64,{}", encoded);
        }
    }
}
