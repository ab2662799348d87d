//! 取得 → 集計 の全体フロー

use std::path::PathBuf;

use tracing::{info, warn};

use crate::aggregate::{Aggregator, RecordSource};
use crate::config::GrabberConfig;
use crate::error::ScraperError;
use crate::fetch::{discover_counties, FetchLoop, FetchReport};
use crate::manifest::Manifest;
use crate::plan::FetchPlan;
use crate::traits::{DownloadsList, FormDriver};

/// 実行結果
#[derive(Debug)]
pub struct GrabResult {
    /// 作成した月別CSV
    pub csv_paths: Vec<PathBuf>,
    /// ダウンロードを行った場合の取得結果
    pub report: Option<FetchReport>,
}

/// 全体を実行する
///
/// `driver` がある場合は郡の取得・ダウンロードに使い、終了後に閉じる。
/// ない場合は設定またはマニフェストの郡一覧で集計のみ行う。
pub async fn run<D>(
    config: &GrabberConfig,
    driver: Option<&mut D>,
) -> Result<GrabResult, ScraperError>
where
    D: FormDriver + DownloadsList,
{
    config.validate()?;

    let (plan, report) = match driver {
        Some(driver) => {
            let outcome = browse(driver, config).await;
            if let Err(e) = driver.close().await {
                warn!("Failed to close browser: {}", e);
            }
            outcome?
        }
        None => (offline_plan(config)?, None),
    };

    info!("Aggregating {} month(s) for {} counties", plan.months().len(), plan.counties().len());
    let source = RecordSource::detect(config)?;
    let csv_paths = Aggregator::new(config, &plan, source).run()?;

    Ok(GrabResult { csv_paths, report })
}

/// ブラウザを使う段階: 郡の確定とダウンロード
async fn browse<D>(
    driver: &mut D,
    config: &GrabberConfig,
) -> Result<(FetchPlan, Option<FetchReport>), ScraperError>
where
    D: FormDriver + DownloadsList,
{
    let counties = if config.counties.is_empty() {
        discover_counties(driver, config).await?
    } else {
        config.counties.clone()
    };
    let plan = FetchPlan::new(counties, config.months.clone());

    if config.skip_download {
        info!("Skipping download");
        return Ok((plan, None));
    }

    let report = FetchLoop::new(driver, config).run(&plan).await?;
    info!(
        "Fetch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failures.len()
    );
    Ok((plan, Some(report)))
}

/// ブラウザなしで郡一覧を決める
fn offline_plan(config: &GrabberConfig) -> Result<FetchPlan, ScraperError> {
    let counties = if !config.counties.is_empty() {
        config.counties.clone()
    } else {
        match Manifest::load(&config.download_dir())? {
            Some(manifest) => manifest.counties(),
            None => {
                return Err(ScraperError::Config(
                    "郡が指定されておらず、マニフェストもありません".into(),
                ))
            }
        }
    };
    Ok(FetchPlan::new(counties, config.months.clone()))
}
