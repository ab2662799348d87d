use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Month;
use clap::Parser;
use tower::Service;
use tracing_subscriber::EnvFilter;

use precip_grabber::{GrabRequest, GrabberService};

/// カリフォルニア州の郡別気候データを取得して月別CSVにまとめる
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// 気候パラメータ
    #[arg(long, default_value = "Precipitation")]
    parameter: String,

    /// 対象月（複数指定可）
    #[arg(long = "month", value_parser = parse_month, default_value = "December")]
    months: Vec<Month>,

    #[arg(long, default_value_t = 1985)]
    start_year: i32,

    #[arg(long, default_value_t = 2023)]
    end_year: i32,

    /// 対象郡（省略時は全郡）
    #[arg(long = "county")]
    counties: Vec<String>,

    /// ダウンロード済みデータの集計のみ行う
    #[arg(long)]
    skip_download: bool,

    /// ブラウザを表示する
    #[arg(long)]
    show_browser: bool,

    /// 最初の失敗で中断する
    #[arg(long)]
    fail_fast: bool,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// ダウンロード完了待機の上限（秒）
    #[arg(long, value_name = "SECS")]
    download_timeout: Option<u64>,

    #[arg(long)]
    debug: bool,
}

fn parse_month(name: &str) -> Result<Month, String> {
    precip_grabber::plan::parse_month(name).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "info,precip_grabber=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let request = GrabRequest::new(cli.parameter, cli.start_year, cli.end_year)
        .with_months(cli.months)
        .with_counties(cli.counties)
        .with_skip_download(cli.skip_download)
        .with_data_root(cli.data_dir)
        .with_output_dir(cli.output_dir)
        .with_headless(!cli.show_browser)
        .with_debug(cli.debug)
        .with_fail_fast(cli.fail_fast)
        .with_download_timeout(cli.download_timeout.map(Duration::from_secs));

    let result = GrabberService::new().call(request).await?;

    if let Some(report) = &result.report {
        for failure in &report.failures {
            eprintln!(
                "失敗: {} {} - {}",
                failure.month.name(),
                failure.county,
                failure.error
            );
        }
    }
    for path in &result.csv_paths {
        println!("CSV保存先: {}", path.display());
    }

    Ok(())
}
