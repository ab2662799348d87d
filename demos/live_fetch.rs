//! 1郡・1ヶ月だけ実サイトから取得する動作確認
//!
//! 実行方法:
//! ```
//! COUNTY="Alameda County" cargo run --example live_fetch
//! ```

use chrono::Month;
use precip_grabber::{GrabRequest, GrabberService};
use tower::Service;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let county = std::env::var("COUNTY").unwrap_or_else(|_| "Alameda County".to_string());

    let request = GrabRequest::new("Precipitation", 2015, 2023)
        .with_months([Month::December])
        .with_counties([county])
        .with_data_root("./demo-data")
        .with_output_dir("./demo-output")
        .with_headless(false); // デバッグ用に表示モード

    println!("=== Live Fetch Test ===");

    match GrabberService::new().call(request).await {
        Ok(result) => {
            for path in &result.csv_paths {
                println!("成功! CSV保存先: {:?}", path);
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }
}
