//! 郡別気候データ取得ライブラリ
//!
//! - NOAA Climate at a Glance のフォームをブラウザで操作し、郡 × 月ごとにJSONをダウンロード
//! - ダウンロードしたJSONを月別CSVに集計
//!
//! # 使用例
//!
//! ```rust,ignore
//! use precip_grabber::{GrabRequest, GrabberService};
//! use chrono::Month;
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = GrabberService::new();
//!
//!     let request = GrabRequest::new("Precipitation", 1985, 2023)
//!         .with_months([Month::December])
//!         .with_headless(false);
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("CSV written: {:?}", result.csv_paths);
//! }
//! ```
//!
//! # ブラウザなしで集計のみ
//!
//! ```rust,ignore
//! use precip_grabber::{pipeline, ChromeDriver, GrabberConfig};
//!
//! let config = GrabberConfig::new("Precipitation", 1985, 2023)
//!     .with_counties(["Alameda County", "Yolo County"])
//!     .with_skip_download(true);
//! let result = pipeline::run::<ChromeDriver>(&config, None).await?;
//! ```

pub mod aggregate;
pub mod chrome;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod pipeline;
pub mod plan;
pub mod selector;
pub mod service;
pub mod traits;
pub mod watcher;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use chrome::ChromeDriver;
pub use config::{ErrorPolicy, GrabberConfig};
pub use error::ScraperError;
pub use fetch::{FetchLoop, FetchReport, TaskFailure};
pub use manifest::Manifest;
pub use pipeline::GrabResult;
pub use plan::{FetchPlan, FetchTask};
pub use service::{GrabRequest, GrabberService};
pub use traits::{DownloadEntry, DownloadsList, FormDriver};
