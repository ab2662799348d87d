//! ダウンロードしたJSONを月別CSVに集計

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Month;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use crate::config::GrabberConfig;
use crate::error::ScraperError;
use crate::manifest::Manifest;
use crate::plan::{data_key, positional_file_name, FetchPlan};

/// 1データ点
#[derive(Debug, Clone, Deserialize)]
pub struct DataPoint {
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// ダウンロードされたJSONファイル
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadedRecord {
    pub data: HashMap<String, DataPoint>,
}

impl DownloadedRecord {
    pub fn load(path: &Path) -> Result<Self, ScraperError> {
        if !path.exists() {
            return Err(ScraperError::MissingFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn value(&self, year: i32, month: Month) -> Option<&str> {
        self.data.get(&data_key(year, month)).map(|p| p.value.as_str())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "value must be a string or number, got {}",
            other
        ))),
    }
}

/// 郡と各年の値を1行にする
pub fn format_row(county: &str, values: &[String]) -> String {
    let mut row = county.to_string();
    for value in values {
        row.push_str(", ");
        row.push_str(value);
    }
    row
}

/// 出力ファイル名: `"<parameter>: <Month>, <start>-<end>.csv"`
pub fn output_file_name(config: &GrabberConfig, month: Month) -> String {
    format!(
        "{}: {}, {}-{}.csv",
        config.parameter,
        month.name(),
        config.year_start,
        config.year_end
    )
}

/// 入力ファイルの特定方法
#[derive(Debug, Clone)]
pub enum RecordSource {
    /// マニフェストの記録に従う
    Manifest(Manifest),
    /// ダウンロード順の連番ファイル名から推定
    Positional,
}

impl RecordSource {
    /// マニフェストがあり、同じ取得条件ならそれを使う
    pub fn detect(config: &GrabberConfig) -> Result<Self, ScraperError> {
        match Manifest::load(&config.download_dir())? {
            Some(manifest) if manifest.matches(config) => Ok(Self::Manifest(manifest)),
            Some(_) => {
                warn!("Manifest does not match parameter/year range, using positional file names");
                Ok(Self::Positional)
            }
            None => Ok(Self::Positional),
        }
    }
}

pub struct Aggregator<'a> {
    config: &'a GrabberConfig,
    plan: &'a FetchPlan,
    source: RecordSource,
    download_dir: PathBuf,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a GrabberConfig, plan: &'a FetchPlan, source: RecordSource) -> Self {
        Self {
            config,
            plan,
            source,
            download_dir: config.download_dir(),
        }
    }

    fn source_path(
        &self,
        county_index: usize,
        month_index: usize,
        county: &str,
        month: Month,
    ) -> Result<PathBuf, ScraperError> {
        match &self.source {
            RecordSource::Positional => Ok(self.download_dir.join(positional_file_name(
                county_index,
                month_index,
                self.plan.months().len(),
            ))),
            RecordSource::Manifest(manifest) => manifest
                .entry(county, month)
                .and_then(|e| e.file.as_ref())
                .map(|file| self.download_dir.join(file))
                .ok_or_else(|| {
                    ScraperError::MissingFile(
                        self.download_dir
                            .join(format!("<{} {}>", county, month.name())),
                    )
                }),
        }
    }

    /// 1ヶ月分の行を作成（郡の並び順どおり）
    pub fn month_rows(&self, month_index: usize, month: Month) -> Result<Vec<String>, ScraperError> {
        let mut rows = Vec::with_capacity(self.plan.counties().len());

        for (county_index, county) in self.plan.counties().iter().enumerate() {
            let path = self.source_path(county_index, month_index, county, month)?;
            let record = DownloadedRecord::load(&path)?;
            debug!("Reading {} {} from {:?}", county, month.name(), path);

            let values = self
                .config
                .years()
                .map(|year| {
                    record
                        .value(year, month)
                        .map(str::to_string)
                        .ok_or_else(|| ScraperError::MissingValue {
                            file: path.clone(),
                            key: data_key(year, month),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            rows.push(format_row(county, &values));
        }

        Ok(rows)
    }

    /// 月ごとにCSVを書き出し、作成したパスを返す
    pub fn run(&self) -> Result<Vec<PathBuf>, ScraperError> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let mut written = Vec::with_capacity(self.plan.months().len());

        for (month_index, month) in self.plan.months().iter().enumerate() {
            let rows = self.month_rows(month_index, *month)?;
            let out_path = self
                .config
                .output_dir
                .join(output_file_name(self.config, *month));

            let mut content = rows.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            std::fs::write(&out_path, content)?;

            info!("Wrote {} rows to {:?}", rows.len(), out_path);
            written.push(out_path);
        }

        Ok(written)
    }
}
