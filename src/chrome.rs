//! chromiumoxide によるブラウザ操作

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GrabberConfig;
use crate::error::ScraperError;
use crate::traits::{DownloadEntry, DownloadsList, FormDriver};

/// 要素の表示判定（display/visibility と描画矩形で判断）
const IS_SHOWN_FN: &str = r#"
    function isShown(el) {
        if (!el) return false;
        var style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        return el.getClientRects().length > 0;
    }
"#;

/// ダウンロード一覧の先頭エントリ (downloads-manager > #downloadsList > #list > #frb0)
const TOP_DOWNLOAD_SCRIPT: &str = r#"
    (function() {
        __IS_SHOWN__
        var manager = document.querySelector('downloads-manager');
        if (!manager || !manager.shadowRoot) return null;
        var list = manager.shadowRoot.getElementById('downloadsList');
        if (!list) return null;
        var inner = list.querySelector('#list');
        if (!inner) return null;
        var top = inner.querySelector('#frb0');
        if (!top || !top.shadowRoot) return null;
        var root = top.shadowRoot;
        var name = root.querySelector('#file-link') || root.querySelector('#name');
        var status = Array.from(root.querySelectorAll("div[class='description']"));
        return {
            file_name: name ? name.textContent.trim() : null,
            status_visible: status.map(isShown)
        };
    })()
"#;

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// ブラウザを起動し、ダウンロード先を設定
    pub async fn launch(config: &GrabberConfig) -> Result<Self, ScraperError> {
        info!("Launching browser...");

        let download_dir = config.download_dir();
        std::fs::create_dir_all(&download_dir)?;
        let download_path = download_dir
            .canonicalize()
            .unwrap_or_else(|_| download_dir.clone());

        let chrome_path = config.chrome_executable.clone().or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok()
                .map(PathBuf::from)
        });

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-gpu")
            .arg("--blink-settings=imagesEnabled=false");

        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // サイトの命名 (data.json, data (1).json, ...) のまま保存させる
        let download_params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_path.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ダウンロード設定エラー: {}", e)))?;

        page.execute(download_params)
            .await
            .map_err(|e| ScraperError::BrowserInit(format!("ダウンロード設定エラー: {}", e)))?;

        info!("Browser ready, downloads go to {:?}", download_path);
        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

/// スクリプトを評価し、戻り値を `{ value: ... }` に包んで受け取る（null も取りこぼさない）
async fn eval<T: DeserializeOwned>(page: &Page, script: &str) -> Result<Option<T>, ScraperError> {
    #[derive(Deserialize)]
    struct Wrapped<T> {
        value: Option<T>,
    }

    let wrapped = format!("({{ value: {} }})", script.trim());
    let result: Wrapped<T> = page
        .evaluate(wrapped.as_str())
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value()
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
    Ok(result.value)
}

/// JS文字列リテラルとして埋め込む
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl FormDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn option_texts(&mut self, field_id: &str) -> Result<Option<Vec<String>>, ScraperError> {
        let script = format!(
            r#"
            (function() {{
                var el = document.getElementById({id});
                if (!el || !el.options) return null;
                return Array.from(el.options).map(function(o) {{ return o.text.trim(); }});
            }})()
            "#,
            id = js_string(field_id)
        );
        eval(&self.page, &script).await
    }

    async fn select_option(&mut self, field_id: &str, choice: &str) -> Result<bool, ScraperError> {
        let script = format!(
            r#"
            (function() {{
                var el = document.getElementById({id});
                if (!el || !el.options) return false;
                for (var i = 0; i < el.options.length; i++) {{
                    if (el.options[i].text.trim() === {choice}) {{
                        el.selectedIndex = i;
                        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        return true;
                    }}
                }}
                return false;
            }})()
            "#,
            id = js_string(field_id),
            choice = js_string(choice)
        );
        Ok(eval(&self.page, &script).await?.unwrap_or(false))
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScraperError> {
        let script = format!(
            "(function() {{ {} return isShown(document.querySelector({})); }})()",
            IS_SHOWN_FN,
            js_string(selector)
        );
        Ok(eval(&self.page, &script).await?.unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ScraperError::Navigation(format!("クリック失敗 {}: {}", selector, e)))?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?
            .scroll_into_view()
            .await
            .map_err(|e| ScraperError::JavaScript(format!("スクロール失敗 {}: {}", selector, e)))?;
        Ok(())
    }

    async fn screenshot_base64(&mut self) -> Option<String> {
        match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(png) => Some(base64::engine::general_purpose::STANDARD.encode(png)),
            Err(e) => {
                debug!("Screenshot failed: {}", e);
                None
            }
        }
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser...");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();

        info!("Browser closed");
        Ok(())
    }
}

#[async_trait]
impl DownloadsList for ChromeDriver {
    async fn top_download(&mut self) -> Result<DownloadEntry, ScraperError> {
        let script = TOP_DOWNLOAD_SCRIPT.replace("__IS_SHOWN__", IS_SHOWN_FN);
        let entry: Option<DownloadEntry> = eval(&self.page, &script).await?;
        entry.ok_or_else(|| ScraperError::ElementNotFound("ダウンロード一覧の先頭エントリ".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("location"), "\"location\"");
        assert_eq!(js_string("input[value='Plot']"), "\"input[value='Plot']\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_top_download_script_inlines_helper() {
        let script = TOP_DOWNLOAD_SCRIPT.replace("__IS_SHOWN__", IS_SHOWN_FN);
        assert!(script.contains("function isShown"));
        assert!(!script.contains("__IS_SHOWN__"));
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_live_single_county -- --ignored --nocapture
    async fn test_live_single_county() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info,precip_grabber=debug")
            .try_init();

        let dir = tempfile::tempdir().unwrap();
        let config = GrabberConfig::new("Precipitation", 2020, 2022)
            .with_months([chrono::Month::December])
            .with_counties(["Alameda County"])
            .with_data_root(dir.path().join("data"))
            .with_output_dir(dir.path().join("output"))
            .with_download_timeout(Some(Duration::from_secs(120)));

        let mut driver = ChromeDriver::launch(&config)
            .await
            .expect("Failed to launch browser");
        let result = crate::pipeline::run(&config, Some(&mut driver)).await;

        match result {
            Ok(result) => {
                println!("CSV: {:?}", result.csv_paths);
                for path in &result.csv_paths {
                    println!("{}", std::fs::read_to_string(path).unwrap());
                }
            }
            Err(e) => panic!("Grab failed: {:?}", e),
        }
    }
}
