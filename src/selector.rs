//! ドロップダウン選択

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use crate::error::ScraperError;
use crate::traits::{FormDriver, VISIBILITY_POLL};

/// 選択肢が現れるまで待ってから選択する
pub async fn make_selection<D>(
    driver: &mut D,
    field_id: &str,
    choice: &str,
    timeout: Duration,
) -> Result<(), ScraperError>
where
    D: FormDriver + ?Sized,
{
    let start = Instant::now();
    let mut element_seen = false;

    loop {
        if let Some(options) = driver.option_texts(field_id).await? {
            element_seen = true;
            if options.iter().any(|o| o == choice) && driver.select_option(field_id, choice).await? {
                debug!("Selected {} = {}", field_id, choice);
                return Ok(());
            }
        }

        if start.elapsed() >= timeout {
            return Err(if element_seen {
                ScraperError::OptionNotFound {
                    field: field_id.to_string(),
                    choice: choice.to_string(),
                }
            } else {
                ScraperError::ElementNotFound(format!("ドロップダウン #{}", field_id))
            });
        }

        sleep(VISIBILITY_POLL.min(timeout)).await;
    }
}

/// 空でない選択肢が読み込まれるまで待機
pub async fn wait_for_options<D>(
    driver: &mut D,
    field_id: &str,
    timeout: Duration,
) -> Result<Vec<String>, ScraperError>
where
    D: FormDriver + ?Sized,
{
    let start = Instant::now();

    loop {
        let options: Vec<String> = driver
            .option_texts(field_id)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|o| !o.is_empty())
            .collect();

        if !options.is_empty() {
            return Ok(options);
        }

        if start.elapsed() >= timeout {
            return Err(ScraperError::Timeout(format!(
                "ドロップダウン #{} の選択肢が読み込まれませんでした",
                field_id
            )));
        }

        sleep(VISIBILITY_POLL.min(timeout)).await;
    }
}
