use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::core::cache::TtlCache;
use crate::core::config::AnalystConfig;

pub const QUERY_API_URL: &str = "https://api.sec-api.io";
pub const PDF_API_URL: &str = "https://api.sec-api.io/filing-reader";

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingSearch {
    pub ticker: String,
    pub count: usize,
    pub filings: Vec<Value>,
}

/// Thin authenticated client for the sec-api.io query and filing-reader
/// endpoints. Rate-limit responses get bounded exponential backoff;
/// other failures surface immediately.
pub struct SecClient {
    client: Client,
    api_key: String,
    download_dir: PathBuf,
    max_retries: u32,
    retry_delay: Duration,
    cache: Option<Arc<TtlCache>>,
}

impl SecClient {
    pub fn new(config: &AnalystConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(SecClient {
            client,
            api_key: config.sec_api_key.clone(),
            download_dir: config.data_dir.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<TtlCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn ensure_api_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow!("SEC_API_KEY is not configured"));
        }
        Ok(())
    }

    pub async fn search_filings(
        &self,
        ticker: &str,
        form_type: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        limit: usize,
    ) -> Result<FilingSearch> {
        self.ensure_api_key()?;

        let query = build_query(ticker, form_type, start_date, end_date);
        let cache_key = format!("sec:search:{}:{}", query, limit);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&cache_key) {
                log::debug!("SEC search served from cache: {}", cache_key);
                return Ok(serde_json::from_value(hit)?);
            }
        }

        let payload = json!({
            "query": query,
            "from": "0",
            "size": limit.to_string(),
            "sort": [{"filedAt": {"order": "desc"}}],
        });

        log::info!("Searching filings for {}", ticker);
        let data = self.post_with_backoff(QUERY_API_URL, &payload).await?;

        let filings = data
            .get("filings")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default();
        log::info!("Found {} filings for {}", filings.len(), ticker);

        let result = FilingSearch {
            ticker: ticker.to_string(),
            count: filings.len(),
            filings,
        };

        if let Some(cache) = &self.cache {
            cache.put(&cache_key, serde_json::to_value(&result)?, SEARCH_CACHE_TTL);
        }

        Ok(result)
    }

    /// The most recent filing of the given form type, newest first.
    pub async fn get_recent_filing(&self, ticker: &str, form_type: &str) -> Result<Value> {
        let search = self
            .search_filings(ticker, Some(form_type), None, None, 1)
            .await?;
        search
            .filings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No {} filings found for {}", form_type, ticker))
    }

    pub async fn download_filing_as_pdf(
        &self,
        filing_url: &str,
        output_filename: Option<String>,
    ) -> Result<PathBuf> {
        self.ensure_api_key()?;
        std::fs::create_dir_all(&self.download_dir)?;

        let filename = output_filename.unwrap_or_else(|| default_pdf_filename(filing_url));
        let output_path = self.download_dir.join(filename);
        log::info!("Downloading filing as PDF to {:?}", output_path);

        let url = Url::parse_with_params(
            PDF_API_URL,
            &[("token", self.api_key.as_str()), ("url", filing_url)],
        )?;

        let mut attempt = 0;
        let bytes = loop {
            let response = self.client.get(url.clone()).send().await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let delay = self.retry_delay * 2u32.pow(attempt);
                log::warn!(
                    "SEC API rate limited, retrying in {:?} ({}/{})",
                    delay,
                    attempt + 1,
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            if !response.status().is_success() {
                return Err(anyhow!(
                    "PDF download failed with status {}",
                    response.status()
                ));
            }
            break response.bytes().await?;
        };

        std::fs::write(&output_path, &bytes)?;
        log::info!("Filing saved to {:?}", output_path);
        Ok(output_path)
    }

    pub async fn download_recent_filing_as_pdf(
        &self,
        ticker: &str,
        form_type: &str,
    ) -> Result<PathBuf> {
        let filing = self.get_recent_filing(ticker, form_type).await?;

        let filing_url = filing
            .get("linkToFilingDetails")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("No filing URL found for {} ({})", ticker, form_type))?;

        let form = filing
            .get("formType")
            .and_then(|v| v.as_str())
            .unwrap_or(form_type);
        let filed_date = filing
            .get("filedAt")
            .and_then(|v| v.as_str())
            .map(|s| s.chars().take(10).collect::<String>())
            .unwrap_or_else(|| "unknown_date".to_string());

        let filename = format!("{}_{}_{}.pdf", ticker, form, filed_date);
        self.download_filing_as_pdf(filing_url, Some(filename)).await
    }

    async fn post_with_backoff(&self, url: &str, payload: &Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(url)
                .header("Authorization", &self.api_key)
                .json(payload)
                .send()
                .await?;

            // Back off on rate limits only; other statuses fail fast.
            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let delay = self.retry_delay * 2u32.pow(attempt);
                log::warn!(
                    "SEC API rate limited, retrying in {:?} ({}/{})",
                    delay,
                    attempt + 1,
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if !response.status().is_success() {
                return Err(anyhow!(
                    "SEC API request failed with status {}",
                    response.status()
                ));
            }

            return Ok(response.json().await?);
        }
    }
}

pub(crate) fn build_query(
    ticker: &str,
    form_type: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> String {
    let mut query = format!("ticker:{}", ticker);
    if let Some(form) = form_type {
        query.push_str(&format!(" AND formType:\"{}\"", form));
    }
    if let (Some(start), Some(end)) = (start_date, end_date) {
        query.push_str(&format!(" AND filedAt:[{} TO {}]", start, end));
    }
    query
}

/// Date range for a calendar year or one of its quarters.
pub(crate) fn period_date_range(
    year: Option<i32>,
    quarter: Option<u32>,
) -> Option<(String, String)> {
    let year = year?;
    match quarter {
        Some(1) => Some((format!("{}-01-01", year), format!("{}-03-31", year))),
        Some(2) => Some((format!("{}-04-01", year), format!("{}-06-30", year))),
        Some(3) => Some((format!("{}-07-01", year), format!("{}-09-30", year))),
        Some(4) => Some((format!("{}-10-01", year), format!("{}-12-31", year))),
        _ => Some((format!("{}-01-01", year), format!("{}-12-31", year))),
    }
}

fn default_pdf_filename(filing_url: &str) -> String {
    let stem = filing_url
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .unwrap_or("filing");
    format!(
        "{}_{}.pdf",
        stem,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// One-line display form of a filing entry.
pub fn format_filing_summary(filing: &Value) -> String {
    let form_type = filing
        .get("formType")
        .and_then(|v| v.as_str())
        .unwrap_or("Неизвестный тип");
    let filed_date = filing
        .get("filedAt")
        .and_then(|v| v.as_str())
        .map(|s| s.chars().take(10).collect::<String>())
        .unwrap_or_else(|| "Неизвестная дата".to_string());
    let description = filing
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("Нет описания");

    let period = filing
        .get("periodOfReport")
        .and_then(|v| v.as_str())
        .map(|p| format!(" за период до {}", p))
        .unwrap_or_default();

    format!("{} от {}{}: {}", form_type, filed_date, period, description)
}

/// Display listing of a whole search result.
pub fn filing_list_summary(search: &FilingSearch) -> String {
    if search.count == 0 {
        return format!(
            "Для компании {} не найдено отчетов с указанными параметрами.",
            search.ticker
        );
    }

    let mut result = format!("Найдено {} отчетов для {}:\n\n", search.count, search.ticker);
    for (i, filing) in search.filings.iter().enumerate() {
        result.push_str(&format!("{}. {}\n", i + 1, format_filing_summary(filing)));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_with_optional_filters() {
        assert_eq!(build_query("AAPL", None, None, None), "ticker:AAPL");
        assert_eq!(
            build_query("AAPL", Some("10-Q"), None, None),
            "ticker:AAPL AND formType:\"10-Q\""
        );
        assert_eq!(
            build_query("AAPL", Some("10-K"), Some("2024-01-01"), Some("2024-12-31")),
            "ticker:AAPL AND formType:\"10-K\" AND filedAt:[2024-01-01 TO 2024-12-31]"
        );
    }

    #[test]
    fn period_ranges_cover_quarters_and_full_year() {
        assert_eq!(
            period_date_range(Some(2024), Some(2)),
            Some(("2024-04-01".to_string(), "2024-06-30".to_string()))
        );
        assert_eq!(
            period_date_range(Some(2024), None),
            Some(("2024-01-01".to_string(), "2024-12-31".to_string()))
        );
        assert_eq!(period_date_range(None, Some(1)), None);
    }

    #[test]
    fn filing_summary_formats_known_fields() {
        let filing = serde_json::json!({
            "formType": "10-Q",
            "filedAt": "2024-05-01T16:30:00-04:00",
            "periodOfReport": "2024-03-31",
            "description": "Quarterly report",
        });
        assert_eq!(
            format_filing_summary(&filing),
            "10-Q от 2024-05-01 за период до 2024-03-31: Quarterly report"
        );
    }

    #[test]
    fn empty_search_gets_a_notice() {
        let search = FilingSearch {
            ticker: "AAPL".to_string(),
            count: 0,
            filings: vec![],
        };
        assert!(filing_list_summary(&search).contains("не найдено"));
    }
}
