use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AnalystConfig {
    /// sec-api.io key. May be empty; SEC tools then fail with a
    /// structured error instead of at startup.
    pub sec_api_key: String,
    pub database_url: String,
    pub bybit_testnet: bool,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub data_dir: PathBuf,
}

impl AnalystConfig {
    pub fn from_env() -> Result<Self> {
        let sec_api_key = std::env::var("SEC_API_KEY").unwrap_or_default();

        let database_url = std::env::var("ANALYST_DB")
            .unwrap_or_else(|_| "sqlite://trades.db?mode=rwc".to_string());

        let bybit_testnet = std::env::var("BYBIT_TESTNET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let request_timeout = Duration::from_secs(
            std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        let max_retries = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let retry_delay = Duration::from_secs(
            std::env::var("RETRY_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        );

        let data_dir = PathBuf::from(
            std::env::var("ANALYST_DATA_DIR").unwrap_or_else(|_| "downloaded_filings".to_string()),
        );

        Ok(Self {
            sec_api_key,
            database_url,
            bybit_testnet,
            request_timeout,
            max_retries,
            retry_delay,
            data_dir,
        })
    }
}
