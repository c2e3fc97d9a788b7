use super::{
    HistoryWindow, PriceSource, RawRow, build_client, deserialize_f64_lenient, deserialize_volume_lenient,
    normalize_points,
};
use crate::errors::SourceError;
use crate::models::PricePoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

const SERIES_KEY: &str = "Time Series (Daily)";

// Alpha Vantage reports quota exhaustion as a 200 with a "Note" or "Information" message.
static RATE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate limit|call frequency|requests per (day|minute)|premium")
        .expect("rate limit pattern is valid")
});

#[derive(Deserialize, Debug)]
struct DailyBar {
    #[serde(rename = "4. close", default, deserialize_with = "deserialize_f64_lenient")]
    close: Option<f64>,
    #[serde(rename = "5. volume", default, deserialize_with = "deserialize_volume_lenient")]
    volume: Option<u64>,
}

/// `TIME_SERIES_DAILY` client for a single symbol.
pub struct AlphaVantageSource {
    client: Client,
    base_url: String,
    symbol: String,
    api_key: String,
    window: HistoryWindow,
}

impl AlphaVantageSource {
    pub fn new(
        base_url: &str,
        symbol: &str,
        api_key: &str,
        window: HistoryWindow,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_string(),
            api_key: api_key.to_string(),
            window,
        })
    }
}

#[async_trait]
impl PriceSource for AlphaVantageSource {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn fetch(&self) -> Result<Vec<PricePoint>, SourceError> {
        let url = format!("{}/query", self.base_url);
        debug!(
            "GET {}?function=TIME_SERIES_DAILY&symbol={}&outputsize=full&apikey=***",
            url, self.symbol
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", self.symbol.as_str()),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(SourceError::Http(status));
        }

        let body = response.bytes().await?;
        parse_daily_payload(&body, &self.window)
    }
}

/// Parses a `TIME_SERIES_DAILY` JSON body into closes and volumes inside `window`.
pub fn parse_daily_payload(body: &[u8], window: &HistoryWindow) -> Result<Vec<PricePoint>, SourceError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(SourceError::InvalidCredential(message.to_string()));
    }
    for key in ["Note", "Information"] {
        if let Some(message) = payload.get(key).and_then(Value::as_str) {
            return Err(classify_notice(message));
        }
    }

    let series = payload
        .get(SERIES_KEY)
        .cloned()
        .ok_or_else(|| SourceError::Malformed(format!("missing \"{}\"", SERIES_KEY)))?;
    let bars: HashMap<String, Value> =
        serde_json::from_value(series).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if bars.is_empty() {
        return Err(SourceError::Malformed("empty time series".into()));
    }

    let mut unparsable = 0;
    let rows: Vec<RawRow> = bars
        .into_iter()
        .filter_map(|(date, bar)| {
            let parsed = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .ok()
                .zip(serde_json::from_value::<DailyBar>(bar).ok());
            if parsed.is_none() {
                unparsable += 1;
            }
            parsed.map(|(date, bar)| (date, bar.close, bar.volume))
        })
        .collect();

    let (points, discarded) = normalize_points(rows, window);
    if unparsable + discarded > 0 {
        debug!(
            "Discarded {} unparsable and {} out-of-range or non-trading rows",
            unparsable, discarded
        );
    }
    if unparsable > 0 {
        warn!("Skipped {} malformed rows in Alpha Vantage payload", unparsable);
    }
    Ok(points)
}

fn classify_notice(message: &str) -> SourceError {
    if RATE_LIMIT_RE.is_match(message) {
        SourceError::RateLimited(message.to_string())
    } else {
        SourceError::InvalidCredential(message.to_string())
    }
}
