use super::{
    HistoryWindow, PriceSource, build_client, deserialize_f64_lenient, deserialize_volume_lenient,
    normalize_points,
};
use crate::errors::SourceError;
use crate::models::PricePoint;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    #[serde(default)]
    close: Vec<NullableF64>,
    #[serde(default)]
    volume: Vec<NullableU64>,
}

#[derive(Debug)]
struct NullableF64(Option<f64>);

impl<'de> Deserialize<'de> for NullableF64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_f64_lenient(deserializer).map(NullableF64)
    }
}

#[derive(Debug)]
struct NullableU64(Option<u64>);

impl<'de> Deserialize<'de> for NullableU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_volume_lenient(deserializer).map(NullableU64)
    }
}

/// Credential-free daily chart endpoint.
pub struct YahooChartSource {
    client: Client,
    base_url: String,
    symbol: String,
    window: HistoryWindow,
}

impl YahooChartSource {
    pub fn new(
        base_url: &str,
        symbol: &str,
        window: HistoryWindow,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_string(),
            window,
        })
    }
}

#[async_trait]
impl PriceSource for YahooChartSource {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn fetch(&self) -> Result<Vec<PricePoint>, SourceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, self.symbol);
        let period1 = self.window.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = self
            .window
            .end
            .succ_opt()
            .unwrap_or(self.window.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        debug!("GET {} period1={} period2={}", url, period1, period2);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
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
        parse_chart_payload(&body, &self.window)
    }
}

/// Parses a chart JSON body. `timestamp` and `close` are parallel arrays;
/// `volume` is optional and a short or missing array leaves volumes empty.
pub fn parse_chart_payload(body: &[u8], window: &HistoryWindow) -> Result<Vec<PricePoint>, SourceError> {
    let response: ChartResponse =
        serde_json::from_slice(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if let Some(err) = response.chart.error {
        let message = format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        );
        return Err(SourceError::InvalidCredential(message));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| SourceError::Malformed("chart has no result".into()))?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Malformed("chart has no quote block".into()))?;
    let (closes, volumes) = (quote.close, quote.volume);

    if result.timestamp.is_empty() {
        return Err(SourceError::Malformed("empty chart".into()));
    }
    if closes.len() != result.timestamp.len() {
        return Err(SourceError::Malformed(format!(
            "{} timestamps but {} closes",
            result.timestamp.len(),
            closes.len()
        )));
    }

    let rows = result
        .timestamp
        .iter()
        .zip(closes)
        .enumerate()
        .filter_map(|(i, (ts, close))| {
            let volume = volumes.get(i).and_then(|v| v.0);
            Some((utc_date(*ts)?, close.0, volume))
        });

    let (points, discarded) = normalize_points(rows, window);
    debug!("Discarded {} empty or non-trading chart rows", discarded);
    Ok(points)
}

fn utc_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> HistoryWindow {
        HistoryWindow::ending_at(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), 10)
    }

    #[test]
    fn test_parses_parallel_arrays() {
        // 2024-01-02, 2024-01-03, 2024-01-04 at 14:30 UTC.
        let body = br#"{"chart": {"result": [{
            "meta": {"symbol": "SLV"},
            "timestamp": [1704205800, 1704292200, 1704378600],
            "indicators": {"quote": [{"close": [21.0, null, 21.75], "volume": [1, 2, 3]}]}
        }], "error": null}}"#;

        let points = parse_chart_payload(body, &window()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(points[1].close, 21.75);
        assert_eq!(points[0].volume, Some(1));
        assert_eq!(points[1].volume, Some(3));
    }

    #[test]
    fn test_missing_volume_array_is_tolerated() {
        let body = br#"{"chart": {"result": [{
            "timestamp": [1704205800, 1704292200],
            "indicators": {"quote": [{"close": [21.0, 21.5], "volume": [null]}]}
        }], "error": null}}"#;

        let points = parse_chart_payload(body, &window()).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.volume.is_none()));
    }

    #[test]
    fn test_chart_error_is_reported() {
        let body = br#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_payload(body, &window()).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_mismatched_arrays_are_malformed() {
        let body = br#"{"chart": {"result": [{
            "timestamp": [1704205800, 1704292200],
            "indicators": {"quote": [{"close": [21.0]}]}
        }], "error": null}}"#;
        assert!(matches!(
            parse_chart_payload(body, &window()),
            Err(SourceError::Malformed(_))
        ));
    }
}
