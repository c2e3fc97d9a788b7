//! Price data sources.
//!
//! Each provider implements [`PriceSource`]. [`resolve_series`] picks one from
//! the settings, retries a transient failure once and otherwise degrades to the
//! synthetic series so a run always has data to analyze.

pub mod alpha_vantage;
pub mod synthetic;
pub mod yahoo;

use crate::errors::SourceError;
use crate::models::{DataOrigin, PricePoint};
use crate::settings::{Provider, Settings};
use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::Deserializer;
use serde::de::{self, Visitor};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

pub use alpha_vantage::AlphaVantageSource;
pub use synthetic::SyntheticSource;
pub use yahoo::YahooChartSource;

/// Minimum number of closes needed to compute at least one change.
pub const MIN_POINTS: usize = 2;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Human-readable provider name recorded in the output metadata.
    fn name(&self) -> &str;

    /// Returns closes ascending by date with no duplicate dates.
    async fn fetch(&self) -> Result<Vec<PricePoint>, SourceError>;
}

/// The inclusive window of dates a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    pub fn ending_at(end: NaiveDate, years: u32) -> Self {
        let start = end
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A provider row before validation: date, close and optional volume.
pub(crate) type RawRow = (NaiveDate, Option<f64>, Option<u64>);

/// Drops weekend, out-of-window and non-positive rows, and orders the rest by date.
///
/// Later entries for the same date replace earlier ones. Returns the kept points
/// and how many rows were discarded.
pub(crate) fn normalize_points<I>(rows: I, window: &HistoryWindow) -> (Vec<PricePoint>, usize)
where
    I: IntoIterator<Item = RawRow>,
{
    let mut by_date = BTreeMap::new();
    let mut discarded = 0;

    for (date, close, volume) in rows {
        match close {
            Some(c) if c.is_finite() && c > 0.0 && is_trading_day(date) && window.contains(date) => {
                by_date.insert(date, PricePoint::new(date, c).with_volume(volume));
            }
            _ => discarded += 1,
        }
    }

    (by_date.into_values().collect(), discarded)
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("Mozilla/5.0 (compatible; price-movers)")
        .build()?;
    Ok(client)
}

/// Selects the configured source and fetches the series, falling back to synthetic data.
///
/// Never fails: every [`SourceError`] ends in the synthetic path with a warning.
pub async fn resolve_series(
    settings: &Settings,
    api_key: Option<&str>,
    today: NaiveDate,
) -> (Vec<PricePoint>, DataOrigin) {
    let synthetic = SyntheticSource::from_settings(settings, today);
    let timeout = Duration::from_secs(settings.source.timeout_secs);
    let window = HistoryWindow::ending_at(today, settings.source.history_years);
    let symbol = settings.instrument.symbol.as_str();

    let remote: Box<dyn PriceSource> = match settings.source.provider {
        Provider::Synthetic => {
            return use_synthetic(&synthetic, "synthetic provider selected in configuration");
        }
        Provider::AlphaVantage => match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => match AlphaVantageSource::new(
                &settings.source.alpha_vantage_url,
                symbol,
                key,
                window,
                timeout,
            ) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    warn!("Could not build HTTP client: {}", e);
                    return use_synthetic(&synthetic, &e.to_string());
                }
            },
            None => {
                warn!(
                    "No Alpha Vantage API key supplied; using SAMPLE data, not real {} prices",
                    symbol
                );
                return use_synthetic(&synthetic, "no API key supplied");
            }
        },
        Provider::Yahoo => {
            match YahooChartSource::new(&settings.source.yahoo_url, symbol, window, timeout) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    warn!("Could not build HTTP client: {}", e);
                    return use_synthetic(&synthetic, &e.to_string());
                }
            }
        }
    };

    match fetch_with_retry(remote.as_ref()).await {
        Ok(points) => {
            info!(
                "Retrieved {} days of {} data from {}",
                points.len(),
                symbol,
                remote.name()
            );
            let origin = DataOrigin::Remote {
                provider: remote.name().to_string(),
            };
            (points, origin)
        }
        Err(e) => {
            warn!(
                "{} request failed ({}); falling back to SAMPLE data, not real prices",
                remote.name(),
                e
            );
            use_synthetic(&synthetic, &format!("{} unavailable: {}", remote.name(), e))
        }
    }
}

/// One attempt, plus a single retry when the failure looks transient.
pub async fn fetch_with_retry(source: &dyn PriceSource) -> Result<Vec<PricePoint>, SourceError> {
    let result = match source.fetch().await {
        Err(e) if e.is_retryable() => {
            warn!("{} request failed ({}); retrying once", source.name(), e);
            source.fetch().await
        }
        other => other,
    };

    let points = result?;
    if points.len() < MIN_POINTS {
        return Err(SourceError::InsufficientData(points.len()));
    }
    Ok(points)
}

fn use_synthetic(source: &SyntheticSource, reason: &str) -> (Vec<PricePoint>, DataOrigin) {
    let points = source.generate();
    info!(
        "Generated {} days of sample data ({} to {})",
        points.len(),
        points.first().map(|p| p.date.to_string()).unwrap_or_default(),
        points.last().map(|p| p.date.to_string()).unwrap_or_default(),
    );
    let origin = DataOrigin::Synthetic {
        reason: reason.to_string(),
    };
    (points, origin)
}

// --- Lenient number parsing ---
// Providers send closes as JSON numbers, numeric strings or null.

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    // Unparsable text counts as a missing value so one bad row cannot sink the payload.
    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(v.trim().parse::<f64>().ok())
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

pub(crate) fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

/// Volumes arrive in the same shapes as closes. Negative or fractional
/// junk is treated as missing rather than truncated.
pub(crate) fn deserialize_volume_lenient<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_f64_lenient(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u64))
}
