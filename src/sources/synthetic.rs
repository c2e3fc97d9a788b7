use super::{HistoryWindow, PriceSource, is_trading_day};
use crate::errors::SourceError;
use crate::models::PricePoint;
use crate::settings::{SampleConfig, Settings};
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::ops::RangeInclusive;

const VOLUME_RANGE: RangeInclusive<u64> = 5_000_000..=30_000_000;

/// Seeded random walk over weekdays, used when no real data is available.
///
/// Each trading day applies a normally distributed percent return to the
/// previous price and clamps the result to the configured band. Volume is
/// drawn uniformly from a plausible ETF range. The same seed and window
/// always produce the same series.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    params: SampleConfig,
    window: HistoryWindow,
}

impl SyntheticSource {
    pub fn new(params: SampleConfig, window: HistoryWindow) -> Self {
        Self { params, window }
    }

    /// Window ends at `sample.end_date`, or `today` when unset.
    pub fn from_settings(settings: &Settings, today: NaiveDate) -> Self {
        let end = settings.sample.end_date.unwrap_or(today);
        let window = HistoryWindow::ending_at(end, settings.source.history_years);
        Self::new(settings.sample.clone(), window)
    }

    pub fn generate(&self) -> Vec<PricePoint> {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut price = self.params.start_price;
        let mut points = Vec::new();

        for date in self.window.start.iter_days().take_while(|d| *d <= self.window.end) {
            if !is_trading_day(date) {
                continue;
            }
            let z: f64 = rng.sample(StandardNormal);
            let change_pct = z * self.params.daily_volatility_pct;
            price *= 1.0 + change_pct / 100.0;
            price = price.clamp(self.params.min_price, self.params.max_price);

            let volume = rng.gen_range(VOLUME_RANGE);

            points.push(PricePoint::new(date, round_cents(price)).with_volume(Some(volume)));
        }

        points
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl PriceSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch(&self) -> Result<Vec<PricePoint>, SourceError> {
        Ok(self.generate())
    }
}
