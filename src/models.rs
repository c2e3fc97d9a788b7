use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One trading day's close and, when the provider reports it, traded volume.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<u64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: Option<u64>) -> Self {
        self.volume = volume;
        self
    }
}

/// Change of one close against the previous trading day's close.
///
/// `volume` is the volume of the later day. It is not part of the CSV dumps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ChangeRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub change_abs: f64,
    pub change_pct: f64,
    #[serde(default)]
    pub volume: Option<u64>,
}

/// A ranked change with its distance from the mean in standard deviations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RankedRecord {
    pub rank: usize,
    #[serde(flatten)]
    pub record: ChangeRecord,
    pub sigma: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub max_gain: ChangeRecord,
    pub max_loss: ChangeRecord,
    pub mean_change_pct: f64,
    pub std_dev_change_pct: f64,
    pub total_days: usize,
}

/// Output of the ranking step.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub gains: Vec<RankedRecord>,
    pub losses: Vec<RankedRecord>,
    pub stats: SummaryStats,
}

/// Where a price series came from. Synthetic data is never presented as real.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataOrigin {
    Remote { provider: String },
    Synthetic { reason: String },
}

impl DataOrigin {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, DataOrigin::Synthetic { .. })
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Remote { provider } => write!(f, "{} (market data)", provider),
            DataOrigin::Synthetic { reason } => write!(f, "SYNTHETIC SAMPLE DATA ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub origin: DataOrigin,
    pub points: Vec<PricePoint>,
}
