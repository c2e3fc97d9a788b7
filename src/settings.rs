use crate::errors::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "price-movers.toml";

// CONFIGURATION STRUCTS
// Every section has defaults, so an empty or missing file is a valid config.

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub instrument: InstrumentConfig,
    pub source: SourceConfig,
    pub sample: SampleConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InstrumentConfig {
    pub symbol: String, // e.g., "SLV"
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    AlphaVantage,
    Yahoo,
    Synthetic,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub provider: Provider,
    pub alpha_vantage_url: String,
    pub yahoo_url: String,
    pub timeout_secs: u64,
    pub history_years: u32,
}

/// Parameters of the synthetic random walk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SampleConfig {
    pub seed: u64,
    pub start_price: f64,
    /// Standard deviation of the daily percent return.
    pub daily_volatility_pct: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Last generated day; today when unset.
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_k: usize,
    pub console_top: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub report_file: String,
    pub json_file: String,
    pub full_csv_file: String,
    pub gains_csv_file: String,
    pub losses_csv_file: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "SLV".to_string(),
            name: "iShares Silver Trust ETF".to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::AlphaVantage,
            alpha_vantage_url: "https://www.alphavantage.co".to_string(),
            yahoo_url: "https://query2.finance.yahoo.com".to_string(),
            timeout_secs: 30,
            history_years: 10,
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 20.0,
            daily_volatility_pct: 1.5,
            min_price: 10.0,
            max_price: 40.0,
            end_date: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            console_top: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            report_file: "silver_analysis_report.txt".to_string(),
            json_file: "silver_price_analysis.json".to_string(),
            full_csv_file: "silver_price_data_full.csv".to_string(),
            gains_csv_file: "silver_top_gains.csv".to_string(),
            losses_csv_file: "silver_top_losses.csv".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.symbol.trim().is_empty() {
            return Err(ConfigError::Validation("instrument.symbol must not be empty".into()));
        }
        if self.analysis.top_k == 0 {
            return Err(ConfigError::Validation("analysis.top_k must be at least 1".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Validation("source.timeout_secs must be at least 1".into()));
        }
        if self.source.history_years == 0 {
            return Err(ConfigError::Validation("source.history_years must be at least 1".into()));
        }
        let sample = &self.sample;
        if sample.min_price <= 0.0 || sample.max_price <= sample.min_price {
            return Err(ConfigError::Validation(format!(
                "sample price bounds must satisfy 0 < min_price < max_price (got {} and {})",
                sample.min_price, sample.max_price
            )));
        }
        if !(sample.min_price..=sample.max_price).contains(&sample.start_price) {
            return Err(ConfigError::Validation(format!(
                "sample.start_price {} is outside [{}, {}]",
                sample.start_price, sample.min_price, sample.max_price
            )));
        }
        if !(sample.daily_volatility_pct > 0.0 && sample.daily_volatility_pct.is_finite()) {
            return Err(ConfigError::Validation(
                "sample.daily_volatility_pct must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Loads settings from defaults, an optional TOML file and `PRICE_MOVERS__*` environment variables.
///
/// An explicitly given file must exist; the default file is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("PRICE_MOVERS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.instrument.symbol, "SLV");
        assert_eq!(settings.analysis.top_k, 50);
        assert_eq!(settings.source.provider, Provider::AlphaVantage);
    }

    #[test]
    fn test_validation_rejects_zero_top_k() {
        let mut settings = Settings::default();
        settings.analysis.top_k = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let mut settings = Settings::default();
        settings.sample.min_price = 50.0;
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[instrument]\nsymbol = \"SIVR\"\n\n[analysis]\ntop_k = 20\n\n[source]\nprovider = \"yahoo\""
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.instrument.symbol, "SIVR");
        assert_eq!(settings.instrument.name, "iShares Silver Trust ETF");
        assert_eq!(settings.analysis.top_k, 20);
        assert_eq!(settings.analysis.console_top, 10);
        assert_eq!(settings.source.provider, Provider::Yahoo);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_settings(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
