//! Output artifacts of a run: the text report, the structured JSON document
//! and the three CSV dumps.

use crate::errors::ReportError;
use crate::models::{ChangeRecord, DataOrigin, PriceSeries, RankedRecord, Ranking};
use crate::settings::OutputConfig;
use crate::storage_utils::ArtifactStore;
use chrono::{NaiveDate, NaiveDateTime};
use comfy_table::{CellAlignment, ContentArrangement, Table, presets::ASCII_MARKDOWN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

const RULE_WIDTH: usize = 90;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// --- Structured artifact ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisDocument {
    pub metadata: Metadata,
    pub statistics: Statistics,
    pub top_gains: Vec<RankedRecord>,
    pub top_losses: Vec<RankedRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub symbol: String,
    pub instrument: String,
    pub analysis_date: String,
    pub data_source: String,
    pub synthetic: bool,
    pub origin: DataOrigin,
    pub period: Period,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_days: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Statistics {
    pub max_gain_pct: f64,
    pub max_gain_date: NaiveDate,
    pub max_loss_pct: f64,
    pub max_loss_date: NaiveDate,
    pub mean_change_pct: f64,
    pub std_dev_change_pct: f64,
}

impl AnalysisDocument {
    pub fn build(
        series: &PriceSeries,
        instrument: &str,
        changes: &[ChangeRecord],
        ranking: &Ranking,
        generated_at: NaiveDateTime,
    ) -> Self {
        let stats = &ranking.stats;
        // Non-empty: ranking succeeded, so there is at least one change.
        let start = changes.first().map(|c| c.date).unwrap_or(stats.max_gain.date);
        let end = changes.last().map(|c| c.date).unwrap_or(stats.max_gain.date);

        Self {
            metadata: Metadata {
                symbol: series.symbol.clone(),
                instrument: instrument.to_string(),
                analysis_date: generated_at.format(TIMESTAMP_FORMAT).to_string(),
                data_source: series.origin.to_string(),
                synthetic: series.origin.is_synthetic(),
                origin: series.origin.clone(),
                period: Period {
                    start,
                    end,
                    total_days: stats.total_days,
                },
            },
            statistics: Statistics {
                max_gain_pct: stats.max_gain.change_pct,
                max_gain_date: stats.max_gain.date,
                max_loss_pct: stats.max_loss.change_pct,
                max_loss_date: stats.max_loss.date,
                mean_change_pct: stats.mean_change_pct,
                std_dev_change_pct: stats.std_dev_change_pct,
            },
            top_gains: ranking.gains.clone(),
            top_losses: ranking.losses.clone(),
        }
    }
}

// --- Formatting helpers ---

pub fn fmt_price(value: f64) -> String {
    format!("${:.2}", value)
}

pub fn fmt_signed_price(value: f64) -> String {
    let sign = if value < 0.0 { '-' } else { '+' };
    format!("{}${:.2}", sign, value.abs())
}

pub fn fmt_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

pub fn fmt_sigma(sigma: Option<f64>) -> String {
    sigma.map_or_else(|| "n/a".to_string(), |s| format!("{:+.2}σ", s))
}

/// Thousands-separated volume, or `n/a` when the provider sent none.
pub fn fmt_volume(volume: Option<u64>) -> String {
    let Some(volume) = volume else {
        return "n/a".to_string();
    };
    let digits = volume.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// --- Text report ---

fn ranked_table(rows: &[RankedRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .force_no_tty()
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(vec!["Rank", "Date", "Close", "Change $", "Change %", "Sigma", "Volume"]);

    for row in rows {
        table.add_row(vec![
            row.rank.to_string(),
            row.record.date.to_string(),
            fmt_price(row.record.close),
            fmt_signed_price(row.record.change_abs),
            fmt_pct(row.record.change_pct),
            fmt_sigma(row.sigma),
            fmt_volume(row.record.volume),
        ]);
    }
    for index in [0, 2, 3, 4, 5, 6] {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

pub fn render_text_report(doc: &AnalysisDocument) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_text_report(&mut out, doc)?;
    Ok(out)
}

fn write_text_report(out: &mut impl fmt::Write, doc: &AnalysisDocument) -> fmt::Result {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let meta = &doc.metadata;
    let stats = &doc.statistics;

    writeln!(out, "{}", heavy)?;
    writeln!(out, "{} ({}) PRICE MOVEMENT ANALYSIS", meta.instrument.to_uppercase(), meta.symbol)?;
    writeln!(out, "{}\n", heavy)?;

    if meta.synthetic {
        writeln!(out, "WARNING: this report is based on SYNTHETIC sample data, not real prices.\n")?;
    }

    writeln!(out, "Analysis Date: {}", meta.analysis_date)?;
    writeln!(out, "Data Source: {}", meta.data_source)?;
    writeln!(out, "Data Period: {} to {}", meta.period.start, meta.period.end)?;
    writeln!(out, "Total Trading Days: {}\n", meta.period.total_days)?;

    writeln!(out, "SUMMARY STATISTICS")?;
    writeln!(out, "{}", light)?;
    writeln!(
        out,
        "Maximum Single-Day Gain: {} on {}",
        fmt_pct(stats.max_gain_pct),
        stats.max_gain_date
    )?;
    writeln!(
        out,
        "Maximum Single-Day Loss: {} on {}",
        fmt_pct(stats.max_loss_pct),
        stats.max_loss_date
    )?;
    writeln!(out, "Average Daily Change: {:+.4}%", stats.mean_change_pct)?;
    writeln!(out, "Volatility (Std Dev): {:.2}%\n", stats.std_dev_change_pct)?;

    for (title, rows) in [("GAINS", &doc.top_gains), ("LOSSES", &doc.top_losses)] {
        writeln!(out, "{}", heavy)?;
        writeln!(out, "TOP {} BIGGEST {} (by percentage)", rows.len(), title)?;
        writeln!(out, "{}\n", heavy)?;
        writeln!(out, "{}\n", ranked_table(rows))?;
    }

    Ok(())
}

// --- Tabular dumps ---

/// CSV with columns `date,close,change_abs,change_pct`.
pub fn changes_csv<'a, I>(records: I, artifact: &str) -> Result<Vec<u8>, ReportError>
where
    I: IntoIterator<Item = &'a ChangeRecord>,
{
    let to_error = |e: csv::Error| ReportError::Serialize {
        artifact: artifact.to_string(),
        message: e.to_string(),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    // Header is written even when there are no rows.
    writer
        .write_record(["date", "close", "change_abs", "change_pct"])
        .map_err(to_error)?;
    for record in records {
        writer
            .write_record([
                record.date.to_string(),
                record.close.to_string(),
                record.change_abs.to_string(),
                record.change_pct.to_string(),
            ])
            .map_err(to_error)?;
    }

    writer.into_inner().map_err(|e| ReportError::Serialize {
        artifact: artifact.to_string(),
        message: e.to_string(),
    })
}

/// Paths of the artifacts written by [`write_reports`].
#[derive(Debug, Clone)]
pub struct WrittenArtifacts {
    pub report: PathBuf,
    pub json: PathBuf,
    pub full_csv: PathBuf,
    pub gains_csv: PathBuf,
    pub losses_csv: PathBuf,
}

impl WrittenArtifacts {
    pub fn all(&self) -> [(&'static str, &PathBuf); 5] {
        [
            ("human-readable report", &self.report),
            ("structured data", &self.json),
            ("complete dataset", &self.full_csv),
            ("top gains", &self.gains_csv),
            ("top losses", &self.losses_csv),
        ]
    }
}

/// Writes all five artifacts. Stops at the first failure; files already
/// written stay in place.
pub async fn write_reports(
    store: &ArtifactStore,
    files: &OutputConfig,
    doc: &AnalysisDocument,
    changes: &[ChangeRecord],
) -> Result<WrittenArtifacts, ReportError> {
    let text = render_text_report(doc).map_err(|e| ReportError::Serialize {
        artifact: files.report_file.clone(),
        message: e.to_string(),
    })?;
    let report = store.write_bytes(&files.report_file, text.as_bytes()).await?;
    let json = store.save_json(&files.json_file, doc).await?;

    let full = changes_csv(changes, &files.full_csv_file)?;
    let full_csv = store.write_bytes(&files.full_csv_file, &full).await?;

    let gains = changes_csv(doc.top_gains.iter().map(|r| &r.record), &files.gains_csv_file)?;
    let gains_csv = store.write_bytes(&files.gains_csv_file, &gains).await?;

    let losses = changes_csv(doc.top_losses.iter().map(|r| &r.record), &files.losses_csv_file)?;
    let losses_csv = store.write_bytes(&files.losses_csv_file, &losses).await?;

    info!("Wrote 5 artifacts to {}", store.base_dir.display());

    Ok(WrittenArtifacts {
        report,
        json,
        full_csv,
        gains_csv,
        losses_csv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily_change::compute_changes;
    use crate::models::PricePoint;
    use crate::ranking::rank_movements;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn build(origin: DataOrigin) -> (AnalysisDocument, Vec<ChangeRecord>) {
        let points = vec![
            PricePoint::new(date(1, 2), 10.00),
            PricePoint::new(date(1, 3), 10.61).with_volume(Some(1_200_000)),
            PricePoint::new(date(1, 4), 10.30),
            PricePoint::new(date(1, 5), 10.50),
        ];
        let series = PriceSeries {
            symbol: "SLV".into(),
            origin,
            points: points.clone(),
        };
        let changes = compute_changes(&points).unwrap();
        let ranking = rank_movements(&changes, 2).unwrap();
        let generated = date(6, 1).and_hms_opt(12, 0, 0).unwrap();
        let doc = AnalysisDocument::build(&series, "iShares Silver Trust ETF", &changes, &ranking, generated);
        (doc, changes)
    }

    #[test]
    fn test_document_metadata() {
        let (doc, _) = build(DataOrigin::Synthetic {
            reason: "no API key supplied".into(),
        });
        assert!(doc.metadata.synthetic);
        assert!(doc.metadata.data_source.contains("SYNTHETIC"));
        assert_eq!(doc.metadata.period.start, date(1, 3));
        assert_eq!(doc.metadata.period.end, date(1, 5));
        assert_eq!(doc.metadata.period.total_days, 3);
        assert_eq!(doc.metadata.analysis_date, "2024-06-01 12:00:00");
        assert_eq!(doc.top_gains.len(), 2);
        assert_eq!(doc.statistics.max_gain_date, date(1, 3));
    }

    #[test]
    fn test_json_has_expected_sections() {
        let (doc, _) = build(DataOrigin::Remote {
            provider: "Alpha Vantage".into(),
        });
        let value = serde_json::to_value(&doc).unwrap();
        for key in ["metadata", "statistics", "top_gains", "top_losses"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["metadata"]["synthetic"], false);
        assert_eq!(value["top_gains"][0]["date"], "2024-01-03");
        assert_eq!(value["top_gains"][0]["rank"], 1);
        assert!(value["top_gains"][0]["change_pct"].is_f64());
        assert_eq!(value["top_gains"][0]["volume"], 1_200_000);
    }

    #[test]
    fn test_text_report_sections() {
        let (doc, _) = build(DataOrigin::Synthetic {
            reason: "test".into(),
        });
        let text = render_text_report(&doc).unwrap();
        assert!(text.contains("ISHARES SILVER TRUST ETF (SLV) PRICE MOVEMENT ANALYSIS"));
        assert!(text.contains("WARNING: this report is based on SYNTHETIC"));
        assert!(text.contains("Maximum Single-Day Gain: +6.10% on 2024-01-03"));
        assert!(text.contains("TOP 2 BIGGEST GAINS"));
        assert!(text.contains("TOP 2 BIGGEST LOSSES"));
        assert!(text.contains("+$0.61"));
        assert!(text.contains("Volume"));
        assert!(text.contains("1,200,000"));
        assert!(text.contains("n/a"));
        assert!(!text.contains('\u{1b}'));

        let summary_at = text.find("SUMMARY STATISTICS").unwrap();
        let gains_at = text.find("BIGGEST GAINS").unwrap();
        let losses_at = text.find("BIGGEST LOSSES").unwrap();
        assert!(summary_at < gains_at && gains_at < losses_at);
    }

    #[test]
    fn test_csv_dump_columns_and_rows() {
        let (_, changes) = build(DataOrigin::Remote {
            provider: "test".into(),
        });
        let bytes = changes_csv(&changes, "full.csv").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,close,change_abs,change_pct");
        assert_eq!(lines.len(), changes.len() + 1);
        assert!(lines[1].starts_with("2024-01-03,10.61,"));
        assert!(lines.iter().all(|l| l.split(',').count() == 4));
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(fmt_price(21.456), "$21.46");
        assert_eq!(fmt_signed_price(-0.614), "-$0.61");
        assert_eq!(fmt_signed_price(0.61), "+$0.61");
        assert_eq!(fmt_pct(-3.14159), "-3.14%");
        assert_eq!(fmt_sigma(None), "n/a");
        assert_eq!(fmt_sigma(Some(2.5)), "+2.50σ");
        assert_eq!(fmt_volume(Some(18_723_400)), "18,723,400");
        assert_eq!(fmt_volume(Some(999)), "999");
        assert_eq!(fmt_volume(Some(1_000)), "1,000");
        assert_eq!(fmt_volume(None), "n/a");
    }
}
