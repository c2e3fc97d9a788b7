//! This module contains the core analysis pipeline logic.

use crate::daily_change::compute_changes;
use crate::models::PriceSeries;
use crate::ranking::rank_movements;
use crate::report::{AnalysisDocument, WrittenArtifacts, write_reports};
use crate::settings::Settings;
use crate::sources;
use crate::storage_utils::ArtifactStore;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: AnalysisDocument,
    pub artifacts: WrittenArtifacts,
}

/// Runs the full analysis pipeline:
/// 1. Fetches the price series, or generates sample data when none is available.
/// 2. Computes day-over-day changes.
/// 3. Ranks gains and losses and summarizes the series.
/// 4. Writes every output artifact.
pub async fn run_analysis_pipeline(settings: &Settings, api_key: Option<&str>) -> Result<PipelineOutput> {
    let now = Local::now();

    info!("Step 1: fetching {} price history", settings.instrument.symbol);
    let (points, origin) = sources::resolve_series(settings, api_key, now.date_naive()).await;
    let series = PriceSeries {
        symbol: settings.instrument.symbol.clone(),
        origin,
        points,
    };

    analyze_and_write(settings, &series, now.naive_local()).await
}

/// Steps 2 to 4 on an already loaded series. Nothing is written unless the
/// calculations succeed.
pub async fn analyze_and_write(
    settings: &Settings,
    series: &PriceSeries,
    generated_at: NaiveDateTime,
) -> Result<PipelineOutput> {
    info!("Step 2: computing daily changes over {} closes", series.points.len());
    let changes = compute_changes(&series.points).context("Cannot compute daily changes")?;

    info!("Step 3: ranking top {} gains and losses", settings.analysis.top_k);
    let ranking = rank_movements(&changes, settings.analysis.top_k).context("Cannot rank movements")?;

    let document = AnalysisDocument::build(
        series,
        &settings.instrument.name,
        &changes,
        &ranking,
        generated_at,
    );

    info!("Step 4: writing artifacts to {}", settings.output.dir.display());
    let store = ArtifactStore::new(&settings.output.dir).await?;
    let artifacts = write_reports(&store, &settings.output, &document, &changes).await?;

    Ok(PipelineOutput { document, artifacts })
}
