use crate::errors::AnalysisError;
use crate::models::{ChangeRecord, PricePoint};

/// Day-over-day change for every point after the first.
///
/// Returns exactly `points.len() - 1` records. Fails on fewer than two points
/// or on any close that is not a positive finite number, so the percent
/// division can never produce NaN or infinity.
pub fn compute_changes(points: &[PricePoint]) -> Result<Vec<ChangeRecord>, AnalysisError> {
    if points.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            found: points.len(),
        });
    }

    if let Some(bad) = points.iter().find(|p| !(p.close.is_finite() && p.close > 0.0)) {
        return Err(AnalysisError::NonPositivePrice {
            date: bad.date,
            close: bad.close,
        });
    }

    let records = points
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            let change_abs = curr.close - prev.close;
            ChangeRecord {
                date: curr.date,
                close: curr.close,
                change_abs,
                change_pct: change_abs / prev.close * 100.0,
                volume: curr.volume,
            }
        })
        .collect();

    Ok(records)
}
