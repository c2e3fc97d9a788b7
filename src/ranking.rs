//! Ranking of daily moves and the summary statistics over all of them.

use crate::errors::AnalysisError;
use crate::models::{ChangeRecord, RankedRecord, Ranking, SummaryStats};

/// Ranks the `k` largest gains and losses and summarizes the whole sequence.
///
/// Both lists are produced with a stable sort, so equal percentages keep
/// their chronological order. Each ranked entry carries its sigma, which is
/// `None` when every change is identical.
pub fn rank_movements(records: &[ChangeRecord], k: usize) -> Result<Ranking, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::InsufficientData { needed: 1, found: 0 });
    }

    let (mean, std_dev) = mean_and_std_dev(records);

    let mut by_gain = records.to_vec();
    by_gain.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));

    let mut by_loss = records.to_vec();
    by_loss.sort_by(|a, b| a.change_pct.total_cmp(&b.change_pct));

    let stats = SummaryStats {
        max_gain: by_gain[0],
        max_loss: by_loss[0],
        mean_change_pct: mean,
        std_dev_change_pct: std_dev,
        total_days: records.len(),
    };

    Ok(Ranking {
        gains: take_ranked(by_gain, k, mean, std_dev),
        losses: take_ranked(by_loss, k, mean, std_dev),
        stats,
    })
}

/// Arithmetic mean and population standard deviation (divides by N) of `change_pct`.
///
/// A deviation that is only summation rounding noise is reported as exactly zero.
pub fn mean_and_std_dev(records: &[ChangeRecord]) -> (f64, f64) {
    if records.is_empty() {
        return (0.0, 0.0);
    }
    let n = records.len() as f64;
    let mean = records.iter().map(|r| r.change_pct).sum::<f64>() / n;
    let variance = records
        .iter()
        .map(|r| (r.change_pct - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();
    if is_negligible(std_dev, mean) {
        (mean, 0.0)
    } else {
        (mean, std_dev)
    }
}

fn is_negligible(std_dev: f64, mean: f64) -> bool {
    std_dev <= f64::EPSILON * mean.abs().max(1.0) * 16.0
}

/// Distance from the mean in standard deviations; undefined for a zero deviation.
pub fn sigma(change_pct: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if is_negligible(std_dev, mean) {
        None
    } else {
        Some((change_pct - mean) / std_dev)
    }
}

fn take_ranked(sorted: Vec<ChangeRecord>, k: usize, mean: f64, std_dev: f64) -> Vec<RankedRecord> {
    sorted
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, record)| RankedRecord {
            rank: i + 1,
            sigma: sigma(record.change_pct, mean, std_dev),
            record,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily_change::compute_changes;
    use crate::models::PricePoint;
    use chrono::{Days, NaiveDate};

    fn day(i: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(i)
    }

    fn record(i: u64, change_pct: f64) -> ChangeRecord {
        ChangeRecord {
            date: day(i),
            close: 20.0,
            change_abs: change_pct / 5.0,
            change_pct,
            volume: None,
        }
    }

    fn round4(value: f64) -> f64 {
        (value * 1e4).round() / 1e4
    }

    fn fixture() -> Vec<ChangeRecord> {
        let closes = [20.0, 20.5, 20.1, 21.0, 20.8, 21.5, 21.2, 22.0, 21.6, 21.9];
        let points: Vec<PricePoint> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(day(i as u64), *c))
            .collect();
        compute_changes(&points).unwrap()
    }

    #[test]
    fn test_population_std_dev_fixture() {
        let ranking = rank_movements(&fixture(), 50).unwrap();
        assert_eq!(ranking.stats.total_days, 9);
        assert_eq!(round4(ranking.stats.std_dev_change_pct), 2.4488);
        assert_eq!(round4(ranking.stats.mean_change_pct), 1.0431);
    }

    #[test]
    fn test_lists_are_ordered_and_bounded() {
        let ranking = rank_movements(&fixture(), 4).unwrap();
        assert_eq!(ranking.gains.len(), 4);
        assert_eq!(ranking.losses.len(), 4);
        assert!(ranking.gains.windows(2).all(|w| w[0].record.change_pct >= w[1].record.change_pct));
        assert!(ranking.losses.windows(2).all(|w| w[0].record.change_pct <= w[1].record.change_pct));
        assert_eq!(
            ranking.gains.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );

        assert_eq!(ranking.stats.max_gain, ranking.gains[0].record);
        assert_eq!(ranking.stats.max_loss, ranking.losses[0].record);
        assert_eq!(ranking.stats.max_gain.date, day(3));
        assert_eq!(ranking.stats.max_loss.date, day(2));
    }

    #[test]
    fn test_k_larger_than_input() {
        let ranking = rank_movements(&fixture(), 50).unwrap();
        assert_eq!(ranking.gains.len(), 9);
        assert_eq!(ranking.losses.len(), 9);
    }

    #[test]
    fn test_ties_keep_chronological_order() {
        let records = vec![record(0, 1.0), record(1, 3.0), record(2, 1.0), record(3, 3.0), record(4, -2.0)];
        let ranking = rank_movements(&records, 5).unwrap();

        let gain_dates: Vec<_> = ranking.gains.iter().map(|r| r.record.date).collect();
        assert_eq!(gain_dates, vec![day(1), day(3), day(0), day(2), day(4)]);

        let loss_dates: Vec<_> = ranking.losses.iter().map(|r| r.record.date).collect();
        assert_eq!(loss_dates, vec![day(4), day(0), day(2), day(1), day(3)]);
    }

    #[test]
    fn test_sigma_attached_to_ranked_records() {
        let ranking = rank_movements(&fixture(), 50).unwrap();
        let top = &ranking.gains[0];
        assert_eq!(round4(top.sigma.unwrap()), 1.4025);
        let bottom = &ranking.losses[0];
        assert_eq!(round4(bottom.sigma.unwrap()), -1.2228);
    }

    #[test]
    fn test_single_record() {
        let points = [PricePoint::new(day(0), 10.00), PricePoint::new(day(1), 10.61)];
        let records = compute_changes(&points).unwrap();
        let ranking = rank_movements(&records, 50).unwrap();

        assert_eq!(ranking.gains.len(), 1);
        assert_eq!(ranking.losses.len(), 1);
        assert_eq!(ranking.gains[0].record, records[0]);
        assert_eq!(ranking.losses[0].record, records[0]);
        assert!((ranking.stats.mean_change_pct - 6.10).abs() < 1e-9);
        assert_eq!(ranking.stats.std_dev_change_pct, 0.0);
        assert_eq!(ranking.gains[0].sigma, None);
    }

    #[test]
    fn test_identical_inexact_changes_have_no_sigma() {
        let records = vec![record(0, 0.1), record(1, 0.1), record(2, 0.1)];
        let ranking = rank_movements(&records, 50).unwrap();

        assert_eq!(ranking.stats.std_dev_change_pct, 0.0);
        assert!(ranking.gains.iter().chain(&ranking.losses).all(|r| r.sigma.is_none()));
        assert_eq!(sigma(0.1, 0.1, 1e-17), None);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            rank_movements(&[], 50),
            Err(AnalysisError::InsufficientData { found: 0, .. })
        ));
    }
}
