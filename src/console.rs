use crate::models::RankedRecord;
use crate::report::{AnalysisDocument, fmt_pct, fmt_price, fmt_sigma, fmt_signed_price};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

/// Colour intensity for a row, fading from the largest move down to 40%.
pub(crate) fn get_visibility_ratio(current_pct: f64, top_pct: f64) -> f64 {
    if top_pct == 0.0 {
        1.0
    } else {
        (0.4 + 0.6 * (current_pct / top_pct)).max(0.4)
    }
}

fn movers_table(rows: &[RankedRecord], limit: usize, gains: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Close").add_attribute(Attribute::Bold),
            Cell::new("Change $").add_attribute(Attribute::Bold),
            Cell::new("Change %")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Sigma").add_attribute(Attribute::Bold),
        ]);

    let top_pct = rows.first().map_or(0.0, |r| r.record.change_pct);

    for row in rows.iter().take(limit) {
        let ratio = get_visibility_ratio(row.record.change_pct, top_pct);
        let shade = (255.0 * ratio) as u8;
        let pct_color = if gains {
            Color::Rgb { r: 0, g: shade, b: 0 }
        } else {
            Color::Rgb { r: shade, g: 0, b: 0 }
        };

        table.add_row(vec![
            Cell::new(row.rank).fg(Color::DarkGrey),
            Cell::new(row.record.date),
            Cell::new(fmt_price(row.record.close)),
            Cell::new(fmt_signed_price(row.record.change_abs)),
            Cell::new(fmt_pct(row.record.change_pct))
                .fg(pct_color)
                .set_alignment(CellAlignment::Right),
            Cell::new(fmt_sigma(row.sigma)).fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Prints the summary block and the first `limit` gains and losses.
pub fn print_summary(doc: &AnalysisDocument, limit: usize) {
    let stats = &doc.statistics;
    let meta = &doc.metadata;

    println!("\n{} ({})", meta.instrument, meta.symbol);
    println!("Source: {}", meta.data_source);
    println!(
        "Period: {} to {} ({} trading days)",
        meta.period.start, meta.period.end, meta.period.total_days
    );
    println!(
        "Maximum Single-Day Gain: {} on {}",
        fmt_pct(stats.max_gain_pct),
        stats.max_gain_date
    );
    println!(
        "Maximum Single-Day Loss: {} on {}",
        fmt_pct(stats.max_loss_pct),
        stats.max_loss_date
    );
    println!("Average Daily Change: {:+.4}%", stats.mean_change_pct);
    println!("Volatility (Std Dev): {:.2}%", stats.std_dev_change_pct);

    println!("\nTop {} Biggest Gains\n{}", limit.min(doc.top_gains.len()), movers_table(&doc.top_gains, limit, true));
    println!("\nTop {} Biggest Losses\n{}", limit.min(doc.top_losses.len()), movers_table(&doc.top_losses, limit, false));

    if meta.synthetic {
        println!("\nWARNING: results above are based on SYNTHETIC sample data, not real prices.");
    }
}
