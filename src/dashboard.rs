use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
};
use std::io;
use std::time::Duration;

use crate::analysis;
use crate::console::get_visibility_ratio;
use crate::models::RankedRecord;
use crate::report::{AnalysisDocument, fmt_pct, fmt_price, fmt_sigma, fmt_signed_price, fmt_volume};
use crate::settings::Settings;
use crate::storage_utils::ArtifactStore;

// --- App State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Gains,
    Losses,
}

impl View {
    const ALL: [View; 2] = [View::Gains, View::Losses];

    fn title(self) -> &'static str {
        match self {
            View::Gains => "Top Gains",
            View::Losses => "Top Losses",
        }
    }
}

struct App {
    data: Option<AnalysisDocument>,
    is_refreshing: bool,
    status: Option<String>,
    selected_view_index: usize,
}

impl App {
    fn new(data: Option<AnalysisDocument>) -> Self {
        Self {
            data,
            is_refreshing: false,
            status: None,
            selected_view_index: 0,
        }
    }

    fn view(&self) -> View {
        View::ALL[self.selected_view_index]
    }

    fn rows(&self) -> &[RankedRecord] {
        match (&self.data, self.view()) {
            (Some(doc), View::Gains) => doc.top_gains.as_slice(),
            (Some(doc), View::Losses) => doc.top_losses.as_slice(),
            (None, _) => &[],
        }
    }
}

enum Action {
    Continue,
    Refresh,
    Quit,
}

// --- Data Loading ---

pub async fn load_data(settings: &Settings) -> Result<AnalysisDocument> {
    let storage = ArtifactStore::at(&settings.output.dir);
    storage.load_json(&settings.output.json_file).await
}

// --- TUI ---

/// Interactive view over the structured artifact. F5 re-runs the pipeline.
pub async fn run_dashboard(settings: &Settings, api_key: Option<&str>) -> Result<()> {
    let initial = load_data(settings).await.ok();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(initial), settings, api_key).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    settings: &Settings,
    api_key: Option<&str>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, &app))?;

        if app.is_refreshing {
            // Single-threaded: the UI is frozen on the popup while the run completes.
            match analysis::run_analysis_pipeline(settings, api_key).await {
                Ok(output) => {
                    app.data = Some(output.document);
                    app.status = None;
                }
                Err(e) => app.status = Some(format!("Refresh failed: {:#}", e)),
            }
            app.is_refreshing = false;
            continue;
        }

        if event::poll(Duration::from_millis(50))? {
            // Resize events need no handling: the next draw picks up the new size.
            if let Event::Key(key) = event::read()? {
                match handle_key_event(key, &mut app) {
                    Action::Quit => return Ok(()),
                    Action::Refresh => app.is_refreshing = true,
                    Action::Continue => {}
                }
            }
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    let view_count = View::ALL.len();
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
        KeyCode::F(5) | KeyCode::Char('r') => return Action::Refresh,
        KeyCode::Up => {
            app.selected_view_index = app
                .selected_view_index
                .checked_sub(1)
                .unwrap_or(view_count - 1);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.selected_view_index = (app.selected_view_index + 1) % view_count;
        }
        KeyCode::Char(c) => {
            if let Some(digit) = c.to_digit(10) {
                if digit > 0 && digit as usize <= view_count {
                    app.selected_view_index = (digit - 1) as usize;
                }
            }
        }
        _ => {}
    }
    Action::Continue
}

fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(18), Constraint::Percentage(82)])
        .split(f.size());
    let right_chunks =
        Layout::vertical([Constraint::Length(6), Constraint::Min(0)]).split(main_layout[1]);

    // Sidebar
    let sidebar_block = Block::default()
        .borders(Borders::ALL)
        .title("Views")
        .title_alignment(Alignment::Center);
    let inner_sidebar_area = sidebar_block.inner(main_layout[0]);
    f.render_widget(sidebar_block, main_layout[0]);

    let sidebar_chunks = Layout::vertical([
        Constraint::Min(1),    // view list
        Constraint::Length(2), // key help
    ])
    .split(inner_sidebar_area);

    let view_lines: Vec<Line> = View::ALL
        .iter()
        .enumerate()
        .map(|(i, view)| {
            let line = Line::from(format!("{}. {}", i + 1, view.title()));
            if i == app.selected_view_index {
                line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray))
            } else {
                line
            }
        })
        .collect();
    f.render_widget(Paragraph::new(view_lines), sidebar_chunks[0]);
    f.render_widget(
        Paragraph::new("F5 refreshes\nq quits").alignment(Alignment::Center),
        sidebar_chunks[1],
    );

    // Summary
    f.render_widget(summary_paragraph(app), right_chunks[0]);

    // Ranked table
    let header = Row::new(["Rank", "Date", "Close", "Change $", "Change %", "Sigma", "Volume"])
        .style(Style::default().bg(Color::DarkGray));
    let rows = app.rows();
    let top_pct = rows.first().map_or(0.0, |r| r.record.change_pct);
    let gains = app.view() == View::Gains;

    let table_rows = rows.iter().map(|row| {
        let ratio = get_visibility_ratio(row.record.change_pct, top_pct);
        let shade = (255.0 * ratio) as u8;
        let pct_color = if gains {
            Color::Rgb(0, shade, 0)
        } else {
            Color::Rgb(shade, 0, 0)
        };

        Row::new([
            Cell::from(row.rank.to_string()).style(Style::default().fg(Color::DarkGray)),
            Cell::from(row.record.date.to_string()),
            Cell::from(fmt_price(row.record.close)),
            Cell::from(fmt_signed_price(row.record.change_abs)),
            Cell::from(fmt_pct(row.record.change_pct)).style(Style::default().fg(pct_color)),
            Cell::from(fmt_sigma(row.sigma)).style(Style::default().fg(Color::Gray)),
            Cell::from(fmt_volume(row.record.volume)),
        ])
        .height(1)
    });

    f.render_widget(
        Table::new(
            table_rows,
            [
                Constraint::Length(6),
                Constraint::Length(12),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(9),
                Constraint::Min(12),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(app.view().title())),
        right_chunks[1],
    );

    if app.is_refreshing {
        let area = centered_rect(60, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Running analysis pipeline...\nPlease wait.")
                .block(Block::default().title("Refreshing").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn summary_paragraph(app: &App) -> Paragraph<'static> {
    let mut lines: Vec<Line> = match &app.data {
        Some(doc) => {
            let meta = &doc.metadata;
            let stats = &doc.statistics;
            let source_style = if meta.synthetic {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            vec![
                Line::styled(meta.data_source.clone(), source_style),
                Line::from(format!(
                    "{} to {} | {} trading days",
                    meta.period.start, meta.period.end, meta.period.total_days
                )),
                Line::from(format!(
                    "Max gain {} on {} | Max loss {} on {}",
                    fmt_pct(stats.max_gain_pct),
                    stats.max_gain_date,
                    fmt_pct(stats.max_loss_pct),
                    stats.max_loss_date
                )),
                Line::from(format!(
                    "Mean {:+.4}% | Std dev {:.2}%",
                    stats.mean_change_pct, stats.std_dev_change_pct
                )),
            ]
        }
        None => vec![Line::from("No results yet. Press F5 to run the analysis.")],
    };
    if let Some(status) = &app.status {
        lines.push(Line::styled(status.clone(), Style::default().fg(Color::Red)));
    }

    let title = app.data.as_ref().map_or_else(
        || "Price Movers".to_string(),
        |doc| {
            format!(
                "{} ({}) | Generated {}",
                doc.metadata.instrument, doc.metadata.symbol, doc.metadata.analysis_date
            )
        },
    );

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title_alignment(Alignment::Center)
            .title(title),
    )
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_view_navigation_wraps() {
        let mut app = App::new(None);
        assert_eq!(app.view(), View::Gains);

        handle_key_event(key(KeyCode::Up), &mut app);
        assert_eq!(app.view(), View::Losses);
        handle_key_event(key(KeyCode::Down), &mut app);
        assert_eq!(app.view(), View::Gains);
        handle_key_event(key(KeyCode::Char('2')), &mut app);
        assert_eq!(app.view(), View::Losses);
        handle_key_event(key(KeyCode::Char('9')), &mut app);
        assert_eq!(app.view(), View::Losses);
    }

    #[test]
    fn test_quit_and_refresh_keys() {
        let mut app = App::new(None);
        assert!(matches!(handle_key_event(key(KeyCode::Char('q')), &mut app), Action::Quit));
        assert!(matches!(handle_key_event(key(KeyCode::F(5)), &mut app), Action::Refresh));
        assert!(app.rows().is_empty());
    }

    #[tokio::test]
    async fn test_loading_missing_results_leaves_disk_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.output.dir = dir.path().join("not-yet-run");

        assert!(load_data(&settings).await.is_err());
        assert!(!settings.output.dir.exists());
    }

    #[test]
    fn test_renders_empty_state() {
        let backend = ratatui::backend::TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        let app = App::new(None);
        terminal.draw(|f| ui(f, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("No results yet"));
    }
}
