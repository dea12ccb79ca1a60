use crate::stats::{self, StatSnapshot};
use crate::storage::{ExecutionRecord, RecordStore};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};
use ratatui::Frame;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const RECENT_RUNS: usize = 10;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Full-screen dashboard over the record store. Read-only consumer of the
/// same store/aggregator contract as the web presenter.
pub async fn run(store: Arc<dyn RecordStore>, refresh: Duration) -> Result<(), TuiError> {
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, store, refresh).await;
    ratatui::restore();
    result
}

async fn run_loop(
    terminal: &mut ratatui::DefaultTerminal,
    store: Arc<dyn RecordStore>,
    refresh: Duration,
) -> Result<(), TuiError> {
    loop {
        // Storage hiccups render as "no data" rather than tearing down the UI
        let snapshot = stats::compute(store.as_ref(), Utc::now()).await.ok();
        let recent = store.latest(RECENT_RUNS).await.unwrap_or_default();

        terminal.draw(|frame| draw(frame, snapshot.as_ref(), &recent))?;

        if poll_quit(refresh).await? {
            return Ok(());
        }
    }
}

/// Block on terminal input for up to `timeout`; true means the user asked
/// to quit (q, Esc, or Ctrl+C).
async fn poll_quit(timeout: Duration) -> Result<bool, TuiError> {
    let quit = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    return Ok(matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) || ctrl_c);
                }
            }
        }
        Ok(false)
    })
    .await??;

    Ok(quit)
}

fn draw(frame: &mut Frame, snapshot: Option<&StatSnapshot>, recent: &[ExecutionRecord]) {
    let [status_area, gauge_area, table_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(3),
        Constraint::Min(5),
    ])
    .areas(frame.area());

    draw_status(frame, status_area, snapshot, recent);
    draw_gauge(frame, gauge_area, snapshot);
    draw_recent(frame, table_area, recent);
}

fn draw_status(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&StatSnapshot>,
    recent: &[ExecutionRecord],
) {
    let mut lines = Vec::new();

    match recent.first() {
        Some(last) => {
            let (marker, style) = if last.is_success() {
                ("OK", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                ("FAIL", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            };
            lines.push(Line::from(vec![
                Span::raw("Last run: "),
                Span::styled(marker, style),
                Span::raw(format!("  {}  {}", last.timestamp, last.message)),
            ]));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "No data yet - waiting for the collector",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    if let Some(snap) = snapshot {
        match &snap.last_failure {
            Some(failure) => lines.push(Line::from(Span::styled(
                format!("Last failure: {} (exit {})", failure.timestamp, failure.exit_code),
                Style::default().fg(Color::Red),
            ))),
            None => lines.push(Line::from(Span::styled(
                "No failures recorded",
                Style::default().fg(Color::Green),
            ))),
        }
    }

    let block = Block::default().borders(Borders::ALL).title("Live Status");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_gauge(frame: &mut Frame, area: Rect, snapshot: Option<&StatSnapshot>) {
    let block = Block::default().borders(Borders::ALL).title("24-Hour Activity");

    match snapshot {
        Some(snap) if snap.total_24h > 0 => {
            let ratio = (snap.success_rate_24h / 100.0).clamp(0.0, 1.0);
            let color = if snap.failed_24h == 0 {
                Color::Green
            } else {
                Color::Yellow
            };
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(color))
                .ratio(ratio)
                .label(format!(
                    "{:.1}% success ({} runs, {} failed)",
                    snap.success_rate_24h, snap.total_24h, snap.failed_24h
                ));
            frame.render_widget(gauge, area);
        }
        _ => {
            let paragraph = Paragraph::new("no runs in the last 24 hours").block(block);
            frame.render_widget(paragraph, area);
        }
    }
}

fn draw_recent(frame: &mut Frame, area: Rect, recent: &[ExecutionRecord]) {
    let rows: Vec<Row> = recent
        .iter()
        .map(|record| {
            let status = if record.is_success() {
                Cell::from("OK").style(Style::default().fg(Color::Green))
            } else {
                Cell::from(format!("exit {}", record.exit_code))
                    .style(Style::default().fg(Color::Red))
            };
            Row::new(vec![
                Cell::from(record.timestamp.clone()),
                status,
                Cell::from(record.message.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(27),
            Constraint::Length(9),
            Constraint::Min(20),
        ],
    )
    .header(
        Row::new(vec!["Time", "Status", "Message"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Recent Runs (q to quit)"),
    );

    frame.render_widget(table, area);
}
