use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Datelike;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table,
    TableState,
};

use cp_leaderboard::config::AppConfig;
use cp_leaderboard::feed::{build_provider, spawn_provider};
use cp_leaderboard::history::{NormalizedHistory, RatingSeries, chart_range};
use cp_leaderboard::leaderboard::{LeaderboardRow, RankColor, assemble};
use cp_leaderboard::logging;
use cp_leaderboard::roster::load_roster;
use cp_leaderboard::state::{self, AppState, ProviderCommand, Screen, apply_delta};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    table: TableState,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
            table: TableState::default(),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('d') | KeyCode::Enter => {
                if let Some(member_id) = self.state.open_profile() {
                    self.send(ProviderCommand::FetchHistory { member_id }, "History");
                }
            }
            KeyCode::Char('b') | KeyCode::Esc => self.state.close_profile(),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if !self.state.leaderboard.loading {
                    let reopen = self.state.begin_refresh();
                    self.send(ProviderCommand::Refresh, "Refresh");
                    if let Some(member_id) = reopen {
                        self.send(ProviderCommand::FetchHistory { member_id }, "History");
                    }
                }
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn send(&mut self, cmd: ProviderCommand, label: &str) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log(format!("[INFO] {label} unavailable"));
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log(format!("[WARN] {label} request failed"));
        } else {
            self.state.push_log(format!("[INFO] {label} request sent"));
        }
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    plain: bool,
    roster: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = CliArgs::default();
    for (idx, arg) in args.iter().enumerate() {
        if arg == "--plain" {
            out.plain = true;
        }
        if let Some(path) = arg.strip_prefix("--roster=") {
            if !path.trim().is_empty() {
                out.roster = Some(PathBuf::from(path.trim()));
            }
        }
        if arg == "--roster" {
            if let Some(next) = args.get(idx + 1).filter(|n| !n.trim().is_empty()) {
                out.roster = Some(PathBuf::from(next));
            }
        }
    }
    out
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = parse_args();
    let mut cfg = AppConfig::from_env();
    if args.roster.is_some() {
        cfg.roster_path = args.roster;
    }

    if args.plain {
        logging::init_stderr();
        return run_plain(&cfg);
    }

    let log_path = logging::init_file()?;
    let roster = load_roster(cfg.roster_path.as_deref())?;
    let provider = build_provider(&cfg)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(tx, cmd_rx, roster, provider, cfg);

    let mut app = App::new(Some(cmd_tx));
    if let Some(path) = log_path {
        app.state
            .push_log(format!("[INFO] Logging to {}", path.display()));
    }
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_plain(cfg: &AppConfig) -> Result<()> {
    let roster = load_roster(cfg.roster_path.as_deref())?;
    let provider = build_provider(cfg).context("build provider")?;
    let rows = assemble(&roster, provider.as_ref(), cfg.fetch_parallelism);

    println!(
        "{:>3}  {:<24} {:<6} {:<18} {:>6}  {:<26} {:<26}",
        "#", "Name", "Year", "Codeforces", "Rating", "Rank", "Max Rank"
    );
    for (idx, row) in rows.iter().enumerate() {
        println!(
            "{:>3}  {:<24} {:<6} {:<18} {:>6}  {:<26} {:<26}",
            idx + 1,
            row.name,
            row.year,
            row.cf_username,
            row.rating,
            format!("{} ({})", row.rank, row.rank_color.label()),
            format!("{} ({})", row.max_rank, row.max_rank_color.label()),
        );
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen.clone() {
        Screen::Leaderboard => render_leaderboard(frame, chunks[1], app),
        Screen::Profile { member_id } => render_profile(frame, chunks[1], &app.state, &member_id),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let status = if state.leaderboard.loading {
        "LOADING"
    } else {
        "READY"
    };
    match &state.screen {
        Screen::Leaderboard => format!(
            "LEADERBOARD | {} members | {status}",
            state.rows().len()
        ),
        Screen::Profile { member_id } => {
            let name = state
                .row_by_id(member_id)
                .map(|r| r.name.as_str())
                .unwrap_or(member_id.as_str());
            format!("PROFILE | {name}")
        }
    }
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Leaderboard => {
            "j/k/↑/↓ Move | Enter/d Profile | r Refresh | ? Help | q Quit".to_string()
        }
        Screen::Profile { .. } => "b/Esc Back | r Refresh | ? Help | q Quit".to_string(),
    }
}

fn render_leaderboard(frame: &mut Frame, area: Rect, app: &mut App) {
    let state = &app.state;
    if state.leaderboard.loading && state.rows().is_empty() {
        let loading = Paragraph::new("Loading leaderboard...")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(loading, area);
        return;
    }
    if state.rows().is_empty() {
        let empty = Paragraph::new("Roster is empty").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(
        [
            "#", "Name", "Year", "LeetCode", "CodeChef", "Codeforces", "Rating", "Rank",
            "Max Rank",
        ]
        .into_iter()
        .map(Cell::from),
    )
    .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Black).bg(Color::Cyan));

    let rows = state
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| leaderboard_row(idx, row));

    let widths = [
        Constraint::Length(4),
        Constraint::Min(16),
        Constraint::Length(6),
        Constraint::Length(16),
        Constraint::Length(16),
        Constraint::Length(18),
        Constraint::Length(7),
        Constraint::Length(26),
        Constraint::Length(26),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title("Leaderboard").borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    app.table.select(Some(app.state.selected));
    frame.render_stateful_widget(table, area, &mut app.table);
}

fn leaderboard_row(idx: usize, row: &LeaderboardRow) -> Row<'static> {
    Row::new(vec![
        Cell::from(format!("{}", idx + 1)),
        Cell::from(row.name.clone()),
        Cell::from(row.year.clone()),
        Cell::from(row.lc_username.clone()).style(Style::default().fg(Color::LightBlue)),
        Cell::from(row.cc_username.clone()).style(Style::default().fg(Color::LightBlue)),
        Cell::from(row.cf_username.clone()).style(Style::default().fg(Color::LightBlue)),
        Cell::from(row.rating.to_string()),
        Cell::from(row.rank.clone()).style(rank_style(row.rank_color)),
        Cell::from(row.max_rank.clone()).style(rank_style(row.max_rank_color)),
    ])
}

fn rank_style(color: RankColor) -> Style {
    let bg = match color {
        RankColor::Red => Color::Red,
        RankColor::Orange => Color::Rgb(249, 115, 22),
        RankColor::Blue => Color::Blue,
        RankColor::Cyan => Color::Cyan,
        RankColor::Green => Color::Green,
        RankColor::Gray => Color::Gray,
        RankColor::Unranked => Color::Magenta,
    };
    Style::default().fg(Color::White).bg(bg)
}

fn render_profile(frame: &mut Frame, area: Rect, state: &AppState, member_id: &str) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(1)])
        .split(area);

    let summary = Paragraph::new(profile_text(state, member_id))
        .block(Block::default().title("Member").borders(Borders::ALL));
    frame.render_widget(summary, sections[0]);

    let block = Block::default().title("Contests Rating").borders(Borders::ALL);
    let Some(history) = state.history.get(member_id) else {
        let text = if state.history_loading.contains(member_id) {
            "Loading contest history..."
        } else {
            "No history requested"
        };
        frame.render_widget(Paragraph::new(text).block(block), sections[1]);
        return;
    };
    if history.is_empty() {
        let empty = Paragraph::new("No Contests Data")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, sections[1]);
        return;
    }
    render_rating_chart(frame, sections[1], history, block);
}

fn profile_text(state: &AppState, member_id: &str) -> String {
    let Some(row) = state.row_by_id(member_id) else {
        return "Member not found".to_string();
    };
    [
        format!("{} ({})", row.name, row.year),
        format!(
            "Codeforces: {}  LeetCode: {}  CodeChef: {}",
            dash(&row.cf_username),
            dash(&row.lc_username),
            dash(&row.cc_username)
        ),
        format!("Rating: {} ({})", row.rating, row.rank),
        format!("Max:    {} ({})", row.max_rating, row.max_rank),
    ]
    .join("\n")
}

fn dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

fn series_points(series: &RatingSeries) -> Vec<(f64, f64)> {
    series
        .points
        .iter()
        .map(|p| (f64::from(p.date.num_days_from_ce()), p.rating as f64))
        .collect()
}

fn render_rating_chart(frame: &mut Frame, area: Rect, history: &NormalizedHistory, block: Block) {
    let Some(range) = chart_range(history) else {
        return;
    };
    let lc = series_points(&history.leetcode);
    let cf = series_points(&history.codeforces);

    let (x_min, x_max) = lc
        .iter()
        .chain(cf.iter())
        .fold((f64::MAX, f64::MIN), |(lo, hi), (x, _)| (lo.min(*x), hi.max(*x)));
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

    let mut datasets = Vec::new();
    if !lc.is_empty() {
        datasets.push(
            Dataset::default()
                .name("LeetCode Rating")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Rgb(121, 178, 250)))
                .data(&lc),
        );
    }
    if !cf.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Codeforces Rating")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Rgb(255, 99, 132)))
                .data(&cf),
        );
    }

    let x_labels = match history.axis_labels() {
        Some((first, last)) => vec![Span::raw(first.to_string()), Span::raw(last.to_string())],
        None => Vec::new(),
    };
    let mid = (range.min + range.max) / 2;
    let y_labels = vec![
        Span::raw(range.min.to_string()),
        Span::raw(mid.to_string()),
        Span::raw(range.max.to_string()),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([x_min, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Rating")
                .style(Style::default().fg(Color::DarkGray))
                .bounds([range.min as f64, range.max as f64])
                .labels(y_labels),
        );
    frame.render_widget(chart, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Leaderboard - Help",
        "",
        "Leaderboard:",
        "  j/k or ↑/↓   Move",
        "  Enter / d    Member profile",
        "  r            Refresh ratings",
        "",
        "Profile:",
        "  b / Esc      Back",
        "",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
