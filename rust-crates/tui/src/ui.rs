use crate::client::{AppSnapshot, DropView, LeaderboardRow};
use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use plinko::{Board, RevealState, RevealedSlot, sequencer::Popup};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Circle, Context, Line as CanvasLine, Points, Rectangle},
        *,
    },
};
use std::io::stdout;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const GOLD: Color = Color::Rgb(255, 215, 0);
const SILVER: Color = Color::Rgb(192, 192, 192);
const BRONZE: Color = Color::Rgb(205, 127, 50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    DropBall,
    NextDrop,
    PrevDrop,
    Join,
    OpenLeaderboard,
    CloseLeaderboard,
    Redraw,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    Leaderboard,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // one persistent Terminal so buffers survive between frames
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input closed")),
    }
}

pub fn close_overlay(state: &mut UiState) {
    state.mode = Mode::Normal;
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    // raw mode swallows SIGINT
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match state.mode {
        Mode::Leaderboard => match key.code {
            KeyCode::Esc | KeyCode::Char('l') | KeyCode::Char('q') => {
                state.mode = Mode::Normal;
                Some(UserEvent::CloseLeaderboard)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Char('d') | KeyCode::Char(' ') => Some(UserEvent::DropBall),
            KeyCode::Char('n') | KeyCode::Right => Some(UserEvent::NextDrop),
            KeyCode::Char('p') | KeyCode::Left => Some(UserEvent::PrevDrop),
            KeyCode::Char('j') => Some(UserEvent::Join),
            KeyCode::Char('l') => {
                state.mode = Mode::Leaderboard;
                Some(UserEvent::OpenLeaderboard)
            }
            _ => None,
        },
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // drop info + prizes
            Constraint::Min(12),   // board
            Constraint::Length(4), // slot labels
            Constraint::Length(5), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    draw_board(f, chunks[1], snap);
    draw_slots(f, chunks[2], snap);
    draw_bottom(f, chunks[3], chunks[4], snap);
    if let Some(popup) = snap.popup.as_ref() {
        draw_popup(f, popup);
    }
    if state.mode == Mode::Leaderboard {
        draw_leaderboard(f, snap);
    }
}

fn drop_state_label(view: &DropView) -> &'static str {
    let info = &view.info;
    if info.is_cancelled() {
        "Cancelled"
    } else if info.is_completed {
        "Completed"
    } else if info.is_unfunded_sponsored() {
        "Awaiting sponsor"
    } else if info.is_full() {
        "Full"
    } else {
        "Open"
    }
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let title = format!("Drop #{} of {}", snap.drop_id, snap.drop_count);
    let Some(view) = snap.drop.as_ref() else {
        let widget = Paragraph::new("Loading drop...")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(widget, area);
        return;
    };
    let info = &view.info;
    let selection = if info.is_manual_selection { "host selects" } else { "automatic" };
    let mut lines = vec![
        Line::from(format!(
            "{} | {} | winners: {} ({selection})",
            drop_state_label(view),
            info.reward_type,
            info.num_winners
        )),
        Line::from(format!(
            "Players: {}/{}{}",
            info.current_participants,
            info.max_participants,
            if info.is_paid_entry { " | paid entry" } else { "" }
        )),
        Line::from(format!("Host: {}{}", info.host, if snap.is_host { " (you)" } else { "" })),
    ];
    if let Some(deadline) = info.funding_deadline_at() {
        lines.push(Line::from(format!("Funding deadline: {}", deadline.format("%Y-%m-%d %H:%M UTC"))));
    }
    if let Some(hint) = snap.manual_hint.as_ref() {
        lines.push(Line::from(Span::styled(hint.clone(), Style::default().fg(Color::Yellow))));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, cols[0]);

    let prizes: Vec<Line> = view
        .prizes
        .iter()
        .enumerate()
        .map(|(i, prize)| Line::from(Span::styled(prize.clone(), Style::default().fg(rank_color(i + 1)))))
        .collect();
    let widget = Paragraph::new(prizes)
        .block(Block::default().borders(Borders::ALL).title(format!("Prizes ({})", view.token.symbol)));
    f.render_widget(widget, cols[1]);
}

pub(crate) fn rank_color(rank: usize) -> Color {
    match rank {
        1 => GOLD,
        2 => SILVER,
        _ => BRONZE,
    }
}

fn rank_of(revealed: &[RevealedSlot], slot: usize) -> Option<usize> {
    revealed.iter().find(|r| r.slot == slot).map(|r| r.rank)
}

/// Board coordinates grow downwards, canvas coordinates upwards.
fn flip(board: &Board, y: f64) -> f64 {
    board.height() - y
}

fn paint_board(ctx: &mut Context<'_>, snap: &AppSnapshot) {
    let board = &snap.board;
    for peg in board.pegs() {
        ctx.draw(&Circle {
            x: peg.x,
            y: flip(board, peg.y),
            radius: board.peg_radius(),
            color: Color::DarkGray,
        });
    }
    let slot_width = board.slot_width();
    for i in 0..=board.slot_count() {
        let x = i as f64 * slot_width;
        ctx.draw(&CanvasLine {
            x1: x,
            y1: 0.0,
            x2: x,
            y2: board.slot_height(),
            color: Color::Gray,
        });
    }
    ctx.layer();
    for revealed in &snap.revealed {
        ctx.draw(&Rectangle {
            x: revealed.slot as f64 * slot_width,
            y: 0.0,
            width: slot_width,
            height: board.slot_height(),
            color: rank_color(revealed.rank),
        });
    }
    let Some(ball) = snap.ball.as_ref() else {
        return;
    };
    let (bright, dim): (Vec<_>, Vec<_>) = ball.particles.iter().partition(|p| p.alpha > 0.5);
    let coords = |particles: &[&plinko::Particle]| -> Vec<(f64, f64)> {
        particles.iter().map(|p| (p.x, flip(board, p.y))).collect()
    };
    ctx.draw(&Points {
        coords: &coords(&dim),
        color: Color::Red,
    });
    ctx.draw(&Points {
        coords: &coords(&bright),
        color: Color::LightYellow,
    });
    ctx.layer();
    ctx.draw(&Circle {
        x: ball.x,
        y: flip(board, ball.y),
        radius: board.ball_radius(),
        color: Color::LightRed,
    });
}

fn draw_board(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let title = match snap.reveal_state {
        RevealState::Idle => "Board".to_string(),
        RevealState::Dropping { rank_index } => format!("Board | dropping ball {}", rank_index + 1),
        RevealState::Complete { .. } => "Board | winners revealed".to_string(),
    };
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([0.0, snap.board.width()])
        .y_bounds([0.0, snap.board.height()])
        .paint(|ctx| paint_board(ctx, snap));
    f.render_widget(canvas, area);
}

/// Pads or truncates `text` to exactly `width` terminal columns, centred.
pub(crate) fn fit_to_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let text_width = UnicodeWidthStr::width(text);
    if text_width <= width {
        let left = (width - text_width) / 2;
        let right = width - text_width - left;
        return format!("{}{text}{}", " ".repeat(left), " ".repeat(right));
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width - used));
    out
}

fn slot_cells(snap: &AppSnapshot, inner_width: u16) -> (Line<'static>, Line<'static>) {
    let count = snap.board.slot_count().max(1);
    let cell = usize::from(inner_width) / count;
    let labels = snap.drop.as_ref().map(|view| view.labels.as_slice()).unwrap_or(&[]);
    let mut numbers = Vec::with_capacity(count);
    let mut names = Vec::with_capacity(count);
    for slot in 0..count {
        let style = match rank_of(&snap.revealed, slot) {
            Some(rank) => Style::default().fg(Color::Black).bg(rank_color(rank)),
            None => Style::default(),
        };
        numbers.push(Span::styled(fit_to_width(&(slot + 1).to_string(), cell), style));
        let label = labels.get(slot).cloned().flatten();
        let name_style = if label.is_some() { style } else { style.fg(Color::DarkGray) };
        names.push(Span::styled(
            fit_to_width(label.as_deref().unwrap_or("-"), cell),
            name_style,
        ));
    }
    (Line::from(numbers), Line::from(names))
}

fn draw_slots(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Slots");
    let inner = block.inner(area);
    let (numbers, names) = slot_cells(snap, inner.width);
    f.render_widget(block, area);
    f.render_widget(Paragraph::new(vec![numbers, names]), inner);
}

fn draw_bottom(f: &mut Frame, status_area: Rect, help_area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        if snap.profiles_loading {
            lines.push(Line::from("Loading profiles..."));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, status_area);

    let help = Paragraph::new(
        "←/→ or p/n drop | d drop ball (host) | j join | l leaderboard | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, help_area);
}

/// Fades the summary popup out over its last second.
pub(crate) fn popup_style(alpha: f64) -> Option<Style> {
    if alpha <= 0.0 {
        None
    } else if alpha > 0.66 {
        Some(Style::default().fg(GOLD).add_modifier(Modifier::BOLD))
    } else if alpha > 0.33 {
        Some(Style::default().fg(Color::Yellow))
    } else {
        Some(Style::default().fg(Color::DarkGray))
    }
}

fn draw_popup(f: &mut Frame, popup: &Popup) {
    let Some(style) = popup_style(popup.alpha) else {
        return;
    };
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Winners")
        .border_style(style);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let text = Paragraph::new(popup.message.clone())
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(text, inner);
}

fn leaderboard_lines(rows: &[LeaderboardRow]) -> Vec<Line<'static>> {
    if rows.is_empty() {
        return vec![Line::from("No completed drops yet")];
    }
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let place = Span::styled(
                format!("{:>2}. ", i + 1),
                Style::default().fg(if i < 3 { rank_color(i + 1) } else { Color::Gray }),
            );
            let plural = if row.wins == 1 { "" } else { "s" };
            Line::from(vec![
                place,
                Span::styled(row.label.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("  {} win{plural}  {}", row.wins, row.prizes)),
            ])
        })
        .collect()
}

fn draw_leaderboard(f: &mut Frame, snap: &AppSnapshot) {
    let area = centered_rect(70, 60, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Leaderboard (Esc to close)");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let lines = match snap.leaderboard.as_ref() {
        Some(rows) => leaderboard_lines(rows),
        None => vec![Line::from("Loading...")],
    };
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
