//! Layout and drawing: menu, board, ghost, sidebar, popups, pause, game over, quit menu.

use crate::app::{ChainPopup, MenuState, QuitOption, Screen};
use crate::board::{Cell, Group, HIDDEN_ROWS, PuyoColor};
use crate::game::GameState;
use crate::piece::PuyoPair;
use crate::resolve::ERASE_DWELL_TICKS;
use crate::theme::Theme;
use crate::Difficulty;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per board cell.
const CELL_WIDTH: u16 = 2;
const PUYO: &str = "██";
const GHOST: &str = "░░";
const DEATH_MARK: &str = "××";
const SIDEBAR_WIDTH: u16 = 24;
const SIDEBAR_MIN_HEIGHT: u16 = 21;
/// Erasing cells flash at this period (ticks per phase).
const BLINK_TICKS: u32 = 4;
/// Rows a chain popup floats up over its lifetime.
const POPUP_RISE_ROWS: f64 = 3.0;

/// Everything a frame needs from the app.
pub struct View<'a> {
    pub screen: Screen,
    pub state: &'a GameState,
    pub theme: &'a Theme,
    pub paused: bool,
    pub menu: &'a MenuState,
    pub quit_selected: QuitOption,
    pub best_score: u64,
    pub popups: &'a [ChainPopup],
    pub animate: bool,
    pub tick_interval: Duration,
    pub now: Instant,
}

fn bold(style: Style) -> Style {
    style.add_modifier(Modifier::BOLD)
}

/// Board size in terminal cells including the border.
fn playfield_size(state: &GameState) -> (u16, u16) {
    let board = state.board();
    (
        board.width as u16 * CELL_WIDTH + 2,
        board.visible_rows() as u16 + 2,
    )
}

/// Terminal position of board cell (x, y), or None for hidden rows.
fn cell_origin(board_rect: Rect, x: usize, y: usize) -> Option<(u16, u16)> {
    let row = y.checked_sub(HIDDEN_ROWS)?;
    Some((
        board_rect.x + x as u16 * CELL_WIDTH,
        board_rect.y + row as u16,
    ))
}

/// Writes `symbol` at (x, y) only if the whole string fits in `clip`.
fn put(buf: &mut Buffer, clip: Rect, x: u16, y: u16, symbol: &str, style: Style) {
    let width = symbol.chars().count() as u16;
    let fits = clip.contains(Position { x, y })
        && (width == 0 || clip.contains(Position { x: x + width - 1, y }));
    if fits {
        buf.set_string(x, y, symbol, style);
    }
}

pub fn draw(
    frame: &mut Frame,
    view: &View,
    erase_effect: &mut Option<Effect>,
    erase_effect_time: &mut Option<Instant>,
) {
    let area = frame.area();
    if view.screen == Screen::Menu {
        draw_menu(frame, view, area);
        return;
    }
    let board_rect = draw_game(frame, view, area);
    if view.animate && !view.state.erasing().is_empty() {
        apply_erase_effect(frame, view, board_rect, erase_effect, erase_effect_time);
    }
    match view.screen {
        Screen::Playing if view.paused => draw_pause_overlay(frame, view.theme, area),
        Screen::QuitMenu => draw_quit_menu(frame, view.theme, view.quit_selected),
        Screen::GameOver => draw_game_over(frame, view, area),
        _ => {}
    }
}

/// Fade the erasing cells to the background over the erase dwell.
fn apply_erase_effect(
    frame: &mut Frame,
    view: &View,
    board_rect: Rect,
    erase_effect: &mut Option<Effect>,
    erase_effect_time: &mut Option<Instant>,
) {
    let delta = erase_effect_time
        .map(|t| view.now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    *erase_effect_time = Some(view.now);

    if erase_effect.is_none() {
        let groups = view.state.erasing();
        let cells: usize = groups.iter().map(Group::len).sum();
        let mut erasing = HashSet::with_capacity(cells * CELL_WIDTH as usize);
        for (x, y) in groups.iter().flat_map(|g| g.cells.iter()) {
            if let Some((bx, by)) = cell_origin(board_rect, *x, *y) {
                for dx in 0..CELL_WIDTH {
                    erasing.insert((bx + dx, by));
                }
            }
        }
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            erasing.contains(&(pos.x, pos.y))
        }));
        let fade_ms = (view.tick_interval * ERASE_DWELL_TICKS)
            .as_millis()
            .min(u32::MAX as u128) as u32;
        let bg = view.theme.bg;
        let effect = fx::fade_to(bg, bg, (fade_ms, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board_rect);
        *erase_effect = Some(effect);
    }

    if let Some(effect) = erase_effect {
        let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
        frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_menu(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let menu = view.menu;
    let popup_w = 44u16;
    let popup_h = 17u16;

    let highlight = bold(Style::default().fg(Color::Black).bg(theme.puyo_color(3)));
    let selected = bold(Style::default().fg(theme.puyo_color(3)));
    let normal = Style::default().fg(theme.main_fg);

    let title = Line::from(vec![
        Span::styled(" Puyo ", bold(Style::default().fg(theme.puyo_color(0)))),
        Span::styled(" tui ", bold(Style::default().fg(theme.main_fg))),
    ]);
    let dots = Line::from(
        (0..4u8)
            .map(|i| Span::styled("● ", Style::default().fg(theme.puyo_color(i))))
            .collect::<Vec<_>>(),
    );

    let difficulty_span = |d: Difficulty| {
        let style = if menu.selected_difficulty != d {
            normal
        } else if menu.start_focused {
            selected
        } else {
            highlight
        };
        Span::styled(format!(" {} ", d.label().to_uppercase()), style)
    };
    let start_style = if menu.start_focused { highlight } else { normal };
    let key_style = Style::default().fg(theme.puyo_color(2));

    let lines = vec![
        Line::from(""),
        title,
        dots,
        Line::from(""),
        Line::from(Span::styled(
            " ─ DIFFICULTY ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(vec![
            difficulty_span(Difficulty::Easy),
            Span::from("  "),
            difficulty_span(Difficulty::Medium),
            Span::from("  "),
            difficulty_span(Difficulty::Hard),
        ]),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(" [ START ] ", start_style)),
        Line::from(""),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↕ ", key_style),
            Span::from("NAVIGATE   "),
            Span::styled(" ↔ ", key_style),
            Span::from("CHANGE   "),
            Span::styled(" ENTER ", key_style),
            Span::from("START"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(theme.puyo_color(0)),
        )),
    ];

    // Slide in from below, ease-out cubic.
    let elapsed = view.now.saturating_duration_since(menu.animation_start).as_millis() as f32;
    let t = (elapsed / 500.0).min(1.0);
    let offset = ((1.0 - t).powi(3) * 10.0) as u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2 + offset,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    }
    .intersection(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

/// Board and sidebar centred in `area`. Returns the board's inner rect.
fn draw_game(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let (pw, ph) = playfield_size(view.state);
    let total_w = pw + SIDEBAR_WIDTH;
    let total_h = ph.max(SIDEBAR_MIN_HEIGHT);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let playfield_area = Rect {
        height: ph.min(columns[0].height),
        ..columns[0]
    };

    let board_rect = draw_playfield(frame, view, playfield_area);
    draw_popups(frame, view, board_rect);
    draw_sidebar(frame, view, columns[1]);
    board_rect
}

fn draw_playfield(frame: &mut Frame, view: &View, area: Rect) -> Rect {
    let state = view.state;
    let theme = view.theme;
    let board = state.board();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Puyotui ", theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let board_rect = Rect {
        width: (board.width as u16 * CELL_WIDTH).min(inner.width),
        height: (board.visible_rows() as u16).min(inner.height),
        ..inner
    };
    let buf = frame.buffer_mut();
    let bg = Style::default().bg(theme.bg);
    let erasing: HashSet<(usize, usize)> = state
        .erasing()
        .iter()
        .flat_map(|g| g.cells.iter().copied())
        .collect();
    let flash = !erasing.is_empty() && (state.erase_timer() / BLINK_TICKS) % 2 == 1;

    for (y, row) in board.rows().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let Some((rx, ry)) = cell_origin(board_rect, x, y) else {
                continue;
            };
            let (symbol, style) = match cell {
                Cell::Empty => ("  ", bg),
                Cell::Puyo(_) if flash && erasing.contains(&(x, y)) => (PUYO, bg.fg(Color::White)),
                Cell::Puyo(c) => (PUYO, bg.fg(theme.puyo_color(c.index()))),
            };
            put(buf, board_rect, rx, ry, symbol, style);
        }
    }

    // Death mark where the next pair would be buried.
    let death_x = board.spawn_column();
    if board.get(death_x as i32, HIDDEN_ROWS as i32) == Some(Cell::Empty) {
        if let Some((rx, ry)) = cell_origin(board_rect, death_x, HIDDEN_ROWS) {
            put(buf, board_rect, rx, ry, DEATH_MARK, bg.fg(theme.puyo_color(0)));
        }
    }

    if let Some(ghost) = state.ghost() {
        for ((x, y), color) in ghost.cells() {
            if !board.is_empty(x, y) {
                continue;
            }
            if let Some((rx, ry)) = cell_origin(board_rect, x as usize, y as usize) {
                put(buf, board_rect, rx, ry, GHOST, bg.fg(theme.puyo_color(color.index())));
            }
        }
    }

    if let Some(piece) = state.piece() {
        for ((x, y), color) in piece.cells() {
            if x < 0 || y < 0 {
                continue;
            }
            if let Some((rx, ry)) = cell_origin(board_rect, x as usize, y as usize) {
                put(buf, board_rect, rx, ry, PUYO, bg.fg(theme.puyo_color(color.index())));
            }
        }
    }
    board_rect
}

/// "N Chain!" labels rising from where the chain erased.
fn draw_popups(frame: &mut Frame, view: &View, board_rect: Rect) {
    let style = bold(Style::default().fg(view.theme.title).bg(view.theme.bg));
    for popup in view.popups {
        let progress = popup.progress(view.now).clamp(0.0, 1.0);
        let label = format!("{} Chain!", popup.chain);
        let len = label.chars().count() as u16;
        let row = popup.y.saturating_sub(HIDDEN_ROWS) as u16;
        let rise = (progress * POPUP_RISE_ROWS) as u16;
        let ry = board_rect.y + row.saturating_sub(rise).min(board_rect.height.saturating_sub(1));
        let max_x = (board_rect.x + board_rect.width).saturating_sub(len);
        let rx = (board_rect.x + popup.x as u16 * CELL_WIDTH).min(max_x).max(board_rect.x);
        put(frame.buffer_mut(), board_rect, rx, ry, &label, style);
        let points = format!("+{}", popup.points);
        let px = (board_rect.x + popup.x as u16 * CELL_WIDTH)
            .min((board_rect.x + board_rect.width).saturating_sub(points.len() as u16))
            .max(board_rect.x);
        put(frame.buffer_mut(), board_rect, px, ry + 1, &points, style);
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let state = view.state;
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Next (border + title + pair)
            Constraint::Length(1),
            Constraint::Length(6), // Stats
            Constraint::Length(1),
            Constraint::Length(8), // Controls
        ])
        .split(area);

    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Next ", title_style));
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Fill(1), Constraint::Fill(1)])
        .split(next_inner);
    draw_pair_preview(frame, theme, halves[0], state.next());
    draw_pair_preview(frame, theme, halves[1], state.next_next());

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let chain = state.chain();
    Paragraph::new(vec![
        stat("Score: ", state.score().to_string()),
        stat("Best:  ", view.best_score.to_string()),
        stat("Chain: ", if chain > 0 { chain.to_string() } else { "-".into() }),
        stat("Level: ", state.config().difficulty.label().to_string()),
    ])
    .render(stats_inner, frame.buffer_mut());

    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("{k:<8}"), Style::default().fg(theme.puyo_color(2))),
            Span::styled(what, fg_style),
        ])
    };
    Paragraph::new(vec![
        key("← →", "Move"),
        key("↑ Z", "Rotate ↺"),
        key("X", "Rotate ↻"),
        key("↓", "Soft drop"),
        key("P  R", "Pause  Restart"),
        key("Q", "Menu"),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style),
    )
    .render(chunks[4], frame.buffer_mut());
}

/// Pair drawn upright, satellite above pivot, centred in `area`.
fn draw_pair_preview(frame: &mut Frame, theme: &Theme, area: Rect, pair: PuyoPair) {
    let x = area.x + area.width.saturating_sub(CELL_WIDTH) / 2;
    let y = area.y + area.height.saturating_sub(2) / 2;
    let buf = frame.buffer_mut();
    let style = |c: PuyoColor| {
        Style::default()
            .fg(theme.puyo_color(c.index()))
            .bg(theme.bg)
    };
    put(buf, area, x, y, PUYO, style(pair.satellite));
    put(buf, area, x, y + 1, PUYO, style(pair.pivot));
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(theme.puyo_color(3)),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P Resume    Q Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let score = view.state.score();
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(theme.puyo_color(0)),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {score} "), fg)),
        Line::from(Span::styled(format!(" Best: {} ", view.best_score), fg)),
    ];
    if score > 0 && score >= view.best_score {
        lines.push(Line::from(Span::styled(
            " New best! ",
            bold(Style::default().fg(theme.puyo_color(3))),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" R Restart   Enter Menu   Q Quit ", fg)));

    let popup = centered(area, 38, lines.len() as u16 + 3);
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Puyotui ", theme.title)),
        )
        .render(popup, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centered(frame.area(), 24, 8);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title).bg(theme.bg))
        .title(" Quit? ");

    Clear.render(quit_rect, frame.buffer_mut());
    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            bold(Style::default().fg(theme.bg).bg(theme.title))
        } else {
            Style::default().fg(theme.title).bg(theme.bg)
        };
        let rx = inner.x + inner.width.saturating_sub(label.len() as u16) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        put(frame.buffer_mut(), inner, rx, ry, label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use crate::game::Command;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(state: &GameState, screen: Screen, width: u16, height: u16) -> Buffer {
        let theme = Theme::default();
        let menu = MenuState {
            selected_difficulty: Difficulty::Medium,
            start_focused: false,
            animation_start: Instant::now(),
        };
        let view = View {
            screen,
            state,
            theme: &theme,
            paused: false,
            menu: &menu,
            quit_selected: QuitOption::Resume,
            best_score: 0,
            popups: &[],
            animate: false,
            tick_interval: Duration::from_millis(16),
            now: Instant::now(),
        };
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| draw(f, &view, &mut None, &mut None))
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn contains(buf: &Buffer, needle: &str) -> bool {
        let area = buf.area;
        (area.y..area.y + area.height).any(|y| {
            let row: String = (area.x..area.x + area.width)
                .map(|x| buf[(x, y)].symbol())
                .collect();
            row.contains(needle)
        })
    }

    #[test]
    fn test_playing_screen_shows_piece_ghost_and_panel() {
        let state = GameState::new(&GameConfig::default());
        let buf = render(&state, Screen::Playing, 80, 24);
        assert!(contains(&buf, "Puyotui"));
        assert!(contains(&buf, "Score: 0"));
        assert!(contains(&buf, "Medium"));
        assert!(contains(&buf, GHOST));
        assert!(contains(&buf, PUYO));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let mut state = GameState::new(&GameConfig::default());
        render(&state, Screen::Playing, 10, 5);
        render(&state, Screen::Menu, 10, 5);
        state.apply(Command::Restart);
        render(&state, Screen::QuitMenu, 3, 2);
        render(&state, Screen::GameOver, 1, 1);
    }

    #[test]
    fn test_menu_and_game_over_text() {
        let state = GameState::new(&GameConfig::default());
        assert!(contains(&render(&state, Screen::Menu, 80, 24), "START"));
        assert!(contains(&render(&state, Screen::GameOver, 80, 24), "Game Over"));
    }
}
