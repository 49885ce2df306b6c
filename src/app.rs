//! App: terminal init, main loop, fixed-rate ticks and key handling.

use crate::game::{Command, GameEvent, GameState, Phase};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::{Args, Difficulty, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Without key release events, a soft drop ends this long after the last press or repeat.
const SOFT_DROP_RELEASE_FALLBACK: Duration = Duration::from_millis(150);
/// How long a chain popup stays on screen.
pub const POPUP_LIFETIME: Duration = Duration::from_millis(1000);
/// Ticks run per frame at most; a longer stall drops the backlog.
const MAX_CATCH_UP_TICKS: u32 = 8;
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::MainMenu,
            Self::MainMenu => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::MainMenu => Self::Resume,
            Self::Exit => Self::MainMenu,
        }
    }
}

/// Title menu: difficulty row, then the start button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub selected_difficulty: Difficulty,
    pub start_focused: bool,
    pub animation_start: Instant,
}

impl MenuState {
    fn new(difficulty: Difficulty) -> Self {
        Self {
            selected_difficulty: difficulty,
            start_focused: false,
            animation_start: Instant::now(),
        }
    }
}

/// Floating "N Chain!" label anchored to a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPopup {
    pub chain: u32,
    pub points: u64,
    pub x: usize,
    pub y: usize,
    pub born: Instant,
}

impl ChainPopup {
    /// 0.0 when spawned, 1.0 when it should disappear.
    pub fn progress(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.born).as_secs_f64() / POPUP_LIFETIME.as_secs_f64()
    }
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    paused: bool,
    menu_state: MenuState,
    quit_selected: QuitOption,
    /// Best score this run; not persisted.
    best_score: u64,
    popups: Vec<ChainPopup>,
    /// Top cell of the groups currently erasing; where the next popup appears.
    popup_anchor: Option<(usize, usize)>,
    last_tick: Instant,
    tick_interval: Duration,
    /// Last press or repeat of the soft drop key.
    soft_drop_pressed: Option<Instant>,
    /// Set once the terminal reports a key release; disables the timed fallback.
    sees_release_events: bool,
    /// TachyonFX fade over the erasing cells (created when an erase starts).
    erase_effect: Option<Effect>,
    erase_effect_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Self {
        let state = GameState::new(&config);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let tick_interval = Duration::from_secs_f64(1.0 / args.tick_rate);
        Self {
            menu_state: MenuState::new(config.difficulty),
            args,
            config,
            theme,
            state,
            screen,
            paused: false,
            quit_selected: QuitOption::Resume,
            best_score: 0,
            popups: Vec::new(),
            popup_anchor: None,
            last_tick: Instant::now(),
            tick_interval,
            soft_drop_pressed: None,
            sees_release_events: false,
            erase_effect: None,
            erase_effect_time: None,
        }
    }

    /// Fresh session with the menu's difficulty. A new seed unless one was given.
    fn start_game(&mut self) {
        self.config.difficulty = self.menu_state.selected_difficulty;
        if self.args.seed.is_none() {
            self.config.seed = rand::random();
        }
        self.state = GameState::new(&self.config);
        self.enter_playing();
    }

    fn restart(&mut self) {
        self.state.apply(Command::Restart);
        self.enter_playing();
    }

    fn enter_playing(&mut self) {
        self.screen = Screen::Playing;
        self.paused = false;
        self.popups.clear();
        self.popup_anchor = None;
        self.soft_drop_pressed = None;
        self.erase_effect = None;
        self.erase_effect_time = None;
        self.last_tick = Instant::now();
    }

    fn end_soft_drop(&mut self) {
        self.soft_drop_pressed = None;
        self.state.apply(Command::SoftDropEnd);
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        // Release events end the soft drop; terminals without support fall back to a timer.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.popups.retain(|p| p.progress(now) < 1.0);
            if self.state.phase() != Phase::Erasing {
                self.erase_effect = None;
                self.erase_effect_time = None;
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &crate::ui::View {
                        screen: self.screen,
                        state: &self.state,
                        theme: &self.theme,
                        paused: self.paused,
                        menu: &self.menu_state,
                        quit_selected: self.quit_selected,
                        best_score: self.best_score,
                        popups: &self.popups,
                        animate: !self.args.no_animation,
                        tick_interval: self.tick_interval,
                        now,
                    },
                    &mut self.erase_effect,
                    &mut self.erase_effect_time,
                )
            })?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if self.handle_key(key) {
                            return Ok(());
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.expire_soft_drop();
                self.run_ticks();
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let action = key_to_action(key);
        if key.kind == KeyEventKind::Release {
            self.sees_release_events = true;
            if action == Action::SoftDrop {
                self.end_soft_drop();
            }
            return false;
        }
        let repeat = key.kind == KeyEventKind::Repeat;

        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return true,
                Action::MoveLeft if !self.menu_state.start_focused => {
                    self.menu_state.selected_difficulty =
                        self.menu_state.selected_difficulty.prev();
                }
                Action::MoveRight if !self.menu_state.start_focused => {
                    self.menu_state.selected_difficulty =
                        self.menu_state.selected_difficulty.next();
                }
                Action::SoftDrop | Action::RotateCcw | Action::RotateCw => {
                    self.menu_state.start_focused = !self.menu_state.start_focused;
                }
                Action::Confirm if !repeat => {
                    if self.menu_state.start_focused {
                        self.start_game();
                    } else {
                        self.menu_state.start_focused = true;
                    }
                }
                _ => {}
            },
            Screen::Playing if self.paused => match action {
                Action::Pause if !repeat => self.paused = false,
                Action::Quit => self.open_quit_menu(),
                Action::Restart => self.restart(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::Pause if !repeat => {
                    self.paused = true;
                    self.end_soft_drop();
                }
                Action::Quit => self.open_quit_menu(),
                Action::Restart if !repeat => self.restart(),
                Action::MoveLeft => {
                    self.state.apply(Command::MoveLeft);
                }
                Action::MoveRight => {
                    self.state.apply(Command::MoveRight);
                }
                Action::RotateCw if !repeat => {
                    self.state.apply(Command::RotateCw);
                }
                Action::RotateCcw if !repeat => {
                    self.state.apply(Command::RotateCcw);
                }
                Action::SoftDrop => {
                    self.soft_drop_pressed = Some(Instant::now());
                    self.state.apply(Command::SoftDropStart);
                }
                _ => {}
            },
            Screen::QuitMenu => match action {
                Action::SoftDrop | Action::MoveRight => {
                    self.quit_selected = self.quit_selected.next();
                }
                Action::RotateCcw | Action::RotateCw | Action::MoveLeft => {
                    self.quit_selected = self.quit_selected.prev();
                }
                Action::Confirm if !repeat => match self.quit_selected {
                    QuitOption::Resume => self.resume(),
                    QuitOption::MainMenu => {
                        self.menu_state = MenuState::new(self.config.difficulty);
                        self.screen = Screen::Menu;
                    }
                    QuitOption::Exit => return true,
                },
                Action::Pause | Action::Quit => self.resume(),
                _ => {}
            },
            Screen::GameOver => match action {
                Action::Quit => return true,
                Action::Restart => self.restart(),
                Action::Confirm if !repeat => {
                    self.menu_state = MenuState::new(self.config.difficulty);
                    self.screen = Screen::Menu;
                }
                _ => {}
            },
        }
        false
    }

    fn open_quit_menu(&mut self) {
        self.end_soft_drop();
        self.screen = Screen::QuitMenu;
        self.quit_selected = QuitOption::Resume;
    }

    fn resume(&mut self) {
        self.screen = Screen::Playing;
        self.last_tick = Instant::now();
    }

    fn expire_soft_drop(&mut self) {
        if self.sees_release_events || !self.state.is_soft_dropping() {
            self.soft_drop_pressed = None;
            return;
        }
        if self
            .soft_drop_pressed
            .is_some_and(|t| t.elapsed() >= SOFT_DROP_RELEASE_FALLBACK)
        {
            self.end_soft_drop();
        }
    }

    /// Advance the session by however many ticks are due.
    fn run_ticks(&mut self) {
        let mut ran = 0;
        while self.last_tick.elapsed() >= self.tick_interval {
            if ran == MAX_CATCH_UP_TICKS {
                self.last_tick = Instant::now();
                break;
            }
            self.last_tick += self.tick_interval;
            self.state.advance();
            if let Some(&(x, y)) = self
                .state
                .erasing()
                .iter()
                .flat_map(|g| g.cells.iter())
                .min_by_key(|(_, y)| *y)
            {
                self.popup_anchor = Some((x, y));
            }
            ran += 1;
        }
        self.absorb_events();
    }

    /// Popups from erase events; game-over screen and best score from the session.
    fn absorb_events(&mut self) {
        let now = Instant::now();
        for event in self.state.drain_events() {
            match event {
                GameEvent::Erased(erase) => {
                    let (x, y) = self.popup_anchor.take().unwrap_or_default();
                    self.popups.push(ChainPopup {
                        chain: erase.chain,
                        points: erase.points,
                        x,
                        y,
                        born: now,
                    });
                }
                GameEvent::PiecePlaced | GameEvent::ChainEnded { .. } | GameEvent::GameOver => {}
            }
        }
        if self.state.is_game_over() {
            self.end_soft_drop();
            self.screen = Screen::GameOver;
        }
        self.best_score = self.best_score.max(self.state.score());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    fn app(argv: &[&str]) -> App {
        let args = Args::try_parse_from(
            ["puyotui", "--no-menu", "--seed", "3"]
                .into_iter()
                .chain(argv.iter().copied()),
        )
        .unwrap();
        let config = GameConfig::from_args(&args).unwrap();
        App::new(args, config, Theme::default())
    }

    fn press(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_soft_drop_fallback_ends_without_release_events() {
        let mut app = app(&[]);
        assert!(!app.handle_key(press(KeyCode::Down, KeyEventKind::Press)));
        assert!(app.state.is_soft_dropping());

        // Fresh press: fallback has not expired yet.
        app.expire_soft_drop();
        assert!(app.state.is_soft_dropping());

        app.soft_drop_pressed = Some(Instant::now() - 2 * SOFT_DROP_RELEASE_FALLBACK);
        app.expire_soft_drop();
        assert!(!app.state.is_soft_dropping());
        assert!(app.soft_drop_pressed.is_none());
    }

    #[test]
    fn test_release_event_ends_soft_drop_and_disables_fallback() {
        let mut app = app(&[]);
        app.handle_key(press(KeyCode::Down, KeyEventKind::Press));
        app.handle_key(press(KeyCode::Down, KeyEventKind::Release));
        assert!(!app.state.is_soft_dropping());
        assert!(app.sees_release_events);
    }

    #[test]
    fn test_game_over_screen_follows_session() {
        let mut app = app(&["-d", "hard", "--width", "4", "--height", "4"]);
        assert_eq!(app.screen, Screen::Playing);
        for _ in 0..100_000 {
            if app.state.is_game_over() {
                break;
            }
            app.state.apply(Command::SoftDropStart);
            app.state.advance();
        }
        assert!(app.state.is_game_over());
        app.absorb_events();
        assert_eq!(app.screen, Screen::GameOver);
        assert_eq!(app.best_score, app.state.score());
        assert!(!app.state.is_soft_dropping());

        assert!(!app.handle_key(press(KeyCode::Char('r'), KeyEventKind::Press)));
        assert_eq!(app.screen, Screen::Playing);
        assert_eq!(app.state.phase(), Phase::Playing);
    }

    #[test]
    fn test_quit_option_cycles() {
        let mut o = QuitOption::Resume;
        for _ in 0..3 {
            o = o.next();
        }
        assert_eq!(o, QuitOption::Resume);
        assert_eq!(QuitOption::Resume.prev(), QuitOption::Exit);
        assert_eq!(QuitOption::Exit.prev().next(), QuitOption::Exit);
    }

    #[test]
    fn test_popup_progress() {
        let born = Instant::now();
        let popup = ChainPopup {
            chain: 2,
            points: 80,
            x: 0,
            y: 0,
            born,
        };
        assert_eq!(popup.progress(born), 0.0);
        assert!(popup.progress(born + POPUP_LIFETIME) >= 1.0);
        assert!(popup.progress(born + POPUP_LIFETIME / 2) < 1.0);
    }
}
