//! Game session: owns board, falling pair and queue; one phase step per tick.

use crate::GameConfig;
use crate::board::{Board, Group};
use crate::piece::{PairQueue, Piece, PuyoPair};
use crate::resolve::{EraseEvent, Resolver, ScanOutcome};
use crate::rules::{self, Spin};

/// Drop interval in ticks while soft drop is held.
pub const SOFT_DROP_INTERVAL: u32 = 2;

/// Session phase. `Checking` branches to `Erasing`, `Playing` or `GameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A pair is falling under player control.
    Playing,
    /// Gravity after a placement.
    Dropping,
    /// One connectivity scan.
    Checking,
    /// Erase dwell for the groups just found.
    Erasing,
    /// Gravity after an erase.
    ChainDropping,
    GameOver,
}

/// Player commands. Everything except `Restart` and `SoftDropEnd` is ignored outside `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    RotateCw,
    RotateCcw,
    SoftDropStart,
    SoftDropEnd,
    Restart,
}

/// Things the presentation layer may want to react to, drained once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    PiecePlaced,
    Erased(EraseEvent),
    /// A scan found nothing after `chain` consecutive erases.
    ChainEnded { chain: u32 },
    GameOver,
}

/// Whole game: board, active pair, lookahead, score and phase.
#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    board: Board,
    piece: Option<Piece>,
    queue: PairQueue,
    phase: Phase,
    resolver: Resolver,
    score: u64,
    drop_timer: u32,
    soft_drop: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(config: &GameConfig) -> Self {
        let mut state = Self {
            config: config.clone(),
            board: Board::new(config.width, config.height),
            piece: None,
            queue: PairQueue::new(config.seed),
            phase: Phase::Playing,
            resolver: Resolver::new(),
            score: 0,
            drop_timer: 0,
            soft_drop: false,
            events: Vec::new(),
        };
        state.spawn_next();
        state
    }

    /// Fresh board, score and queue. The pair generator keeps its stream.
    pub fn restart(&mut self) {
        self.board = Board::new(self.config.width, self.config.height);
        self.piece = None;
        self.queue.reset();
        self.resolver = Resolver::new();
        self.score = 0;
        self.drop_timer = 0;
        self.soft_drop = false;
        self.events.clear();
        self.spawn_next();
    }

    /// Apply a player command. Returns false when it was ignored or had no effect.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Restart => {
                self.restart();
                return true;
            }
            // Release always restores the base interval so a soft drop cannot stick.
            Command::SoftDropEnd => {
                let was = self.soft_drop;
                self.soft_drop = false;
                return was;
            }
            _ => {}
        }
        if self.phase != Phase::Playing {
            return false;
        }
        let Some(piece) = self.piece.as_mut() else {
            return false;
        };
        match command {
            Command::MoveLeft => rules::move_horizontal(&self.board, piece, -1),
            Command::MoveRight => rules::move_horizontal(&self.board, piece, 1),
            Command::RotateCw => rules::rotate(&self.board, piece, Spin::Cw),
            Command::RotateCcw => rules::rotate(&self.board, piece, Spin::Ccw),
            Command::SoftDropStart => {
                let was = self.soft_drop;
                self.soft_drop = true;
                !was
            }
            Command::SoftDropEnd | Command::Restart => false,
        }
    }

    /// One fixed time step.
    pub fn advance(&mut self) {
        match self.phase {
            Phase::Playing => self.tick_playing(),
            Phase::Dropping | Phase::ChainDropping => self.tick_settle(),
            Phase::Checking => self.tick_checking(),
            Phase::Erasing => self.tick_erasing(),
            Phase::GameOver => {}
        }
    }

    fn tick_playing(&mut self) {
        let interval = self.drop_interval();
        let Some(piece) = self.piece.as_mut() else {
            return;
        };
        self.drop_timer += 1;
        if self.drop_timer < interval {
            return;
        }
        self.drop_timer = 0;
        if rules::can_drop_one_row(&self.board, piece) {
            piece.y += 1;
            return;
        }
        if let Some(piece) = self.piece.take() {
            rules::place(&mut self.board, piece);
            self.events.push(GameEvent::PiecePlaced);
            self.phase = Phase::Dropping;
        }
    }

    fn tick_settle(&mut self) {
        if !self.board.settle_step() {
            self.phase = Phase::Checking;
        }
    }

    fn tick_checking(&mut self) {
        match self.resolver.scan(&self.board) {
            ScanOutcome::Found { .. } => self.phase = Phase::Erasing,
            ScanOutcome::Settled { ended_chain } => {
                if ended_chain > 0 {
                    self.events.push(GameEvent::ChainEnded { chain: ended_chain });
                }
                if self.board.spawn_zone_blocked() {
                    self.end_game();
                } else {
                    self.spawn_next();
                }
            }
        }
    }

    fn tick_erasing(&mut self) {
        if let Some(event) = self.resolver.tick_erase(&mut self.board) {
            self.score = self.score.saturating_add(event.points);
            self.events.push(GameEvent::Erased(event));
            self.phase = Phase::ChainDropping;
        }
    }

    /// Promote NEXT to the board; game over if its spawn cells are taken.
    fn spawn_next(&mut self) {
        let colors = self.queue.pop();
        self.drop_timer = 0;
        match rules::spawn(&self.board, colors) {
            Some(piece) => {
                self.piece = Some(piece);
                self.phase = Phase::Playing;
            }
            None => self.end_game(),
        }
    }

    fn end_game(&mut self) {
        self.piece = None;
        self.soft_drop = false;
        self.phase = Phase::GameOver;
        self.events.push(GameEvent::GameOver);
    }

    /// Ticks between drop steps: the difficulty's base, or the soft-drop minimum.
    pub fn drop_interval(&self) -> u32 {
        if self.soft_drop {
            SOFT_DROP_INTERVAL
        } else {
            self.config.difficulty.drop_interval()
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn piece(&self) -> Option<&Piece> {
        self.piece.as_ref()
    }

    /// The active pair moved to its landing row.
    pub fn ghost(&self) -> Option<Piece> {
        self.piece.map(|p| Piece {
            y: rules::ghost_row(&self.board, &p),
            ..p
        })
    }

    pub fn next(&self) -> PuyoPair {
        self.queue.next()
    }

    pub fn next_next(&self) -> PuyoPair {
        self.queue.next_next()
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn chain(&self) -> u32 {
        self.resolver.chain()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn is_soft_dropping(&self) -> bool {
        self.soft_drop
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Groups about to be erased; empty outside `Erasing`.
    pub fn erasing(&self) -> &[Group] {
        if self.phase == Phase::Erasing {
            self.resolver.pending()
        } else {
            &[]
        }
    }

    /// Ticks into the current erase dwell.
    pub fn erase_timer(&self) -> u32 {
        self.resolver.erase_timer()
    }

    /// Take every event since the last call.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
