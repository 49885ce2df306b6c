//! Resolution engine: settle, scan, erase, chain.
//!
//! The session drives it one step per tick through [`Resolver`]. Tests run the same
//! pipeline to completion with `resolve_all`, without the erase dwell.

use crate::board::{Board, Group};

/// Ticks the erase animation dwells before cells are removed.
pub const ERASE_DWELL_TICKS: u32 = 20;

/// Points per erased cell at chain 1.
pub const POINTS_PER_CELL: u64 = 10;

/// Points for erasing `cells` cells at chain level `chain` (1-based).
/// Level 1 multiplies by 1, each further level doubles.
pub fn chain_points(cells: usize, chain: u32) -> u64 {
    let multiplier = 1u64.checked_shl(chain.saturating_sub(1)).unwrap_or(u64::MAX);
    (cells as u64)
        .saturating_mul(POINTS_PER_CELL)
        .saturating_mul(multiplier)
}

/// Apply settle steps until one moves nothing. Returns how many steps moved something.
#[cfg(test)]
pub fn settle(board: &mut Board) -> usize {
    let mut steps = 0;
    while board.settle_step() {
        steps += 1;
    }
    steps
}

/// One completed erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseEvent {
    /// Cells removed across every group of the pass.
    pub cells: usize,
    pub groups: usize,
    pub chain: u32,
    pub points: u64,
}

/// Result of a connectivity scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Groups found; the chain counter now holds this level.
    Found { chain: u32 },
    /// Nothing to erase; the chain that just ended (0 if none).
    Settled { ended_chain: u32 },
}

/// Chain counter, erase timer and the groups waiting to be erased.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    chain: u32,
    erase_timer: u32,
    pending: Vec<Group>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current chain level (0 when no chain is running).
    pub fn chain(&self) -> u32 {
        self.chain
    }

    /// Groups found by the last scan that have not been erased yet.
    pub fn pending(&self) -> &[Group] {
        &self.pending
    }

    /// Ticks spent in the current erase dwell.
    pub fn erase_timer(&self) -> u32 {
        self.erase_timer
    }

    /// Scan once. Groups found bump the chain and reset the dwell; none ends the chain.
    pub fn scan(&mut self, board: &Board) -> ScanOutcome {
        let groups = board.scan_erasable_groups();
        if groups.is_empty() {
            let ended_chain = self.chain;
            self.chain = 0;
            self.pending.clear();
            ScanOutcome::Settled { ended_chain }
        } else {
            self.chain += 1;
            self.erase_timer = 0;
            self.pending = groups;
            ScanOutcome::Found { chain: self.chain }
        }
    }

    /// Advance the dwell by one tick; on the last tick erase every pending cell at once.
    pub fn tick_erase(&mut self, board: &mut Board) -> Option<EraseEvent> {
        self.erase_timer += 1;
        if self.erase_timer < ERASE_DWELL_TICKS {
            return None;
        }
        Some(self.erase_now(board))
    }

    /// Erase every pending cell immediately and score the pass.
    pub fn erase_now(&mut self, board: &mut Board) -> EraseEvent {
        let groups = std::mem::take(&mut self.pending);
        let cells: Vec<(usize, usize)> = groups
            .iter()
            .flat_map(|g| g.cells.iter().copied())
            .collect();
        board.erase(&cells);
        EraseEvent {
            cells: cells.len(),
            groups: groups.len(),
            chain: self.chain,
            points: chain_points(cells.len(), self.chain),
        }
    }
}

/// Summary of a full cascade.
#[cfg(test)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub events: Vec<EraseEvent>,
    pub points: u64,
    /// Highest chain level reached (0 if nothing erased).
    pub chain: u32,
}

/// Run settle / scan / erase until a scan finds nothing, without the dwell.
/// The session steps the same pipeline one phase per tick instead.
#[cfg(test)]
pub fn resolve_all(board: &mut Board) -> Resolution {
    let mut resolver = Resolver::new();
    let mut out = Resolution::default();
    loop {
        settle(board);
        match resolver.scan(board) {
            ScanOutcome::Settled { ended_chain } => {
                out.chain = ended_chain;
                return out;
            }
            ScanOutcome::Found { .. } => {
                let event = resolver.erase_now(board);
                out.points = out.points.saturating_add(event.points);
                out.events.push(event);
            }
        }
    }
}
