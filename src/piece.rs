//! Falling pair (pivot + satellite) and the NEXT / NEXT-NEXT queue.

use crate::board::PuyoColor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Where the satellite sits relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// Satellite one row above.
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Rotation {
    /// (dx, dy) of the satellite from the pivot; y grows downward.
    pub fn satellite_offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    pub fn cw(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    pub fn ccw(self) -> Self {
        match self {
            Self::Up => Self::Left,
            Self::Left => Self::Down,
            Self::Down => Self::Right,
            Self::Right => Self::Up,
        }
    }
}

/// Colours of a pair before it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuyoPair {
    pub pivot: PuyoColor,
    pub satellite: PuyoColor,
}

impl PuyoPair {
    pub fn new(pivot: PuyoColor, satellite: PuyoColor) -> Self {
        Self { pivot, satellite }
    }

    /// Both colours drawn independently and uniformly.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut pick = || PuyoColor::ALL[rng.random_range(0..PuyoColor::ALL.len())];
        let pivot = pick();
        Self::new(pivot, pick())
    }
}

/// The active falling pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub x: i32,
    pub y: i32,
    pub rotation: Rotation,
    pub colors: PuyoPair,
}

impl Piece {
    pub fn new(x: i32, y: i32, colors: PuyoPair) -> Self {
        Self {
            x,
            y,
            rotation: Rotation::Up,
            colors,
        }
    }

    /// Absolute satellite coordinate.
    pub fn satellite(&self) -> (i32, i32) {
        let (dx, dy) = self.rotation.satellite_offset();
        (self.x + dx, self.y + dy)
    }

    /// Both cells with their colours, pivot first.
    pub fn cells(&self) -> [((i32, i32), PuyoColor); 2] {
        [
            ((self.x, self.y), self.colors.pivot),
            (self.satellite(), self.colors.satellite),
        ]
    }
}

/// Lookahead queue: NEXT and NEXT-NEXT, refilled from a seedable generator.
#[derive(Debug, Clone)]
pub struct PairQueue {
    upcoming: [PuyoPair; 2],
    rng: ChaCha8Rng,
}

impl PairQueue {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let upcoming = [PuyoPair::random(&mut rng), PuyoPair::random(&mut rng)];
        Self { upcoming, rng }
    }

    /// Hands out NEXT, shifts NEXT-NEXT forward and draws a fresh pair behind it.
    pub fn pop(&mut self) -> PuyoPair {
        let fresh = PuyoPair::random(&mut self.rng);
        let out = self.upcoming[0];
        self.upcoming = [self.upcoming[1], fresh];
        out
    }

    /// Discards the preview and draws two new pairs; the generator keeps its stream.
    pub fn reset(&mut self) {
        self.upcoming = [
            PuyoPair::random(&mut self.rng),
            PuyoPair::random(&mut self.rng),
        ];
    }

    pub fn next(&self) -> PuyoPair {
        self.upcoming[0]
    }

    pub fn next_next(&self) -> PuyoPair {
        self.upcoming[1]
    }

    #[cfg(test)]
    pub(crate) fn set_upcoming(&mut self, next: PuyoPair, next_next: PuyoPair) {
        self.upcoming = [next, next_next];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_offsets() {
        assert_eq!(Rotation::Up.satellite_offset(), (0, -1));
        assert_eq!(Rotation::Right.satellite_offset(), (1, 0));
        assert_eq!(Rotation::Down.satellite_offset(), (0, 1));
        assert_eq!(Rotation::Left.satellite_offset(), (-1, 0));
    }

    #[test]
    fn test_rotation_cycles() {
        use Rotation::*;
        let order = [Up, Right, Down, Left];
        for (i, r) in order.iter().enumerate() {
            assert_eq!(r.cw(), order[(i + 1) % 4]);
            assert_eq!(r.ccw(), order[(i + 3) % 4]);
            assert_eq!(r.cw().ccw(), *r);
        }
    }

    #[test]
    fn test_piece_cells() {
        let pair = PuyoPair::new(PuyoColor::Red, PuyoColor::Blue);
        let mut piece = Piece::new(2, 5, pair);
        assert_eq!(
            piece.cells(),
            [((2, 5), PuyoColor::Red), ((2, 4), PuyoColor::Blue)]
        );
        piece.rotation = Rotation::Left;
        assert_eq!(piece.satellite(), (1, 5));
    }

    #[test]
    fn test_queue_is_deterministic_per_seed() {
        let mut a = PairQueue::new(7);
        let mut b = PairQueue::new(7);
        for _ in 0..32 {
            assert_eq!(a.pop(), b.pop());
        }
    }

    #[test]
    fn test_queue_promotes_next_next() {
        let mut q = PairQueue::new(42);
        let next = q.next();
        let next_next = q.next_next();
        assert_eq!(q.pop(), next);
        assert_eq!(q.next(), next_next);
    }

    #[test]
    fn test_random_pairs_cover_all_colours() {
        let mut q = PairQueue::new(1);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let p = q.pop();
            seen[p.pivot.index() as usize] = true;
            seen[p.satellite.index() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
