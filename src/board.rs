//! Board: fixed grid of settled puyos, gravity step, connected-group scan.

/// Default number of columns.
pub const COLS: usize = 6;
/// Default number of visible rows.
pub const ROWS: usize = 12;
/// Rows above the visible area. Row 0 is the spawn / death zone.
pub const HIDDEN_ROWS: usize = 1;
/// Groups of at least this many connected cells are erased.
pub const ERASE_THRESHOLD: usize = 4;

/// Puyo colours. The set is closed, so a cell can never hold an out-of-range colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PuyoColor {
    Red,
    Green,
    Blue,
    Yellow,
}

impl PuyoColor {
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Blue, Self::Yellow];

    /// Colour index 0..4 for theme.puyo_color().
    pub fn index(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Yellow => 3,
        }
    }
}

/// Number of distinct colours.
pub const NUM_COLORS: usize = PuyoColor::ALL.len();

/// Single cell: either empty or a settled puyo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Puyo(PuyoColor),
}

impl Cell {
    pub fn color(self) -> Option<PuyoColor> {
        match self {
            Self::Empty => None,
            Self::Puyo(c) => Some(c),
        }
    }
}

/// A connected same-colour region found during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: PuyoColor,
    pub cells: Vec<(usize, usize)>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Visited marks for one scan pass, indexed like the board.
#[derive(Debug, Clone)]
pub struct CheckedGrid {
    width: usize,
    marks: Vec<bool>,
}

impl CheckedGrid {
    pub fn new(board: &Board) -> Self {
        Self {
            width: board.width,
            marks: vec![false; board.cells.len()],
        }
    }

    #[inline]
    fn is_marked(&self, x: usize, y: usize) -> bool {
        self.marks[y * self.width + x]
    }

    #[inline]
    fn mark(&mut self, x: usize, y: usize) {
        self.marks[y * self.width + x] = true;
    }
}

/// Playfield: `width × (rows + HIDDEN_ROWS)` cells. y=0 is the hidden top row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    /// cells[y * width + x]
    cells: Vec<Cell>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(COLS, ROWS)
    }
}

impl Board {
    /// Empty board with `visible_rows` visible rows plus the hidden spawn row.
    pub fn new(width: usize, visible_rows: usize) -> Self {
        let height = visible_rows + HIDDEN_ROWS;
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
        }
    }

    /// Number of rows below the hidden spawn row.
    pub fn visible_rows(&self) -> usize {
        self.height - HIDDEN_ROWS
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Writes the cell; out-of-bounds writes are refused and return false.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// False outside the grid, so callers can treat out-of-bounds as blocked.
    #[inline]
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Some(Cell::Empty)
    }

    /// Number of occupied cells.
    #[cfg(test)]
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Empty).count()
    }

    /// Rows top to bottom, for drawing.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width)
    }

    /// One gravity sweep: every puyo with an empty cell directly below falls one row.
    /// Each column is scanned bottom-to-top so a stack over a gap moves together.
    pub fn settle_step(&mut self) -> bool {
        let mut moved = false;
        for x in 0..self.width {
            for y in (0..self.height - 1).rev() {
                let above = y * self.width + x;
                let below = above + self.width;
                if self.cells[above] != Cell::Empty && self.cells[below] == Cell::Empty {
                    self.cells[below] = self.cells[above];
                    self.cells[above] = Cell::Empty;
                    moved = true;
                }
            }
        }
        moved
    }

    /// Iterative flood fill from (x, y) over unchecked cells of the seed colour (4-neighbour).
    /// Every returned cell is marked in `checked`.
    pub fn find_connected_region(
        &self,
        x: usize,
        y: usize,
        checked: &mut CheckedGrid,
    ) -> Vec<(usize, usize)> {
        const NEIGHBOURS_4: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        let Some(color) = self.get(x as i32, y as i32).and_then(Cell::color) else {
            return Vec::new();
        };
        if checked.is_marked(x, y) {
            return Vec::new();
        }

        let mut region = Vec::new();
        let mut stack = vec![(x, y)];
        checked.mark(x, y);
        while let Some((cx, cy)) = stack.pop() {
            region.push((cx, cy));
            for (dx, dy) in NEIGHBOURS_4 {
                let (nx, ny) = (cx as i32 + dx, cy as i32 + dy);
                if self.get(nx, ny) != Some(Cell::Puyo(color)) {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if !checked.is_marked(nx, ny) {
                    checked.mark(nx, ny);
                    stack.push((nx, ny));
                }
            }
        }
        region
    }

    /// All connected regions of at least ERASE_THRESHOLD cells, each found exactly once.
    pub fn scan_erasable_groups(&self) -> Vec<Group> {
        let mut checked = CheckedGrid::new(self);
        let mut groups = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(color) = self.cells[y * self.width + x].color() else {
                    continue;
                };
                if checked.is_marked(x, y) {
                    continue;
                }
                let cells = self.find_connected_region(x, y, &mut checked);
                if cells.len() >= ERASE_THRESHOLD {
                    groups.push(Group { color, cells });
                }
            }
        }
        groups
    }

    /// Empties every listed cell. Returns how many were actually occupied.
    pub fn erase(&mut self, cells: &[(usize, usize)]) -> usize {
        let mut erased = 0;
        for &(x, y) in cells {
            if let Some(i) = self.index(x as i32, y as i32) {
                if self.cells[i] != Cell::Empty {
                    self.cells[i] = Cell::Empty;
                    erased += 1;
                }
            }
        }
        erased
    }

    /// Column the pivot spawns in; the other centre column is one to the right.
    pub fn spawn_column(&self) -> usize {
        (self.width / 2).saturating_sub(1)
    }

    /// Game over test: either centre column of the hidden row is occupied.
    pub fn spawn_zone_blocked(&self) -> bool {
        let x = self.spawn_column() as i32;
        !self.is_empty(x, 0) || !self.is_empty(x + 1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: Cell = Cell::Puyo(PuyoColor::Red);
    const G: Cell = Cell::Puyo(PuyoColor::Green);

    fn bottom(board: &Board) -> i32 {
        board.height as i32 - 1
    }

    #[test]
    fn test_new_board_dimensions() {
        let board = Board::default();
        assert_eq!(board.width, COLS);
        assert_eq!(board.height, ROWS + HIDDEN_ROWS);
        assert_eq!(board.visible_rows(), ROWS);
        assert_eq!(board.occupied(), 0);
        assert_eq!(board.rows().count(), board.height);
    }

    #[test]
    fn test_out_of_bounds_access_is_rejected() {
        let mut board = Board::default();
        assert_eq!(board.get(-1, 0), None);
        assert_eq!(board.get(0, -1), None);
        assert_eq!(board.get(COLS as i32, 0), None);
        assert_eq!(board.get(0, board.height as i32), None);
        assert!(!board.is_empty(-1, 3));
        assert!(!board.is_empty(COLS as i32, 3));
        assert!(!board.set(-1, 0, R));
        assert!(!board.set(0, board.height as i32, R));
        assert_eq!(board.occupied(), 0);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut board = Board::default();
        assert!(board.set(2, 5, G));
        assert_eq!(board.get(2, 5), Some(G));
        assert!(!board.is_empty(2, 5));
        assert!(board.set(2, 5, Cell::Empty));
        assert!(board.is_empty(2, 5));
    }

    #[test]
    fn test_settle_step_moves_stack_together() {
        let mut board = Board::default();
        // Two-high stack floating over a gap of two rows.
        board.set(0, 3, R);
        board.set(0, 4, G);
        assert!(board.settle_step());
        assert_eq!(board.get(0, 4), Some(R));
        assert_eq!(board.get(0, 5), Some(G));
        assert_eq!(board.get(0, 3), Some(Cell::Empty));
    }

    #[test]
    fn test_settle_converges_and_is_idempotent() {
        let mut board = Board::default();
        board.set(1, 0, R);
        board.set(3, 6, G);
        let mut steps = 0;
        while board.settle_step() {
            steps += 1;
            assert!(steps <= board.height);
        }
        assert_eq!(board.get(1, bottom(&board)), Some(R));
        assert_eq!(board.get(3, bottom(&board)), Some(G));
        let snapshot = board.clone();
        assert!(!board.settle_step());
        assert!(!board.settle_step());
        assert_eq!(board, snapshot);
    }

    #[test]
    fn test_connected_region_is_four_directional() {
        let mut board = Board::default();
        let b = bottom(&board);
        board.set(0, b, R);
        board.set(1, b, R);
        board.set(1, b - 1, R);
        // Diagonal only: not connected.
        board.set(2, b - 2, R);
        // Different colour in between.
        board.set(2, b, G);
        board.set(3, b, R);

        let mut checked = CheckedGrid::new(&board);
        let mut region = board.find_connected_region(0, b as usize, &mut checked);
        region.sort_unstable();
        assert_eq!(
            region,
            vec![(0, b as usize), (1, b as usize - 1), (1, b as usize)]
        );
        // Already visited cells are not returned again in the same pass.
        assert!(board.find_connected_region(1, b as usize, &mut checked).is_empty());
        // Empty seed yields nothing.
        assert!(board.find_connected_region(5, 0, &mut checked).is_empty());
    }

    #[test]
    fn test_three_connected_not_erasable() {
        let mut board = Board::default();
        let b = bottom(&board);
        for x in 0..3 {
            board.set(x, b, R);
        }
        assert!(board.scan_erasable_groups().is_empty());
    }

    #[test]
    fn test_four_connected_erasable() {
        let mut board = Board::default();
        let b = bottom(&board);
        board.set(0, b, R);
        board.set(1, b, R);
        board.set(1, b - 1, R);
        board.set(1, b - 2, R);
        let groups = board.scan_erasable_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].color, PuyoColor::Red);
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn test_scan_finds_each_group_once() {
        let mut board = Board::default();
        let b = bottom(&board);
        // Red L of five and a green bar of four, plus a lone green.
        for x in 0..4 {
            board.set(x, b, R);
        }
        board.set(0, b - 1, R);
        for y in 0..4 {
            board.set(5, b - y, G);
        }
        board.set(2, b - 1, G);
        let groups = board.scan_erasable_groups();
        assert_eq!(groups.len(), 2);
        let total: usize = groups.iter().map(Group::len).sum();
        assert_eq!(total, 9);
        let mut all: Vec<_> = groups.iter().flat_map(|g| g.cells.iter().copied()).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn test_erase_clears_listed_cells() {
        let mut board = Board::default();
        board.set(0, 5, R);
        board.set(1, 5, G);
        assert_eq!(board.erase(&[(0, 5), (4, 4), (99, 99)]), 1);
        assert!(board.is_empty(0, 5));
        assert_eq!(board.get(1, 5), Some(G));
    }

    #[test]
    fn test_spawn_zone_blocked_either_centre_column() {
        let mut board = Board::default();
        assert_eq!(board.spawn_column(), 2);
        assert!(!board.spawn_zone_blocked());
        board.set(3, 0, R);
        assert!(board.spawn_zone_blocked());
        board.set(3, 0, Cell::Empty);
        board.set(2, 0, G);
        assert!(board.spawn_zone_blocked());
        board.set(2, 0, Cell::Empty);
        board.set(0, 0, G);
        assert!(!board.spawn_zone_blocked());
    }
}
