//! Placement rules: legality, movement, rotation with wall kick, landing.

use crate::board::{Board, Cell};
use crate::piece::{Piece, PuyoPair, Rotation};

/// Wall kick order after the unshifted attempt: one right, then one left.
const KICK_OFFSETS: [i32; 2] = [1, -1];

/// Row the pivot spawns in: the first visible row, satellite in the hidden row.
pub const SPAWN_ROW: i32 = 1;

/// Rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Cw,
    Ccw,
}

/// True if both cells of a pair at (x, y, rotation) are inside the grid and empty.
pub fn can_place(board: &Board, x: i32, y: i32, rotation: Rotation) -> bool {
    let (dx, dy) = rotation.satellite_offset();
    board.is_empty(x, y) && board.is_empty(x + dx, y + dy)
}

/// Fresh piece at the spawn position. None when the spawn cells are occupied.
pub fn spawn(board: &Board, colors: PuyoPair) -> Option<Piece> {
    let piece = Piece::new(board.spawn_column() as i32, SPAWN_ROW, colors);
    can_place(board, piece.x, piece.y, piece.rotation).then_some(piece)
}

/// Shift by `dx` columns if the result is legal. Returns whether it moved.
pub fn move_horizontal(board: &Board, piece: &mut Piece, dx: i32) -> bool {
    if can_place(board, piece.x + dx, piece.y, piece.rotation) {
        piece.x += dx;
        true
    } else {
        false
    }
}

/// Rotate in place, else kicked one column right, else one left. Unchanged if all fail.
pub fn rotate(board: &Board, piece: &mut Piece, spin: Spin) -> bool {
    let target = match spin {
        Spin::Cw => piece.rotation.cw(),
        Spin::Ccw => piece.rotation.ccw(),
    };
    let candidates = std::iter::once(0).chain(KICK_OFFSETS);
    for dx in candidates {
        if can_place(board, piece.x + dx, piece.y, target) {
            piece.x += dx;
            piece.rotation = target;
            return true;
        }
    }
    false
}

/// Both cells, one row lower, stay in bounds and land on empty cells.
pub fn can_drop_one_row(board: &Board, piece: &Piece) -> bool {
    can_place(board, piece.x, piece.y + 1, piece.rotation)
}

/// Lowest legal pivot row reachable by straight descent. Read-only preview.
pub fn ghost_row(board: &Board, piece: &Piece) -> i32 {
    let mut y = piece.y;
    while can_place(board, piece.x, y + 1, piece.rotation) {
        y += 1;
    }
    y
}

/// Commit the pair into the board. Cells outside the grid are skipped.
/// Returns the coordinates actually written.
pub fn place(board: &mut Board, piece: Piece) -> Vec<(usize, usize)> {
    let mut written = Vec::with_capacity(2);
    for ((x, y), color) in piece.cells() {
        if board.set(x, y, Cell::Puyo(color)) {
            written.push((x as usize, y as usize));
        }
    }
    written
}
