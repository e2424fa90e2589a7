//! Board: occupancy grid with spawn buffer rows, piece validity, line clear.
//!
//! y = 0 is the bottom row; rows `height..height + buffer` are spawn
//! headroom: pieces may overlap them but they are never scanned for clears.

use crate::material::MaterialId;
use crate::piece::ActivePiece;

/// One locked (non-falling) cell. Owns its renderable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedCell {
    pub material: MaterialId,
}

/// Result of a line-clear scan: rows removed and the renderable handles
/// released by the erased cells (to be freed and deregistered by the owner).
#[derive(Debug, Default)]
pub struct ClearOutcome {
    pub rows: u32,
    pub freed: Vec<MaterialId>,
}

#[derive(Debug, Clone)]
pub struct Board {
    width: i32,
    height: i32,
    buffer: i32,
    /// cells[y * width + x]; at most one entity per coordinate.
    cells: Vec<Option<LockedCell>>,
}

impl Board {
    pub fn new(width: i32, height: i32, buffer: i32) -> Self {
        assert!(width > 0 && height > 0 && buffer >= 0);
        Self {
            width,
            height,
            buffer,
            cells: vec![None; (width * (height + buffer)) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Height including spawn buffer rows.
    pub fn total_height(&self) -> i32 {
        self.height + self.buffer
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.total_height()
    }

    #[inline]
    pub fn cell(&self, x: i32, y: i32) -> Option<&LockedCell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.cells[self.index(x, y)].as_ref()
    }

    #[inline]
    pub fn occupied(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_some()
    }

    /// True if every cell of the piece at its current pivot/rotation lands
    /// in bounds and on an unoccupied coordinate. Pure query.
    pub fn is_valid(&self, piece: &ActivePiece) -> bool {
        piece
            .cell_positions()
            .iter()
            .all(|&(x, y)| self.in_bounds(x, y) && !self.occupied(x, y))
    }

    /// Write the piece's cells into the grid, transferring ownership of
    /// their renderables. Callers must have settled the piece on a valid
    /// pose first. Returns the handles of the newly locked cells.
    pub fn lock(&mut self, piece: ActivePiece) -> [MaterialId; 4] {
        debug_assert!(self.is_valid(&piece));
        let positions = piece.cell_positions();
        let cells = piece.into_cells();
        for (&(x, y), &material) in positions.iter().zip(cells.iter()) {
            if self.in_bounds(x, y) {
                let idx = self.index(x, y);
                self.cells[idx] = Some(LockedCell { material });
            }
        }
        cells
    }

    /// Scan rows `height-1 ..= 0` for full rows; erase each, drop everything
    /// above it by one, and re-examine the same index (the rows above have
    /// shifted into it). Buffer rows are never counted. Returns all rows
    /// cleared this call (0..=4 for a single lock).
    pub fn clear_lines(&mut self) -> ClearOutcome {
        let mut outcome = ClearOutcome::default();
        let mut y = self.height - 1;
        while y >= 0 {
            if self.row_full(y) {
                self.erase_row(y, &mut outcome.freed);
                self.drop_above(y);
                outcome.rows += 1;
            } else {
                y -= 1;
            }
        }
        outcome
    }

    /// Release every locked cell; used on new-game and return-to-menu.
    pub fn clear_all(&mut self) -> Vec<MaterialId> {
        let mut freed = Vec::new();
        for slot in &mut self.cells {
            if let Some(cell) = slot.take() {
                freed.push(cell.material);
            }
        }
        freed
    }

    fn row_full(&self, y: i32) -> bool {
        (0..self.width).all(|x| self.occupied(x, y))
    }

    fn erase_row(&mut self, y: i32, freed: &mut Vec<MaterialId>) {
        for x in 0..self.width {
            let idx = self.index(x, y);
            if let Some(cell) = self.cells[idx].take() {
                freed.push(cell.material);
            }
        }
    }

    /// Shift every row above `cleared_y` (buffer rows included) down one.
    fn drop_above(&mut self, cleared_y: i32) {
        for y in (cleared_y + 1)..self.total_height() {
            for x in 0..self.width {
                let from = self.index(x, y);
                let to = self.index(x, y - 1);
                self.cells[to] = self.cells[from].take();
            }
        }
    }

    /// All occupied coordinates with their renderables, bottom-up.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (i32, i32, MaterialId)> + '_ {
        (0..self.total_height()).flat_map(move |y| {
            (0..self.width).filter_map(move |x| self.cell(x, y).map(|c| (x, y, c.material)))
        })
    }

    pub fn locked_materials(&self) -> Vec<MaterialId> {
        self.occupied_cells().map(|(_, _, m)| m).collect()
    }

    /// Occupy a single coordinate directly; test scaffolding only.
    #[cfg(test)]
    pub(crate) fn occupy_for_tests(&mut self, x: i32, y: i32, material: MaterialId) {
        assert!(self.in_bounds(x, y));
        let idx = self.index(x, y);
        self.cells[idx] = Some(LockedCell { material });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialStore;
    use crate::material::Material;
    use crate::dichoptic::VisibilityChannel;
    use crate::piece::PieceKind;
    use ratatui::style::Color;

    fn mat(store: &mut MaterialStore) -> MaterialId {
        store.alloc(Material::new(Color::White, VisibilityChannel::GoodEyeOnly))
    }

    fn occupy(board: &mut Board, store: &mut MaterialStore, x: i32, y: i32) {
        let material = mat(store);
        board.occupy_for_tests(x, y, material);
    }

    fn fill_row(board: &mut Board, store: &mut MaterialStore, y: i32) {
        for x in 0..board.width() {
            occupy(board, store, x, y);
        }
    }

    fn piece_at(kind: PieceKind, x: i32, y: i32, store: &mut MaterialStore) -> ActivePiece {
        let cells = [mat(store), mat(store), mat(store), mat(store)];
        ActivePiece::new(kind, x, y, cells)
    }

    #[test]
    fn validity_is_exhaustive_over_bounds_and_occupancy() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 4, 2);
        occupy(&mut board, &mut store, 2, 1);

        // O piece covers (x, y), (x+1, y), (x, y+1), (x+1, y+1).
        for x in -2..6 {
            for y in -2..8 {
                let piece = piece_at(PieceKind::O, x, y, &mut store);
                let in_bounds = x >= 0 && x + 1 < 4 && y >= 0 && y + 1 < 6;
                let overlaps = (x..=x + 1).contains(&2) && (y..=y + 1).contains(&1);
                assert_eq!(
                    board.is_valid(&piece),
                    in_bounds && !overlaps,
                    "pose ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn buffer_rows_are_valid_spawn_headroom() {
        let mut store = MaterialStore::new();
        let board = Board::new(10, 20, 4);
        // O at y = 20 occupies rows 20 and 21: inside buffer, valid.
        let piece = piece_at(PieceKind::O, 4, 20, &mut store);
        assert!(board.is_valid(&piece));
        // O at y = 23 would occupy row 24 = height + buffer: invalid.
        let piece = piece_at(PieceKind::O, 4, 23, &mut store);
        assert!(!board.is_valid(&piece));
    }

    #[test]
    fn lock_writes_all_four_cells() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(10, 20, 4);
        let piece = piece_at(PieceKind::O, 0, 0, &mut store);
        let handles = board.lock(piece);
        assert_eq!(handles.len(), 4);
        assert!(board.occupied(0, 0));
        assert!(board.occupied(1, 0));
        assert!(board.occupied(0, 1));
        assert!(board.occupied(1, 1));
        assert_eq!(board.locked_materials().len(), 4);
    }

    #[test]
    fn single_clear_shifts_rows_down_preserving_order() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 6, 2);
        fill_row(&mut board, &mut store, 0);
        // A marker cell at (1, 1) and one at (1, 2).
        occupy(&mut board, &mut store, 1, 1);
        let marker_low = board.cell(1, 1).unwrap().material;
        occupy(&mut board, &mut store, 1, 2);
        let marker_high = board.cell(1, 2).unwrap().material;

        let outcome = board.clear_lines();
        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.freed.len(), 4);
        // Markers moved down exactly one row, relative order intact.
        assert_eq!(board.cell(1, 0).unwrap().material, marker_low);
        assert_eq!(board.cell(1, 1).unwrap().material, marker_high);
        assert!(!board.occupied(1, 2));
    }

    #[test]
    fn simultaneous_full_rows_all_clear_in_one_call() {
        for n in 1..=4 {
            let mut store = MaterialStore::new();
            let mut board = Board::new(4, 8, 2);
            for y in 0..n {
                fill_row(&mut board, &mut store, y);
            }
            occupy(&mut board, &mut store, 0, n); // partial row above
            let outcome = board.clear_lines();
            assert_eq!(outcome.rows, n as u32);
            assert_eq!(outcome.freed.len(), (n * 4) as usize);
            assert!(board.occupied(0, 0)); // partial row landed on the floor
            assert!(!board.occupied(0, 1));
        }
    }

    #[test]
    fn non_adjacent_full_rows_clear_together() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 8, 2);
        fill_row(&mut board, &mut store, 0);
        occupy(&mut board, &mut store, 0, 1);
        fill_row(&mut board, &mut store, 2);
        let outcome = board.clear_lines();
        assert_eq!(outcome.rows, 2);
        // The lone cell from row 1 is the only survivor, now on row 0.
        assert!(board.occupied(0, 0));
        assert_eq!(board.locked_materials().len(), 1);
    }

    #[test]
    fn clear_leaves_no_full_row_behind() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 8, 2);
        for y in 0..3 {
            fill_row(&mut board, &mut store, y);
        }
        board.clear_lines();
        for y in 0..board.height() {
            assert!(!(0..board.width()).all(|x| board.occupied(x, y)));
        }
    }

    #[test]
    fn buffer_rows_never_counted_for_clearing() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 6, 2);
        fill_row(&mut board, &mut store, 6); // first buffer row
        let outcome = board.clear_lines();
        assert_eq!(outcome.rows, 0);
        assert_eq!(board.locked_materials().len(), 4);
    }

    #[test]
    fn clear_all_releases_everything() {
        let mut store = MaterialStore::new();
        let mut board = Board::new(4, 6, 2);
        fill_row(&mut board, &mut store, 0);
        occupy(&mut board, &mut store, 2, 3);
        let freed = board.clear_all();
        assert_eq!(freed.len(), 5);
        assert_eq!(board.locked_materials().len(), 0);
    }
}
