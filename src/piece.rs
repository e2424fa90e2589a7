//! Falling piece: the 7 canonical shapes, pivot rotation with the fixed
//! kick ladder, and the falling → grounded → locked timing state machine.

use crate::board::Board;
use crate::material::MaterialId;

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [Self; 7] = [
        Self::I,
        Self::O,
        Self::T,
        Self::S,
        Self::Z,
        Self::J,
        Self::L,
    ];

    /// 4 cells as (dx, dy) offsets from the pivot, y up. Immutable per
    /// shape; rotation is applied to instantiated offsets, never here.
    pub fn offsets(self) -> &'static [(i8, i8); 4] {
        match self {
            Self::I => &[(-1, 0), (0, 0), (1, 0), (2, 0)],
            Self::O => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::T => &[(-1, 0), (0, 0), (1, 0), (0, 1)],
            Self::S => &[(-1, 0), (0, 0), (0, 1), (1, 1)],
            Self::Z => &[(-1, 1), (0, 1), (0, 0), (1, 0)],
            Self::J => &[(-1, 1), (-1, 0), (0, 0), (1, 0)],
            Self::L => &[(1, 1), (-1, 0), (0, 0), (1, 0)],
        }
    }

    /// Index into the theme's piece palette.
    pub fn color_index(self) -> u8 {
        match self {
            Self::I => 0,
            Self::O => 1,
            Self::T => 2,
            Self::S => 3,
            Self::Z => 4,
            Self::J => 5,
            Self::L => 6,
        }
    }
}

/// One 90-degree step per unit of `r`, counterclockwise about the pivot.
fn rotate_offset(dx: i8, dy: i8, r: u8) -> (i32, i32) {
    let (mut x, mut y) = (i32::from(dx), i32::from(dy));
    for _ in 0..(r % 4) {
        let (rx, ry) = (-y, x);
        x = rx;
        y = ry;
    }
    (x, y)
}

/// Outcome of one frame of gravity/lock-delay advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceStep {
    /// Still falling or sitting within the lock-delay grace period.
    Active,
    /// Lock delay expired while grounded; the owner must lock the piece.
    LockExpired,
}

/// The single falling piece. Owns one renderable handle per cell; they are
/// transferred to the board on lock.
#[derive(Debug, Clone)]
pub struct ActivePiece {
    pub kind: PieceKind,
    pub x: i32,
    pub y: i32,
    /// 0..4 quarter turns.
    pub rotation: u8,
    pub soft_drop: bool,
    cells: [MaterialId; 4],
    fall_timer: f32,
    lock_timer: f32,
    grounded: bool,
}

impl ActivePiece {
    pub fn new(kind: PieceKind, x: i32, y: i32, cells: [MaterialId; 4]) -> Self {
        Self {
            kind,
            x,
            y,
            rotation: 0,
            soft_drop: false,
            cells,
            fall_timer: 0.0,
            lock_timer: 0.0,
            grounded: false,
        }
    }

    pub fn cell_materials(&self) -> &[MaterialId; 4] {
        &self.cells
    }

    pub fn into_cells(self) -> [MaterialId; 4] {
        self.cells
    }

    pub fn grounded(&self) -> bool {
        self.grounded
    }

    /// Lock-delay progress in 0..=1 for the HUD.
    pub fn lock_progress(&self, lock_delay: f32) -> f32 {
        if lock_delay <= 0.0 {
            return 0.0;
        }
        (self.lock_timer / lock_delay).clamp(0.0, 1.0)
    }

    /// Grid coordinates of the 4 cells at the current pivot and rotation.
    /// The O piece keeps its square footprint through rotation.
    pub fn cell_positions(&self) -> [(i32, i32); 4] {
        let r = if self.kind == PieceKind::O { 0 } else { self.rotation };
        let mut out = [(0, 0); 4];
        for (slot, &(dx, dy)) in out.iter_mut().zip(self.kind.offsets()) {
            let (rx, ry) = rotate_offset(dx, dy, r);
            *slot = (self.x + rx, self.y + ry);
        }
        out
    }

    /// Translate by (dx, dy) if the resulting pose is valid; revert and
    /// report failure otherwise. A successful move always returns the piece
    /// to the falling state and zeroes the lock timer.
    pub fn try_move(&mut self, dx: i32, dy: i32, board: &Board) -> bool {
        self.x += dx;
        self.y += dy;
        if board.is_valid(self) {
            self.grounded = false;
            self.lock_timer = 0.0;
            return true;
        }
        self.x -= dx;
        self.y -= dy;
        false
    }

    /// Rotate 90 degrees about the pivot with the fixed kick ladder: the
    /// plain rotation, then +1 column, then -2 columns (net -1), then a
    /// full revert. The order never skips a step.
    pub fn try_rotate(&mut self, board: &Board) -> bool {
        let prev = self.rotation;
        self.rotation = (self.rotation + 1) % 4;
        if board.is_valid(self) {
            self.grounded = false;
            self.lock_timer = 0.0;
            return true;
        }
        self.x += 1;
        if board.is_valid(self) {
            self.grounded = false;
            self.lock_timer = 0.0;
            return true;
        }
        self.x -= 2;
        if board.is_valid(self) {
            self.grounded = false;
            self.lock_timer = 0.0;
            return true;
        }
        self.x += 1;
        self.rotation = prev;
        false
    }

    /// One frame of gravity and lock-delay accounting. The fall interval is
    /// divided by `soft_drop_mult` while soft drop is held.
    pub fn advance(
        &mut self,
        dt: f32,
        fall_interval: f32,
        soft_drop_mult: f32,
        lock_delay: f32,
        board: &Board,
    ) -> PieceStep {
        let interval = if self.soft_drop {
            fall_interval / soft_drop_mult
        } else {
            fall_interval
        };
        self.fall_timer += dt;
        if self.fall_timer >= interval {
            self.fall_timer = 0.0;
            if !self.try_move(0, -1, board) {
                self.grounded = true;
            }
        }
        if self.grounded {
            self.lock_timer += dt;
            if self.lock_timer >= lock_delay {
                return PieceStep::LockExpired;
            }
        }
        PieceStep::Active
    }

    /// Apply the gravity step until it fails. Bypasses all timers; the
    /// owner locks immediately afterwards.
    pub fn drop_to_floor(&mut self, board: &Board) {
        while self.try_move(0, -1, board) {}
    }
}
