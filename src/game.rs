//! Game session: flow state machine (menu / playing / over), spawning,
//! scoring, and the per-frame coupling of board, piece, channel assignment
//! and contrast modulation.

use crate::board::Board;
use crate::dichoptic::{Eye, EyeChannelAssigner, VisibilityChannel};
use crate::material::{Material, MaterialId, MaterialStore};
use crate::piece::{ActivePiece, PieceKind, PieceStep};
use crate::therapy::{ContrastModulator, TherapyConfig};
use ratatui::style::Color;

/// Points per simultaneous line count; 4+ clamps to the tetris tier.
pub const LINE_POINTS: [u32; 5] = [0, 100, 300, 500, 800];

pub const DEFAULT_FALL_INTERVAL: f32 = 1.0;
pub const DEFAULT_LOCK_DELAY: f32 = 0.5;
pub const DEFAULT_SOFT_DROP_MULT: f32 = 5.0;

/// Provides shape identities in an externally-determined order.
pub trait SpawnSource {
    fn next_kind(&mut self) -> PieceKind;
}

/// Bag of 7 pieces (random order, then refill).
#[derive(Debug, Clone)]
pub struct ShuffleBag {
    queue: Vec<PieceKind>,
    rng: u32,
}

impl ShuffleBag {
    pub fn new(seed: u32) -> Self {
        let mut bag = Self {
            queue: Vec::with_capacity(14),
            rng: seed | 1,
        };
        bag.refill();
        bag
    }

    fn refill(&mut self) {
        let mut all = PieceKind::ALL.to_vec();
        // Fisher–Yates shuffle
        for i in (1..all.len()).rev() {
            let j = (self.next_rand() as usize) % (i + 1);
            all.swap(i, j);
        }
        self.queue.extend(all);
    }

    fn next_rand(&mut self) -> u32 {
        self.rng = self.rng.wrapping_mul(1103515245).wrapping_add(12345);
        self.rng >> 16
    }
}

impl Default for ShuffleBag {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

impl SpawnSource for ShuffleBag {
    fn next_kind(&mut self) -> PieceKind {
        if self.queue.is_empty() {
            self.refill();
        }
        self.queue.remove(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Menu,
    Playing,
    Over,
}

/// Gameplay-affecting configuration carried into the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub width: i32,
    pub height: i32,
    pub buffer: i32,
    pub lock_delay: f32,
    pub soft_drop_mult: f32,
    pub lazy_eye: Eye,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 20,
            buffer: 4,
            lock_delay: DEFAULT_LOCK_DELAY,
            soft_drop_mult: DEFAULT_SOFT_DROP_MULT,
            lazy_eye: Eye::Left,
        }
    }
}

/// Root simulation object. Owns every core subsystem and is the only thing
/// the front end talks to; no ambient global lookups anywhere.
pub struct GameSession {
    pub board: Board,
    pub piece: Option<ActivePiece>,
    pub materials: MaterialStore,
    pub assigner: EyeChannelAssigner,
    pub modulator: ContrastModulator,
    pub therapy: TherapyConfig,
    pub state: FlowState,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub fall_interval: f32,
    /// Board frame renderable, on the fusion channel.
    pub frame: MaterialId,
    lock_delay: f32,
    soft_drop_mult: f32,
    piece_colors: [Color; 7],
    spawner: Box<dyn SpawnSource>,
    /// Rows cleared by the most recent lock; consumed by the front end for
    /// the clear flash.
    pending_clear_flash: u32,
}

impl GameSession {
    pub fn new(
        config: &SessionConfig,
        therapy: TherapyConfig,
        piece_colors: [Color; 7],
        frame_color: Color,
        spawner: Box<dyn SpawnSource>,
    ) -> Self {
        let mut materials = MaterialStore::new();
        let assigner = EyeChannelAssigner::new(config.lazy_eye);
        let frame = materials.alloc(Material::new(frame_color, VisibilityChannel::Fusion));
        Self {
            board: Board::new(config.width, config.height, config.buffer),
            piece: None,
            materials,
            assigner,
            modulator: ContrastModulator::new(),
            therapy,
            state: FlowState::Menu,
            score: 0,
            level: 1,
            lines: 0,
            fall_interval: DEFAULT_FALL_INTERVAL,
            frame,
            lock_delay: config.lock_delay,
            soft_drop_mult: config.soft_drop_mult,
            piece_colors,
            spawner,
            pending_clear_flash: 0,
        }
    }

    pub fn lock_delay(&self) -> f32 {
        self.lock_delay
    }

    /// Menu -> Playing: reset the scoreboard, empty the grid, spawn.
    pub fn start_game(&mut self) {
        self.score = 0;
        self.level = 1;
        self.lines = 0;
        self.fall_interval = DEFAULT_FALL_INTERVAL;
        self.destroy_active_piece();
        self.empty_grid();
        self.state = FlowState::Playing;
        self.spawn_next();
    }

    /// Any state -> Menu: destroy the active piece and empty the grid.
    pub fn return_to_menu(&mut self) {
        self.destroy_active_piece();
        self.empty_grid();
        self.state = FlowState::Menu;
    }

    /// One simulation frame. Gravity and lock timing run only while
    /// playing; the contrast push runs unconditionally so calibration
    /// changes land within a frame even on the menu.
    pub fn tick(&mut self, dt: f32) {
        if self.state == FlowState::Playing {
            if let Some(piece) = self.piece.as_mut() {
                let step = piece.advance(
                    dt,
                    self.fall_interval,
                    self.soft_drop_mult,
                    self.lock_delay,
                    &self.board,
                );
                if step == PieceStep::LockExpired {
                    self.lock_active_piece();
                }
            }
        }
        self.modulator.tick(&mut self.materials, &self.therapy);
    }

    pub fn move_left(&mut self) {
        if self.state != FlowState::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.try_move(-1, 0, &self.board);
        }
    }

    pub fn move_right(&mut self) {
        if self.state != FlowState::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.try_move(1, 0, &self.board);
        }
    }

    pub fn rotate(&mut self) {
        if self.state != FlowState::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.try_rotate(&self.board);
        }
    }

    pub fn set_soft_drop(&mut self, held: bool) {
        if self.state != FlowState::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.soft_drop = held;
        }
    }

    /// Drop to the floor and lock immediately, bypassing all timers.
    pub fn hard_drop(&mut self) {
        if self.state != FlowState::Playing {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            piece.drop_to_floor(&self.board);
            self.lock_active_piece();
        }
    }

    /// Swap which eye is amblyopic; re-tags every simulated object and
    /// rebuilds the good-eye registry in one atomic pass.
    pub fn swap_lazy_eye(&mut self) {
        let piece_cells: Vec<MaterialId> = self
            .piece
            .as_ref()
            .map(|p| p.cell_materials().to_vec())
            .unwrap_or_default();
        let locked = self.board.locked_materials();
        self.assigner.swap_lazy_eye(
            &mut self.materials,
            &piece_cells,
            &locked,
            self.frame,
            &mut self.modulator,
        );
    }

    /// Rows cleared since the last call; for the front-end flash effect.
    pub fn take_clear_flash(&mut self) -> u32 {
        std::mem::take(&mut self.pending_clear_flash)
    }

    pub fn piece_color(&self, kind: PieceKind) -> Color {
        self.piece_colors[kind.color_index() as usize]
    }

    fn destroy_active_piece(&mut self) {
        if let Some(piece) = self.piece.take() {
            for id in piece.into_cells() {
                self.materials.free(id);
            }
        }
    }

    fn empty_grid(&mut self) {
        for id in self.board.clear_all() {
            self.modulator.unregister(id);
            self.materials.free(id);
        }
    }

    /// Spawn the next piece at the top of the board. A spawn that is
    /// immediately invalid is the sole game-over condition; the grid is
    /// left untouched.
    fn spawn_next(&mut self) {
        let kind = self.spawner.next_kind();
        let color = self.piece_color(kind);
        let therapy = self.therapy.clone();
        let cells: [MaterialId; 4] = std::array::from_fn(|_| {
            let mut mat = Material::new(color, VisibilityChannel::LazyEyeOnly);
            if therapy.gabor_mode {
                mat.gabor_enabled = true;
                mat.gabor_frequency = therapy.gabor_frequency;
                mat.gabor_orientation = therapy.gabor_orientation.to_radians();
                mat.gabor_contrast = therapy.gabor_contrast;
                mat.gabor_sigma = therapy.gabor_sigma;
            }
            self.materials.alloc(mat)
        });
        let piece = ActivePiece::new(kind, self.board.width() / 2, self.board.height(), cells);
        if self.board.is_valid(&piece) {
            self.assigner.tag_active_piece(&mut self.materials, &cells);
            self.piece = Some(piece);
        } else {
            for id in cells {
                self.materials.free(id);
            }
            self.piece = None;
            self.state = FlowState::Over;
        }
    }

    /// Lock the active piece at its current (valid) pose, hand its cells to
    /// the dominant eye, clear lines, score, and spawn the next piece.
    fn lock_active_piece(&mut self) {
        let Some(piece) = self.piece.take() else { return };
        let locked = self.board.lock(piece);
        self.assigner
            .tag_locked(&mut self.materials, &locked, &mut self.modulator);

        let outcome = self.board.clear_lines();
        for id in &outcome.freed {
            self.modulator.unregister(*id);
            self.materials.free(*id);
        }
        if outcome.rows > 0 {
            self.apply_line_score(outcome.rows);
        }
        self.pending_clear_flash = outcome.rows;

        if self.state == FlowState::Playing {
            self.spawn_next();
        }
    }

    /// Scoring from a line-clear event: fixed table times the level at the
    /// time of the clear, then level and fall interval are recomputed.
    fn apply_line_score(&mut self, rows: u32) {
        self.lines += rows;
        let tier = (rows as usize).min(LINE_POINTS.len() - 1);
        self.score += LINE_POINTS[tier] * self.level;
        self.level = self.lines / 10 + 1;
        self.fall_interval = (1.0 - (self.level - 1) as f32 * 0.08).max(0.1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<PieceKind>);

    impl SpawnSource for Scripted {
        fn next_kind(&mut self) -> PieceKind {
            self.0.pop_front().expect("script exhausted")
        }
    }

    const TEST_COLORS: [Color; 7] = [
        Color::Cyan,
        Color::Yellow,
        Color::Magenta,
        Color::Green,
        Color::Red,
        Color::Blue,
        Color::White,
    ];

    fn session_with(config: SessionConfig, script: &[PieceKind]) -> GameSession {
        GameSession::new(
            &config,
            TherapyConfig::default(),
            TEST_COLORS,
            Color::White,
            Box::new(Scripted(script.iter().copied().collect())),
        )
    }

    fn occupy(session: &mut GameSession, x: i32, y: i32) {
        let id = session.materials.alloc(Material::new(
            Color::White,
            VisibilityChannel::GoodEyeOnly,
        ));
        session.board.occupy_for_tests(x, y, id);
    }

    #[test]
    fn shuffle_bag_deals_all_seven_before_repeating() {
        let mut bag = ShuffleBag::default();
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(bag.next_kind());
        }
        for kind in PieceKind::ALL {
            assert_eq!(seen.iter().filter(|&&k| k == kind).count(), 1);
        }
    }

    #[test]
    fn start_game_resets_and_spawns() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::T, PieceKind::O]);
        assert_eq!(session.state, FlowState::Menu);
        session.score = 900;
        session.lines = 42;
        session.start_game();
        assert_eq!(session.state, FlowState::Playing);
        assert_eq!((session.score, session.level, session.lines), (0, 1, 0));
        let piece = session.piece.as_ref().unwrap();
        assert_eq!(piece.kind, PieceKind::T);
        // Spawned into the buffer headroom above the visible board.
        assert_eq!(piece.y, session.board.height());
    }

    #[test]
    fn lock_registers_cells_with_the_good_eye_loop() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::O]);
        session.start_game();
        session.hard_drop();
        assert_eq!(session.board.locked_materials().len(), 4);
        assert_eq!(session.modulator.len(), 4);
        for (_, _, id) in session.board.occupied_cells() {
            assert_eq!(
                session.materials.get(id).unwrap().channel,
                VisibilityChannel::GoodEyeOnly
            );
        }
        // The replacement piece is tagged for the amblyopic eye.
        for &id in session.piece.as_ref().unwrap().cell_materials() {
            assert_eq!(
                session.materials.get(id).unwrap().channel,
                VisibilityChannel::LazyEyeOnly
            );
        }
    }

    #[test]
    fn end_to_end_single_line_clear_scores_100_at_level_1() {
        let config = SessionConfig {
            width: 8,
            ..SessionConfig::default()
        };
        let mut session = session_with(config, &[PieceKind::I, PieceKind::I, PieceKind::O]);
        session.start_game();

        // First I: pivot spawns at x=4, cells span 3..=6; shift to 0..=3.
        for _ in 0..3 {
            session.move_left();
        }
        session.hard_drop();
        assert_eq!(session.board.locked_materials().len(), 4);

        // Second I: shift right to span 4..=7, completing the bottom row.
        session.move_right();
        session.hard_drop();

        assert_eq!(session.lines, 1);
        assert_eq!(session.score, 100);
        assert_eq!(session.level, 1);
        assert_eq!(session.take_clear_flash(), 1);
        // The cleared cells are gone from grid, registry and store.
        assert_eq!(session.board.locked_materials().len(), 0);
        assert_eq!(session.modulator.len(), 0);
    }

    #[test]
    fn simultaneous_clears_use_the_score_table() {
        for (rows, points) in [(1u32, 100u32), (2, 300), (3, 500), (4, 800)] {
            let mut session =
                session_with(SessionConfig::default(), &[PieceKind::I, PieceKind::O]);
            session.start_game();
            // Fill the bottom `rows` rows except column 7.
            for y in 0..rows as i32 {
                for x in 0..session.board.width() {
                    if x != 7 {
                        occupy(&mut session, x, y);
                    }
                }
            }
            // Vertical I down column 7 completes them all at once.
            session.rotate();
            session.move_right();
            session.move_right();
            session.hard_drop();
            assert_eq!(session.lines, rows, "rows={rows}");
            assert_eq!(session.score, points, "rows={rows}");
        }
    }

    #[test]
    fn level_and_fall_interval_derive_from_lines() {
        let mut session = session_with(
            SessionConfig {
                width: 8,
                ..SessionConfig::default()
            },
            &[PieceKind::I, PieceKind::I, PieceKind::O],
        );
        session.start_game();
        session.lines = 9; // one clear away from level 2

        for _ in 0..3 {
            session.move_left();
        }
        session.hard_drop();
        session.move_right();
        session.hard_drop();

        assert_eq!(session.lines, 10);
        assert_eq!(session.level, 2);
        // Scored at the level in effect when the lines cleared.
        assert_eq!(session.score, 100);
        assert!((session.fall_interval - 0.92).abs() < 1e-5);
    }

    #[test]
    fn fall_interval_clamps_at_fastest() {
        let mut session = session_with(
            SessionConfig {
                width: 8,
                ..SessionConfig::default()
            },
            &[PieceKind::I, PieceKind::I, PieceKind::O],
        );
        session.start_game();
        session.lines = 199;
        for _ in 0..3 {
            session.move_left();
        }
        session.hard_drop();
        session.move_right();
        session.hard_drop();
        assert_eq!(session.level, 21);
        assert!((session.fall_interval - 0.1).abs() < 1e-5);
    }

    #[test]
    fn blocked_spawn_goes_straight_to_over_without_grid_mutation() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::O]);
        session.start_game();
        // Occupy a cell inside the next spawn footprint (pivot x=5, y=20).
        occupy(&mut session, 5, 20);
        session.hard_drop();
        assert_eq!(session.state, FlowState::Over);
        assert!(session.piece.is_none());
        // Only the locked piece and the manual cell are on the board; the
        // failed spawn wrote nothing.
        assert_eq!(session.board.locked_materials().len(), 5);
        assert_eq!(session.modulator.len(), 4);
    }

    #[test]
    fn gravity_lock_cycle_locks_without_input() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::O]);
        session.start_game();
        // O spawns at y=20: 20 gravity steps reach the floor.
        for _ in 0..20 {
            session.tick(1.0);
        }
        assert_eq!(session.piece.as_ref().unwrap().y, 0);
        // The next gravity step fails and starts the lock delay.
        session.tick(0.8);
        session.tick(0.3);
        assert!(session.piece.as_ref().unwrap().grounded());
        // 0.3s elapsed of the 0.5s delay; this tick crosses it.
        session.tick(0.3);
        assert_eq!(session.board.locked_materials().len(), 4);
        // Next piece already spawned.
        assert!(session.piece.is_some());
    }

    #[test]
    fn return_to_menu_clears_everything() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::O]);
        session.start_game();
        session.hard_drop();
        assert!(session.modulator.len() > 0);
        session.return_to_menu();
        assert_eq!(session.state, FlowState::Menu);
        assert!(session.piece.is_none());
        assert_eq!(session.board.locked_materials().len(), 0);
        assert_eq!(session.modulator.len(), 0);
        // Only the frame material survives.
        assert_eq!(session.materials.len(), 1);
    }

    #[test]
    fn session_eye_swap_retags_board_and_piece() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::T]);
        session.start_game();
        session.hard_drop();
        assert_eq!(session.assigner.lazy_eye(), Eye::Left);
        session.swap_lazy_eye();
        assert_eq!(session.assigner.lazy_eye(), Eye::Right);
        for id in session.board.locked_materials() {
            assert_eq!(
                session.materials.get(id).unwrap().channel,
                VisibilityChannel::GoodEyeOnly
            );
        }
        for &id in session.piece.as_ref().unwrap().cell_materials() {
            assert_eq!(
                session.materials.get(id).unwrap().channel,
                VisibilityChannel::LazyEyeOnly
            );
        }
        assert_eq!(session.modulator.len(), 4);
    }

    #[test]
    fn contrast_reaches_locked_cells_within_one_tick() {
        let mut session = session_with(SessionConfig::default(), &[PieceKind::O, PieceKind::O]);
        session.start_game();
        session.hard_drop();
        session.therapy.set_contrast(0.25);
        session.tick(0.016);
        for id in session.board.locked_materials() {
            let mat = session.materials.get(id).unwrap();
            assert!((mat.alpha - 0.25).abs() < 1e-5);
            assert!((mat.contrast - 0.25).abs() < 1e-5);
        }
        // The falling piece stays at full strength for the amblyopic eye.
        for &id in session.piece.as_ref().unwrap().cell_materials() {
            assert!((session.materials.get(id).unwrap().alpha - 1.0).abs() < 1e-5);
        }
    }
}
