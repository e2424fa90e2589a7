//! App: terminal init, main loop, tick and key handling.

use crate::Args;
use crate::game::{FlowState, GameSession, SessionConfig, ShuffleBag};
use crate::gaze::{GazeDwellController, GazeEvent};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, Button};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::{Position, Rect};
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 50;

pub struct App {
    args: Args,
    theme: Theme,
    session: GameSession,
    /// Mouse cursor stands in for the gaze ray on menu screens.
    gaze: GazeDwellController<Button>,
    hover: Option<Button>,
    mouse: Option<(u16, u16)>,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    clear_fx: Vec<Effect>,
    fx_time: Option<Instant>,
    last_frame: Instant,
    should_quit: bool,
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Self {
        let config = SessionConfig {
            width: args.width.max(4),
            height: args.height.max(4),
            buffer: args.buffer.max(2),
            lock_delay: args.lock_delay_ms as f32 / 1000.0,
            soft_drop_mult: args.soft_drop_mult.max(1.0),
            lazy_eye: args.lazy_eye.into(),
        };
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x1234_5678);
        let piece_colors = std::array::from_fn(|i| theme.piece_color(i as u8));
        let mut session = GameSession::new(
            &config,
            args.therapy_config(),
            piece_colors,
            theme.frame,
            Box::new(ShuffleBag::new(seed)),
        );
        if args.no_menu {
            session.start_game();
        }
        let dwell_ms = args.dwell_ms;
        Self {
            args,
            theme,
            session,
            gaze: GazeDwellController::new(dwell_ms),
            hover: None,
            mouse: None,
            repeat_state: None,
            last_repeat_fire: None,
            clear_fx: Vec::new(),
            fx_time: None,
            last_frame: Instant::now(),
            should_quit: false,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
                PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Attempt to enable enhanced keyboard for Release events (held soft drop).
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            if self.should_quit {
                return Ok(());
            }
            let now = Instant::now();
            let dt = now
                .duration_since(self.last_frame)
                .as_secs_f32()
                .min(0.25);
            self.last_frame = now;

            self.tick_dwell(dt);
            self.tick_repeat(now);
            self.session.tick(dt);
            if self.session.state != FlowState::Playing {
                self.repeat_state = None;
            }

            let flash_rows = self.session.take_clear_flash();
            terminal.draw(|f| {
                ui::draw(
                    f,
                    &self.session,
                    &self.theme,
                    self.hover,
                    self.gaze.progress(),
                    &mut self.clear_fx,
                    &mut self.fx_time,
                    now,
                    flash_rows,
                    self.args.no_animation,
                )
            })?;

            // Limit event polling to hit ~60 FPS rendering.
            let timeout = Duration::from_millis(16).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => self.handle_key(key),
                        Event::Mouse(mouse) => {
                            if matches!(
                                mouse.kind,
                                MouseEventKind::Moved | MouseEventKind::Drag(_)
                            ) {
                                self.mouse = Some((mouse.column, mouse.row));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Feed the cursor position into the dwell controller and apply its
    /// notifications. On the playing screen there are no targets, so the
    /// controller idles (and flushes any stale hover).
    fn tick_dwell(&mut self, dt: f32) {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let screen = Rect::new(0, 0, cols, rows);
        let hit = self.mouse.and_then(|(cx, cy)| {
            ui::button_rects(self.session.state, screen)
                .into_iter()
                .find(|(_, rect)| rect.contains(Position { x: cx, y: cy }))
                .map(|(button, _)| button)
        });
        let mut events = Vec::new();
        self.gaze.tick(hit, (dt * 1000.0) as u32, &mut events);
        for event in events {
            match event {
                GazeEvent::Enter(button) => self.hover = Some(button),
                GazeEvent::Exit(_) => self.hover = None,
                GazeEvent::Activate(button) => {
                    self.hover = None;
                    self.activate(button);
                }
            }
        }
    }

    /// Dwell activations map 1:1 to flow transitions.
    fn activate(&mut self, button: Button) {
        match button {
            Button::Start | Button::Retry => self.session.start_game(),
            Button::BackToMenu => self.session.return_to_menu(),
            Button::Quit => self.should_quit = true,
        }
    }

    fn apply_move(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.session.move_left(),
            Action::MoveRight => self.session.move_right(),
            _ => {}
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let (action, first) = match self.repeat_state {
            Some(s) => s,
            None => return,
        };
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_move(action);
            self.last_repeat_fire = Some(now);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let action = key_to_action(key);

        if key.kind == KeyEventKind::Release {
            if action == Action::SoftDrop {
                self.session.set_soft_drop(false);
            }
            if self.repeat_state.map(|(a, _)| a) == Some(action) {
                self.repeat_state = None;
                self.last_repeat_fire = None;
            }
            return;
        }
        if key.kind != KeyEventKind::Press {
            return;
        }
        // Ignore OS key repeats for actions we auto-repeat ourselves.
        if self.repeat_state.map(|(a, _)| a) == Some(action) {
            return;
        }

        let playing = self.session.state == FlowState::Playing;
        match action {
            Action::Quit => self.should_quit = true,
            Action::SwapEye => self.session.swap_lazy_eye(),
            Action::GaborToggle => {
                self.session.therapy.gabor_mode = !self.session.therapy.gabor_mode;
            }
            Action::ContrastDown => self.session.therapy.nudge_contrast(-0.05),
            Action::ContrastUp => self.session.therapy.nudge_contrast(0.05),
            Action::Menu => {
                if self.session.state != FlowState::Menu {
                    self.session.return_to_menu();
                }
            }
            Action::Start => {
                if !playing {
                    self.session.start_game();
                }
            }
            Action::MoveLeft | Action::MoveRight if playing => {
                self.apply_move(action);
                self.repeat_state = Some((action, Instant::now()));
                self.last_repeat_fire = None;
            }
            Action::Rotate if playing => self.session.rotate(),
            Action::SoftDrop if playing => self.session.set_soft_drop(true),
            Action::HardDrop if playing => {
                self.session.hard_drop();
                self.repeat_state = None;
            }
            _ => {}
        }
    }
}
