//! Layout and drawing: dual eye viewports, HUD, menu and game-over screens,
//! dwell buttons, line-clear flash.

use crate::dichoptic::{Eye, VisibilityChannel};
use crate::game::{FlowState, GameSession};
use crate::material::Material;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use std::collections::HashMap;
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each board cell is 2 terminal columns x 1 row.
const CELL_W: u16 = 2;
const SIDEBAR_WIDTH: u16 = 26;
const PANEL_GAP: u16 = 2;

/// Duration of the line-clear flash (TachyonFX fade).
const CLEAR_FLASH_MS: u32 = 400;

/// Dwell-activatable buttons across all screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Start,
    Quit,
    Retry,
    BackToMenu,
}

/// One eye panel's outer rect (border included).
fn panel_size(session: &GameSession) -> (u16, u16) {
    let w = session.board.width() as u16 * CELL_W + 2;
    let h = session.board.height() as u16 + 2;
    (w, h)
}

/// Outer rects for the two eye panels and the sidebar, centered in `area`.
fn game_layout(session: &GameSession, area: Rect) -> ([Rect; 2], Rect) {
    let (pw, ph) = panel_size(session);
    let total_w = pw * 2 + PANEL_GAP + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    let clamp_w = |w: u16, x0: u16| w.min(area.width.saturating_sub(x0.saturating_sub(area.x)));
    let left = Rect {
        x,
        y,
        width: clamp_w(pw, x),
        height: ph.min(area.height),
    };
    let right = Rect {
        x: x + pw + PANEL_GAP,
        y,
        width: clamp_w(pw, x + pw + PANEL_GAP),
        height: ph.min(area.height),
    };
    let sidebar = Rect {
        x: right.x + pw,
        y,
        width: clamp_w(SIDEBAR_WIDTH, right.x + pw),
        height: ph.min(area.height),
    };
    ([left, right], sidebar)
}

/// Hit-test rects for the dwell buttons on the current screen, clamped to
/// the drawable area.
pub fn button_rects(state: FlowState, area: Rect) -> Vec<(Button, Rect)> {
    let rects = match state {
        FlowState::Menu => {
            let popup = centered_rect(area, 46, 19);
            vec![
                (Button::Start, button_rect(popup, 8)),
                (Button::Quit, button_rect(popup, 12)),
            ]
        }
        FlowState::Over => {
            let popup = centered_rect(area, 40, 14);
            vec![
                (Button::Retry, button_rect(popup, 6)),
                (Button::BackToMenu, button_rect(popup, 10)),
            ]
        }
        FlowState::Playing => Vec::new(),
    };
    rects
        .into_iter()
        .map(|(button, rect)| (button, rect.intersection(area)))
        .collect()
}

fn centered_rect(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn button_rect(popup: Rect, rel_y: u16) -> Rect {
    let w = 24u16.min(popup.width);
    Rect {
        x: popup.x + popup.width.saturating_sub(w) / 2,
        y: popup.y + rel_y,
        width: w,
        height: 3,
    }
}

/// Draw the current screen. `flash_rows` is the just-cleared row count (0 if
/// none); a fresh flash effect is created for each eye panel when non-zero.
pub fn draw(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    hover: Option<Button>,
    dwell: Option<(Button, f32)>,
    clear_fx: &mut Vec<Effect>,
    fx_process_time: &mut Option<Instant>,
    now: Instant,
    flash_rows: u32,
    no_animation: bool,
) {
    let area = frame.area();
    match session.state {
        FlowState::Menu => draw_menu(frame, session, theme, area, hover, dwell),
        FlowState::Playing => {
            draw_game(frame, session, theme, area);
            apply_clear_flash(
                frame,
                session,
                theme,
                area,
                clear_fx,
                fx_process_time,
                now,
                flash_rows,
                no_animation,
            );
        }
        FlowState::Over => {
            draw_game(frame, session, theme, area);
            draw_game_over(frame, session, theme, area, hover, dwell);
        }
    }
}

fn draw_game(frame: &mut Frame, session: &GameSession, theme: &Theme, area: Rect) {
    let ([left, right], sidebar) = game_layout(session, area);
    draw_eye_panel(frame, session, theme, left, Eye::Left);
    draw_eye_panel(frame, session, theme, right, Eye::Right);
    draw_sidebar(frame, session, theme, sidebar);
}

/// One eye's viewport: the board filtered through that eye's channel mask.
/// The frame (fusion channel) is the panel border, drawn for both eyes at
/// full contrast; everything else is blended by its material's alpha.
fn draw_eye_panel(frame: &mut Frame, session: &GameSession, theme: &Theme, area: Rect, side: Eye) {
    let mask = session.assigner.mask_for(side);
    let lazy = side == session.assigner.lazy_eye();
    let title = match (side, lazy) {
        (Eye::Left, true) => " LEFT EYE · lazy ",
        (Eye::Left, false) => " LEFT EYE · good ",
        (Eye::Right, true) => " RIGHT EYE · lazy ",
        (Eye::Right, false) => " RIGHT EYE · good ",
    };
    let frame_color = session
        .materials
        .get(session.frame)
        .map(|m| m.base)
        .unwrap_or(theme.frame);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(frame_color))
        .title(title)
        .title_style(Style::default().fg(frame_color));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = session.board.width();
    let height = session.board.height();

    // Visible falling-piece cells for this eye.
    let mut piece_cells: HashMap<(i32, i32), &Material> = HashMap::new();
    if mask.allows(VisibilityChannel::LazyEyeOnly) {
        if let Some(piece) = session.piece.as_ref() {
            for (&(x, y), &id) in piece
                .cell_positions()
                .iter()
                .zip(piece.cell_materials().iter())
            {
                if let Some(mat) = session.materials.get(id) {
                    piece_cells.insert((x, y), mat);
                }
            }
        }
    }
    let show_locked = mask.allows(VisibilityChannel::GoodEyeOnly);

    let mut lines: Vec<Line> = Vec::with_capacity(height as usize);
    for row in 0..height {
        let y = height - 1 - row;
        let mut spans: Vec<Span> = Vec::with_capacity(width as usize);
        for x in 0..width {
            let mat = piece_cells.get(&(x, y)).copied().or_else(|| {
                if show_locked {
                    session
                        .board
                        .cell(x, y)
                        .and_then(|c| session.materials.get(c.material))
                } else {
                    None
                }
            });
            spans.push(match mat {
                Some(mat) => cell_span(mat, theme, x, y),
                None => Span::styled("  ", Style::default().bg(theme.bg)),
            });
        }
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Glyph and colour for one cell: colour blended toward the background by
/// the pushed alpha, grating glyphs when the material is in Gabor mode.
fn cell_span<'a>(mat: &Material, theme: &Theme, x: i32, y: i32) -> Span<'a> {
    let color = blend(mat.base, theme.bg, mat.alpha);
    let glyph = if mat.gabor_enabled {
        grating_glyph(mat, x, y)
    } else {
        "██"
    };
    Span::styled(glyph, Style::default().fg(color).bg(theme.bg))
}

/// Striped shading from the pushed Gabor frequency and orientation. The
/// actual Gabor math lives in the eye-side renderer; this is just a legible
/// stand-in driven by the same forwarded parameters.
fn grating_glyph(mat: &Material, x: i32, y: i32) -> &'static str {
    let (sin, cos) = mat.gabor_orientation.sin_cos();
    let phase = (x as f32 * cos + y as f32 * sin) * mat.gabor_frequency * 0.25;
    if phase.rem_euclid(2.0) < 1.0 {
        if mat.gabor_contrast >= 0.5 { "▓▓" } else { "▒▒" }
    } else {
        "░░"
    }
}

/// Linear blend of `base` toward `bg`; alpha 1.0 keeps the base colour.
pub fn blend(base: Color, bg: Color, alpha: f32) -> Color {
    let (br, bg_, bb) = rgb_of(base);
    let (r0, g0, b0) = rgb_of(bg);
    let a = alpha.clamp(0.0, 1.0);
    let mix = |lo: u8, hi: u8| (lo as f32 + (hi as f32 - lo as f32) * a).round() as u8;
    Color::Rgb(mix(r0, br), mix(g0, bg_), mix(b0, bb))
}

fn rgb_of(c: Color) -> (u8, u8, u8) {
    match c {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::Red => (224, 108, 117),
        Color::Green => (152, 195, 121),
        Color::Yellow => (229, 192, 123),
        Color::Blue => (97, 175, 239),
        Color::Magenta => (198, 120, 221),
        Color::Cyan => (86, 182, 194),
        Color::Gray => (128, 128, 128),
        Color::DarkGray => (64, 64, 64),
        Color::White => (255, 255, 255),
        _ => (128, 128, 128),
    }
}

fn draw_sidebar(frame: &mut Frame, session: &GameSession, theme: &Theme, area: Rect) {
    if area.width < 10 {
        return;
    }
    let title_style = Style::default().fg(theme.title).bold();
    let text_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);

    let eye_name = |eye: Eye| match eye {
        Eye::Left => "LEFT",
        Eye::Right => "RIGHT",
    };
    let lazy = eye_name(session.assigner.lazy_eye());
    let good = eye_name(session.assigner.good_eye());
    let contrast_pct = (session.therapy.good_eye_contrast * 100.0).round() as u32;
    let gabor = &session.therapy;

    let mut lines = vec![
        Line::from(Span::styled(" DICHOTRIX", title_style)),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Score  ", dim_style),
            Span::styled(format!("{}", session.score), text_style),
        ]),
        Line::from(vec![
            Span::styled(" Level  ", dim_style),
            Span::styled(format!("{}", session.level), text_style),
        ]),
        Line::from(vec![
            Span::styled(" Lines  ", dim_style),
            Span::styled(format!("{}", session.lines), text_style),
        ]),
        Line::from(""),
        Line::from(Span::styled(" THERAPY", title_style)),
        Line::from(vec![
            Span::styled(" Lazy eye  ", dim_style),
            Span::styled(lazy, text_style),
        ]),
        Line::from(vec![
            Span::styled(" Good eye  ", dim_style),
            Span::styled(good, text_style),
        ]),
        Line::from(vec![
            Span::styled(" Contrast  ", dim_style),
            Span::styled(format!("{contrast_pct}%"), text_style),
        ]),
        Line::from(vec![
            Span::styled(" Gabor     ", dim_style),
            Span::styled(if gabor.gabor_mode { "on" } else { "off" }, text_style),
        ]),
    ];
    if gabor.gabor_mode {
        lines.push(Line::from(Span::styled(
            format!("  f {:.1}  θ {:.0}°", gabor.gabor_frequency, gabor.gabor_orientation),
            dim_style,
        )));
        lines.push(Line::from(Span::styled(
            format!("  c {:.2} σ {:.2}", gabor.gabor_contrast, gabor.gabor_sigma),
            dim_style,
        )));
    }
    if let Some(piece) = session.piece.as_ref() {
        if piece.grounded() {
            let pct = (piece.lock_progress(session.lock_delay()) * 100.0).round() as u32;
            lines.push(Line::from(vec![
                Span::styled(" Locking   ", dim_style),
                Span::styled(format!("{pct}%"), text_style),
            ]));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" KEYS", title_style)));
    for hint in [
        " ←→ move    ↑ rotate",
        " ↓ soft     ␣ hard drop",
        " e swap eye g gabor",
        " [ ] contrast",
        " esc menu   q quit",
    ] {
        lines.push(Line::from(Span::styled(hint, dim_style)));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_menu(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    area: Rect,
    hover: Option<Button>,
    dwell: Option<(Button, f32)>,
) {
    let popup = centered_rect(area, 46, 19);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.frame));
    frame.render_widget(block, popup);

    let title = Line::from(vec![
        Span::styled(" DICHO ", Style::default().fg(theme.title).bold()),
        Span::styled("TRIX ", Style::default().fg(theme.main_fg).bold()),
    ]);
    let lazy = match session.assigner.lazy_eye() {
        Eye::Left => "LEFT",
        Eye::Right => "RIGHT",
    };
    let contrast_pct = (session.therapy.good_eye_contrast * 100.0).round() as u32;
    let header = vec![
        Line::from(""),
        title.alignment(Alignment::Center),
        Line::from(Span::styled(
            "dichoptic therapy puzzle",
            Style::default().fg(theme.inactive_fg),
        ))
        .alignment(Alignment::Center),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "lazy eye {lazy} · contrast {contrast_pct}% · gabor {}",
                if session.therapy.gabor_mode { "on" } else { "off" }
            ),
            Style::default().fg(theme.main_fg),
        ))
        .alignment(Alignment::Center),
        Line::from(Span::styled(
            "e / [ ] / g adjust · enter starts",
            Style::default().fg(theme.inactive_fg),
        ))
        .alignment(Alignment::Center),
    ];
    let header_rect = Rect {
        x: popup.x + 1,
        y: popup.y + 1,
        width: popup.width.saturating_sub(2),
        height: 6.min(popup.height.saturating_sub(2)),
    };
    frame.render_widget(Paragraph::new(header), header_rect);

    for (button, rect) in button_rects(FlowState::Menu, area) {
        draw_button(frame, theme, button, rect, hover == Some(button));
    }
    draw_dwell_gauge(frame, theme, popup, dwell);

    let hint = Line::from(Span::styled(
        "rest the cursor on a button to activate",
        Style::default().fg(theme.inactive_fg),
    ))
    .alignment(Alignment::Center);
    let hint_rect = Rect {
        x: popup.x + 1,
        y: popup.y + popup.height.saturating_sub(2),
        width: popup.width.saturating_sub(2),
        height: 1,
    };
    frame.render_widget(Paragraph::new(vec![hint]), hint_rect);
}

fn draw_game_over(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    area: Rect,
    hover: Option<Button>,
    dwell: Option<(Button, f32)>,
) {
    let popup = centered_rect(area, 40, 14);
    frame.render_widget(ratatui::widgets::Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.frame));
    frame.render_widget(block, popup);

    let body = vec![
        Line::from(""),
        Line::from(Span::styled(" GAME OVER ", Style::default().fg(theme.title).bold()))
            .alignment(Alignment::Center),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "score {} · level {} · lines {}",
                session.score, session.level, session.lines
            ),
            Style::default().fg(theme.main_fg),
        ))
        .alignment(Alignment::Center),
    ];
    let body_rect = Rect {
        x: popup.x + 1,
        y: popup.y + 1,
        width: popup.width.saturating_sub(2),
        height: 4.min(popup.height.saturating_sub(2)),
    };
    frame.render_widget(Paragraph::new(body), body_rect);

    for (button, rect) in button_rects(FlowState::Over, area) {
        draw_button(frame, theme, button, rect, hover == Some(button));
    }
    draw_dwell_gauge(frame, theme, popup, dwell);
}

fn draw_button(frame: &mut Frame, theme: &Theme, button: Button, rect: Rect, hovered: bool) {
    let label = match button {
        Button::Start => "START THERAPY",
        Button::Quit => "QUIT",
        Button::Retry => "RETRY",
        Button::BackToMenu => "MAIN MENU",
    };
    let (border_style, label_style) = if hovered {
        (
            Style::default().fg(theme.title),
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )
    } else {
        (
            Style::default().fg(theme.inactive_fg),
            Style::default().fg(theme.main_fg),
        )
    };
    let block = Block::default().borders(Borders::ALL).border_style(border_style);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(label, label_style)))
            .alignment(Alignment::Center),
        inner,
    );
}

/// Progress ring equivalent: a gauge filling while the cursor dwells.
fn draw_dwell_gauge(frame: &mut Frame, theme: &Theme, popup: Rect, dwell: Option<(Button, f32)>) {
    let Some((_, ratio)) = dwell else { return };
    let rect = Rect {
        x: popup.x + 2,
        y: popup.y + popup.height.saturating_sub(4),
        width: popup.width.saturating_sub(4),
        height: 1,
    };
    let gauge = Gauge::default()
        .ratio(f64::from(ratio))
        .gauge_style(Style::default().fg(theme.title).bg(theme.bg))
        .label("");
    frame.render_widget(gauge, rect);
}

/// Create and process the line-clear flash (TachyonFX fade over each eye
/// panel). Purely cosmetic; the simulation has already cleared and shifted.
fn apply_clear_flash(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    area: Rect,
    clear_fx: &mut Vec<Effect>,
    fx_process_time: &mut Option<Instant>,
    now: Instant,
    flash_rows: u32,
    no_animation: bool,
) {
    if no_animation {
        clear_fx.clear();
        *fx_process_time = None;
        return;
    }
    let ([left, right], _) = game_layout(session, area);
    if flash_rows > 0 {
        for rect in [left, right] {
            clear_fx.push(
                fx::fade_from(theme.title, theme.bg, (CLEAR_FLASH_MS, Interpolation::Linear))
                    .with_area(rect),
            );
        }
    }
    if clear_fx.is_empty() {
        *fx_process_time = None;
        return;
    }
    let delta = fx_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u128::from(u32::MAX)) as u32);
    *fx_process_time = Some(now);
    for (effect, rect) in clear_fx.iter_mut().zip([left, right].into_iter().cycle()) {
        frame.render_effect(effect, rect, tfx_delta);
    }
    clear_fx.retain(|e| !e.done());
}
