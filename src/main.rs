//! Dichotrix — dichoptic falling-block vision-therapy game in the terminal.
//!
//! Two side-by-side viewports show each eye different content: the
//! amblyopic eye tracks the falling piece at full contrast while the
//! dominant eye sees the locked stack contrast-reduced; both share the
//! board frame for binocular fusion.

mod app;
mod board;
mod dichoptic;
mod game;
mod gaze;
mod input;
mod material;
mod piece;
mod theme;
mod therapy;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use dichoptic::Eye;
use therapy::TherapyConfig;

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let mut app = App::new(args, theme);
    app.run()?;
    Ok(())
}

/// Dichoptic falling-block puzzle for amblyopia therapy, in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "dichotrix",
    version,
    about = "Dichoptic falling-block puzzle in the terminal. Each eye viewport sees different content; the dominant eye's stack is contrast-reduced for amblyopia therapy.",
    long_about = "Dichotrix renders the playfield twice, once per eye. The falling piece is \
        visible only in the amblyopic (\"lazy\") eye's viewport, the locked stack only in the \
        dominant (\"good\") eye's viewport at reduced contrast, and the board frame in both to \
        anchor binocular fusion. Intended for use with a mirror stereoscope or crossed-eye \
        free fusion.\n\n\
        CONTROLS:\n  Left/Right or h/l  Move     Up or k   Rotate     Down or j  Soft drop\n  Space              Hard drop  Enter     Start      Esc        Menu\n  e  Swap lazy eye   g  Gabor mode   [ ]  Good-eye contrast   q  Quit\n\n\
        Menu buttons also activate by resting the mouse cursor on them (dwell).\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Playfield width in columns.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: i32,

    /// Playfield height in rows.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: i32,

    /// Spawn buffer rows above the visible playfield.
    #[arg(long, default_value = "4", value_name = "ROWS")]
    pub buffer: i32,

    /// Which eye is the amblyopic ("lazy") one at startup.
    #[arg(long, default_value = "left")]
    pub lazy_eye: LazyEye,

    /// Contrast shown to the dominant eye (0.1 to 1.0).
    #[arg(long, default_value = "0.5", value_name = "C")]
    pub contrast: f32,

    /// Start with Gabor-patch mode enabled.
    #[arg(long)]
    pub gabor: bool,

    /// Gabor grating frequency (1 to 16).
    #[arg(long, default_value = "4.0", value_name = "F")]
    pub gabor_frequency: f32,

    /// Gabor grating orientation in degrees (0 to 180).
    #[arg(long, default_value = "45.0", value_name = "DEG")]
    pub gabor_orientation: f32,

    /// Gabor grating contrast (0.1 to 1.0).
    #[arg(long, default_value = "0.8", value_name = "C")]
    pub gabor_contrast: f32,

    /// Gabor Gaussian envelope sigma (0.05 to 2.0).
    #[arg(long, default_value = "0.3", value_name = "S")]
    pub gabor_sigma: f32,

    /// Dwell time in ms before a hovered menu button activates.
    #[arg(long, default_value = "1500", value_name = "MS")]
    pub dwell_ms: u32,

    /// Lock delay in ms once a piece lands (before it locks).
    #[arg(long, default_value = "500", value_name = "MS")]
    pub lock_delay_ms: u64,

    /// Soft-drop speed multiplier (fall interval is divided by this).
    #[arg(long, default_value = "5.0", value_name = "X")]
    pub soft_drop_mult: f32,

    /// Path to theme file (btop-style theme[key]="value"). One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Skip main menu and start the game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Disable the line-clear flash effect.
    #[arg(long)]
    pub no_animation: bool,
}

impl Args {
    /// Therapy parameters from the CLI, clamped to their valid ranges.
    pub fn therapy_config(&self) -> TherapyConfig {
        let mut config = TherapyConfig {
            gabor_mode: self.gabor,
            ..TherapyConfig::default()
        };
        config.set_contrast(self.contrast);
        config.set_frequency(self.gabor_frequency);
        config.set_orientation(self.gabor_orientation);
        config.set_gabor_contrast(self.gabor_contrast);
        config.set_sigma(self.gabor_sigma);
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LazyEye {
    #[default]
    Left,
    Right,
}

impl From<LazyEye> for Eye {
    fn from(value: LazyEye) -> Self {
        match value {
            LazyEye::Left => Self::Left,
            LazyEye::Right => Self::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
