//! Puyotui: falling-pair colour matching puzzle in the terminal.

mod app;
mod board;
mod game;
mod input;
mod piece;
mod resolve;
mod rules;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use thiserror::Error;

/// Session settings derived from the CLI. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    /// Board columns.
    pub width: usize,
    /// Visible rows (the hidden spawn row is added by the board).
    pub height: usize,
    /// Seed for the pair generator.
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            width: board::COLS,
            height: board::ROWS,
            seed: 0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("board width {0} out of range (4..=16)")]
    Width(u16),
    #[error("board height {0} out of range (4..=24)")]
    Height(u16),
    #[error("tick rate {0} out of range (1..=1000 Hz)")]
    TickRate(f64),
}

impl GameConfig {
    pub const WIDTH_RANGE: std::ops::RangeInclusive<u16> = 4..=16;
    pub const HEIGHT_RANGE: std::ops::RangeInclusive<u16> = 4..=24;
    /// Ticks per second. Also keeps `1 / rate` a valid `Duration`.
    pub const TICK_RATE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !Self::WIDTH_RANGE.contains(&args.width) {
            return Err(ConfigError::Width(args.width));
        }
        if !Self::HEIGHT_RANGE.contains(&args.height) {
            return Err(ConfigError::Height(args.height));
        }
        if !Self::TICK_RATE_RANGE.contains(&args.tick_rate) {
            return Err(ConfigError::TickRate(args.tick_rate));
        }
        Ok(Self {
            difficulty: args.difficulty,
            width: args.width as usize,
            height: args.height as usize,
            seed: args.seed.unwrap_or_else(rand::random),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig::from_args(&args)?;
    let mut app = App::new(args, config, theme);
    app.run()?;
    Ok(())
}

/// Falling-pair colour matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyotui",
    version,
    about = "Falling-pair colour matching puzzle in the terminal. \
        Connect four of a colour to erase them and build chains.",
    long_about = "Puyotui is a terminal puzzle game in the falling-pair style.\n\n\
        Pairs of coloured puyos fall into a 6x12 well. Four or more of one colour touching \
        up/down/left/right are erased; whatever was above falls, and any new groups it forms \
        erase again as a chain. Each chain level doubles the points. The game ends when the \
        spawn point at the top centre is buried.\n\n\
        CONTROLS:\n  Left/Right  h/l   Move         Up / Z  k   Rotate CCW   X  i   Rotate CW\n  \
        Down        j     Soft drop    P           Pause        R      Restart\n  \
        Q / Esc           Quit menu\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Difficulty: easy, medium or hard. Sets how fast pairs fall.
    #[arg(short, long, default_value = "medium")]
    pub difficulty: Difficulty,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Simulation ticks per second. Drop intervals are counted in ticks.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Seed for the pair sequence. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Board width in columns.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub width: u16,

    /// Visible board height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS")]
    pub height: u16,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Disable the erase fade effect.
    #[arg(long)]
    pub no_animation: bool,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Ticks between automatic one-row drops.
    pub fn drop_interval(self) -> u32 {
        match self {
            Self::Easy => 45,
            Self::Medium => 30,
            Self::Hard => 15,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium | Self::Hard => Self::Hard,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Easy | Self::Medium => Self::Easy,
            Self::Hard => Self::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("puyotui").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--seed", "5"]);
        let config = GameConfig::from_args(&args).unwrap();
        assert_eq!(
            config,
            GameConfig {
                seed: 5,
                ..GameConfig::default()
            }
        );
        assert!(!args.no_menu);
        assert_eq!(args.palette, Palette::Normal);
    }

    #[test]
    fn test_difficulty_flag_and_intervals() {
        let args = parse(&["-d", "hard"]);
        assert_eq!(args.difficulty, Difficulty::Hard);
        assert!(Difficulty::Hard.drop_interval() < Difficulty::Medium.drop_interval());
        assert!(Difficulty::Medium.drop_interval() < Difficulty::Easy.drop_interval());
        assert_eq!(Difficulty::Easy.prev(), Difficulty::Easy);
        assert_eq!(Difficulty::Hard.next(), Difficulty::Hard);
        assert_eq!(Difficulty::Easy.next().next(), Difficulty::Hard);
    }

    #[test]
    fn test_out_of_range_board_rejected() {
        let args = parse(&["--width", "3"]);
        assert_eq!(GameConfig::from_args(&args), Err(ConfigError::Width(3)));
        let args = parse(&["--height", "30"]);
        assert_eq!(GameConfig::from_args(&args), Err(ConfigError::Height(30)));
        for rate in ["0", "1e-30", "NaN", "inf", "5000"] {
            let args = parse(&["--tick-rate", rate]);
            assert!(
                matches!(GameConfig::from_args(&args), Err(ConfigError::TickRate(_))),
                "rate {rate} accepted"
            );
        }
        let args = parse(&["--tick-rate", "1"]);
        assert!(GameConfig::from_args(&args).is_ok());
    }

    #[test]
    fn test_palette_aliases() {
        assert_eq!(parse(&["--palette", "contrast"]).palette, Palette::HighContrast);
        assert_eq!(parse(&["--palette", "colourblind"]).palette, Palette::Colorblind);
    }
}
