//! Colours: btop-style `theme[key]="#RRGGBB"` files, palettes and One Dark defaults.

use crate::Palette;
use crate::board::NUM_COLORS;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// One Dark values, also the fallbacks for keys missing from a theme file.
const ONEDARK_PUYO: [Color; NUM_COLORS] = [
    rgb(0xE06C75), // red
    rgb(0x98C379), // green
    rgb(0x61AFEF), // blue
    rgb(0xE5C07B), // yellow
];
const ONEDARK_BG: Color = rgb(0x31353F);
const ONEDARK_DIV: Color = rgb(0x3F444F);
const ONEDARK_FG: Color = rgb(0xABB2BF);
const ONEDARK_TITLE: Color = rgb(0xE5C07B);
const ONEDARK_INACTIVE: Color = rgb(0x5C6370);

/// Colours used by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Puyo colours in `PuyoColor::index` order: red, green, blue, yellow.
    pub puyo: [Color; NUM_COLORS],
    /// Board background.
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    /// Score and panel text.
    pub main_fg: Color,
    /// Titles and chain popups.
    pub title: Color,
    /// Ghost piece, death mark, hints.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            puyo: ONEDARK_PUYO,
            bg: ONEDARK_BG,
            div_line: ONEDARK_DIV,
            main_fg: ONEDARK_FG,
            title: ONEDARK_TITLE,
            inactive_fg: ONEDARK_INACTIVE,
        }
    }
}

impl Theme {
    /// Read a btop-style theme file. No path (or a missing file) gives One Dark.
    /// The palette is applied last and overrides the puyo colours.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?))
            }
            _ => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.puyo = [rgb(0xFF0000), rgb(0x00FF00), rgb(0x0088FF), rgb(0xFFFF00)];
                self.main_fg = Color::White;
            }
            // Okabe-Ito style set: no red/green pair.
            Palette::Colorblind => {
                self.puyo = [rgb(0xCC3311), rgb(0x009988), rgb(0x0077BB), rgb(0xEE7733)];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str], fallback: Color| {
            keys.iter()
                .find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()))
                .unwrap_or(fallback)
        };
        Self {
            puyo: [
                get(&["cpu_end", "temp_end"], ONEDARK_PUYO[0]),
                get(&["mem_box", "cpu_start"], ONEDARK_PUYO[1]),
                get(&["cpu_box"], ONEDARK_PUYO[2]),
                get(&["cpu_mid", "title"], ONEDARK_PUYO[3]),
            ],
            bg: get(&["meter_bg"], ONEDARK_BG),
            div_line: get(&["div_line"], ONEDARK_DIV),
            main_fg: get(&["main_fg"], ONEDARK_FG),
            title: get(&["title"], ONEDARK_TITLE),
            inactive_fg: get(&["inactive_fg"], ONEDARK_INACTIVE),
        }
    }

    #[inline]
    pub fn puyo_color(&self, index: u8) -> Color {
        self.puyo[index as usize % NUM_COLORS]
    }
}

/// `theme[key]="value"` lines into a map; comments and malformed lines are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let rest = line.strip_prefix("theme[")?;
            let (key, rest) = rest.split_once(']')?;
            let (_, value) = rest.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// "#RRGGBB" or "#RGB" to an RGB colour.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(digits.to_string());
    if !digits.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16);
    let (r, g, b) = match digits.len() {
        6 => (channel(0..2), channel(2..4), channel(4..6)),
        3 => (channel(0..1), channel(1..2), channel(2..3)),
        _ => return Err(invalid()),
    };
    let (r, g, b) = (
        r.map_err(|_| invalid())?,
        g.map_err(|_| invalid())?,
        b.map_err(|_| invalid())?,
    );
    Ok(if digits.len() == 3 {
        Color::Rgb(r * 17, g * 17, b * 17)
    } else {
        Color::Rgb(r, g, b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        assert_eq!(parse_hex("#E06C75").unwrap(), Color::Rgb(0xE0, 0x6C, 0x75));
    }

    #[test]
    fn test_parse_hex_3() {
        assert_eq!(parse_hex("#FFF").unwrap(), Color::Rgb(255, 255, 255));
        assert_eq!(parse_hex("0a0").unwrap(), Color::Rgb(0, 170, 0));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(matches!(parse_hex("#12345"), Err(ThemeError::InvalidHex(_))));
        assert!(parse_hex("#GGGGGG").is_err());
        assert!(parse_hex("#ééé").is_err());
    }

    #[test]
    fn test_parse_theme_lines() {
        let map = parse_theme_file(
            "# comment\n\
             theme[meter_bg]=\"#31353F\"\n\
             theme[cpu_box]='#000000'\n\
             garbage\n\
             theme[empty]=\"\"",
        );
        assert_eq!(map.get("meter_bg").map(String::as_str), Some("#31353F"));
        assert_eq!(map.get("cpu_box").map(String::as_str), Some("#000000"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_from_map_falls_back_per_key() {
        let map = parse_theme_file("theme[cpu_box]=\"#000000\"");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.puyo[2], Color::Rgb(0, 0, 0));
        assert_eq!(theme.puyo[0], ONEDARK_PUYO[0]);
        assert_eq!(theme.bg, ONEDARK_BG);
    }

    #[test]
    fn test_palettes_keep_colours_distinct() {
        for palette in [Palette::Normal, Palette::HighContrast, Palette::Colorblind] {
            let mut theme = Theme::default();
            theme.apply_palette(palette);
            for i in 0..NUM_COLORS {
                for j in i + 1..NUM_COLORS {
                    assert_ne!(theme.puyo[i], theme.puyo[j]);
                }
            }
        }
    }

    #[test]
    fn test_missing_file_gives_default() {
        let theme = Theme::load(Some(Path::new("/nonexistent/x.theme")), Palette::Normal).unwrap();
        assert_eq!(theme, Theme::default());
    }
}
