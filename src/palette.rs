use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Channel multiplier used to derive a card background from its text color.
pub const DARKEN_FACTOR: f64 = 0.6;

pub const DEFAULT_COLORS: [(&str, &str); 11] = [
    ("Red", "#ff9aa0"),
    ("Blue", "#8bbcff"),
    ("Green", "#8be2c0"),
    ("Yellow", "#ffe7a3"),
    ("Orange", "#ffc39c"),
    ("Purple", "#cab3ff"),
    ("Pink", "#ffb0dc"),
    ("Brown", "#cba786"),
    ("Black", "#5a5f73"),
    ("White", "#e6e9f6"),
    ("Gray", "#a2b3d4"),
];

/// Most tiles a game offers; each needs its own selection key.
pub const MAX_ACTIVE: usize = 11;

pub const DEFAULT_ACTIVE: [&str; 6] = ["Red", "Blue", "Green", "Yellow", "Orange", "Purple"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn darken(self, factor: f64) -> Self {
        let scale = |c: u8| (c as f64 * factor).floor().clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::InvalidColor(s.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Case-insensitive name comparison used for every player-facing match.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// A named color the player has to remember.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorToken {
    name: String,
    color: Rgb,
}

impl ColorToken {
    pub fn new(name: impl Into<String>, color: Rgb) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn is(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The full color set plus the subset currently used for generation.
///
/// The active subset is never empty: unknown names are dropped and an
/// empty selection falls back to the full palette. It holds at most
/// [`MAX_ACTIVE`] colors.
#[derive(Debug, Clone)]
pub struct Palette {
    full: Vec<ColorToken>,
    active: Vec<ColorToken>,
}

impl Palette {
    pub fn new<S: AsRef<str>>(full: Vec<ColorToken>, active_names: &[S]) -> Result<Self> {
        if full.is_empty() {
            return Err(Error::EmptyPalette);
        }

        let active = resolve_active(&full, active_names);
        Ok(Self { full, active })
    }

    pub fn from_hex_entries(entries: &[(&str, &str)]) -> Result<Vec<ColorToken>> {
        entries
            .iter()
            .map(|(name, hex)| Ok(ColorToken::new(*name, hex.parse()?)))
            .collect()
    }

    /// Default palette restricted to the given names.
    pub fn with_active<S: AsRef<str>>(active_names: &[S]) -> Self {
        let full = default_tokens();
        let active = resolve_active(&full, active_names);
        Self { full, active }
    }

    pub fn full(&self) -> &[ColorToken] {
        &self.full
    }

    pub fn active(&self) -> &[ColorToken] {
        &self.active
    }

    pub fn lookup(&self, name: &str) -> Option<&ColorToken> {
        self.full.iter().find(|t| t.is(name))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::with_active(&DEFAULT_ACTIVE)
    }
}

fn default_tokens() -> Vec<ColorToken> {
    DEFAULT_COLORS
        .iter()
        .filter_map(|(name, hex)| hex.parse().ok().map(|rgb| ColorToken::new(*name, rgb)))
        .collect()
}

fn resolve_active<S: AsRef<str>>(full: &[ColorToken], names: &[S]) -> Vec<ColorToken> {
    let mut active: Vec<ColorToken> = Vec::new();
    for name in names {
        if let Some(token) = full.iter().find(|t| t.is(name.as_ref())) {
            if !active.contains(token) {
                active.push(token.clone());
            }
        }
    }
    if active.is_empty() {
        active = full.to_vec();
    }
    active.truncate(MAX_ACTIVE);
    active
}
