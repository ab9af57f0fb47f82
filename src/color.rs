//! Color parsing and the label palette.
//!
//! Colors arrive as CSS-style hex strings (`#rgb`, `#rrggbb`, `#rrggbbaa`)
//! and are stored as 8-bit RGBA, the layout the palette texture uploads.

use crate::error::{RenderError, RenderResult};

/// Labels are 16-bit, so a palette can never exceed this many entries.
pub const MAX_PALETTE_LEN: usize = 65536;

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Normalized components for clear colors and uniform upload.
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Components as a wgpu clear color (f64).
    pub fn to_wgpu(self) -> [f64; 4] {
        [
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
            self.a as f64 / 255.0,
        ]
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` hex string.
pub fn parse_hex(s: &str) -> RenderResult<Rgba> {
    let digits = s
        .strip_prefix('#')
        .ok_or_else(|| RenderError::upload(format!("color must start with '#': {s:?}")))?;

    let err = || RenderError::upload(format!("invalid hex color: {s:?}"));

    match digits.len() {
        3 => {
            let mut c = [0u8; 3];
            for (i, ch) in digits.chars().enumerate() {
                let v = ch.to_digit(16).ok_or_else(err)? as u8;
                c[i] = v << 4 | v;
            }
            Ok(Rgba::new(c[0], c[1], c[2], 255))
        }
        6 | 8 => {
            let mut c = [255u8; 4];
            for i in 0..digits.len() / 2 {
                c[i] = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16).map_err(|_| err())?;
            }
            Ok(Rgba::new(c[0], c[1], c[2], c[3]))
        }
        _ => Err(err()),
    }
}

/// Parse a palette of hex strings; the result backs the label color LUT.
pub fn parse_palette(colors: &[String]) -> RenderResult<Vec<Rgba>> {
    if colors.is_empty() {
        return Err(RenderError::upload("palette must not be empty"));
    }
    if colors.len() > MAX_PALETTE_LEN {
        return Err(RenderError::upload(format!(
            "palette has {} entries, max is {}",
            colors.len(),
            MAX_PALETTE_LEN
        )));
    }
    colors.iter().map(|c| parse_hex(c)).collect()
}

/// Default 10-color categorical palette.
pub fn default_palette() -> Vec<Rgba> {
    [
        "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
        "#9c755f", "#bab0ac",
    ]
    .iter()
    .map(|c| parse_hex(c).expect("default palette is valid"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_form() {
        assert_eq!(parse_hex("#f00").unwrap(), Rgba::new(255, 0, 0, 255));
        assert_eq!(parse_hex("#0f0").unwrap(), Rgba::new(0, 255, 0, 255));
    }

    #[test]
    fn parses_long_forms() {
        assert_eq!(parse_hex("#102030").unwrap(), Rgba::new(16, 32, 48, 255));
        assert_eq!(
            parse_hex("#10203040").unwrap(),
            Rgba::new(16, 32, 48, 64)
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_hex("102030").is_err());
        assert!(parse_hex("#10").is_err());
        assert!(parse_hex("#gggggg").is_err());
    }

    #[test]
    fn default_palette_has_ten_opaque_entries() {
        let p = default_palette();
        assert_eq!(p.len(), 10);
        assert!(p.iter().all(|c| c.a == 255));
    }

    #[test]
    fn palette_size_is_bounded() {
        let too_big: Vec<String> = (0..MAX_PALETTE_LEN + 1).map(|_| "#fff".to_string()).collect();
        assert!(parse_palette(&too_big).is_err());
    }
}
