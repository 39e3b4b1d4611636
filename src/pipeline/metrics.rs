//! Text-width measurement.
//!
//! Measurement is a pure function of (text, font, size), so it can run on any
//! thread. The built-in implementation uses the Adobe AFM advance widths of
//! Helvetica, the same base-14 font the PDF renderer draws with, so fitted
//! sizes match what ends up on the page.

/// Measures single-line text at a given point size.
pub trait TextMeasurer: Send + Sync {
    /// Natural advance width of `text` laid out on one line, in points.
    fn measure_width(&self, text: &str, font_size: f32) -> f32;

    /// Distance from the top of the line to the baseline, in points.
    fn ascent(&self, font_size: f32) -> f32;
}

/// Advance widths (1/1000 em) for WinAnsi code points 32..=126.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' .. '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0' .. '9'
    278, 278, 584, 584, 584, 556, 1015, // ':' .. '@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A' .. 'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N' .. 'Z'
    278, 278, 278, 469, 556, 333, // '[' .. '`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a' .. 'm'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n' .. 'z'
    334, 260, 334, 584, // '{' .. '~'
];

const HELVETICA_ASCENDER: f32 = 718.0;
const UNITS_PER_EM: f32 = 1000.0;

/// Fallback advances for characters outside printable ASCII.
const WIDE_FALLBACK: u16 = 667;
const NARROW_FALLBACK: u16 = 556;

#[derive(Debug, Clone, Copy, Default)]
pub struct HelveticaMetrics;

impl HelveticaMetrics {
    fn advance(c: char) -> u16 {
        let code = c as u32;
        if (32..=126).contains(&code) {
            return HELVETICA_ASCII_WIDTHS[(code - 32) as usize];
        }
        if c.is_whitespace() {
            return HELVETICA_ASCII_WIDTHS[0];
        }
        if c.is_uppercase() {
            WIDE_FALLBACK
        } else {
            NARROW_FALLBACK
        }
    }
}

impl TextMeasurer for HelveticaMetrics {
    fn measure_width(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| Self::advance(c) as u32)
            .sum();
        units as f32 * font_size / UNITS_PER_EM
    }

    fn ascent(&self, font_size: f32) -> f32 {
        HELVETICA_ASCENDER * font_size / UNITS_PER_EM
    }
}
