//! Auto-fit: pick the largest integer font size whose rendered width fits.
//!
//! Text is never wrapped. Measurement is injected so layouts can be
//! computed without a rendering surface.

use serde::{Deserialize, Serialize};

use crate::config::FontRange;
use crate::error::RenderResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Regular,
    Bold,
}

impl FontWeight {
    pub fn css(self) -> &'static str {
        match self {
            FontWeight::Regular => "normal",
            FontWeight::Bold => "bold",
        }
    }
}

/// Width of a single line of text in pixels.
///
/// Implementations fail with `CompositingFailed` when they cannot shape the
/// text at all; a zero width is never a stand-in for "no fonts".
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, size: u32, weight: FontWeight) -> RenderResult<f32>;
}

/// Every character advances by `ratio * size` (bold adds 10%).
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    pub ratio: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { ratio: 0.6 }
    }
}

impl TextMeasurer for FixedAdvance {
    fn measure(&self, text: &str, size: u32, weight: FontWeight) -> RenderResult<f32> {
        let boost = match weight {
            FontWeight::Regular => 1.0,
            FontWeight::Bold => 1.1,
        };
        Ok(text.chars().count() as f32 * size as f32 * self.ratio * boost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConstraints {
    pub min_size: u32,
    pub max_size: u32,
    pub max_width: f32,
    pub weight: FontWeight,
}

impl FitConstraints {
    /// An inverted range collapses to `max_size`.
    pub fn new(range: FontRange, max_width: f32, weight: FontWeight) -> Self {
        Self {
            min_size: range.min_size.min(range.max_size),
            max_size: range.max_size,
            max_width,
            weight,
        }
    }
}

/// Start at `max_size` and step down one unit until the text fits or the
/// floor is reached.
pub fn fit<M: TextMeasurer + ?Sized>(
    text: &str,
    constraints: &FitConstraints,
    measurer: &M,
) -> RenderResult<u32> {
    let floor = constraints.min_size.min(constraints.max_size);
    let mut size = constraints.max_size;
    while size > floor && measurer.measure(text, size, constraints.weight)? > constraints.max_width {
        size -= 1;
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(min: u32, max: u32, width: f32) -> FitConstraints {
        FitConstraints::new(FontRange { min_size: min, max_size: max }, width, FontWeight::Regular)
    }

    #[test]
    fn short_text_keeps_max_size() {
        assert_eq!(fit("Jane", &constraints(12, 22, 690.0), &FixedAdvance::default()).unwrap(), 22);
    }

    #[test]
    fn long_text_shrinks_until_it_fits() {
        let m = FixedAdvance { ratio: 1.0 };
        // 10 chars at size s measure 10*s; fits at 30 or below.
        assert_eq!(fit("abcdefghij", &constraints(10, 40, 300.0), &m).unwrap(), 30);
    }

    #[test]
    fn shrinking_stops_at_floor() {
        let text = "x".repeat(500);
        assert_eq!(fit(&text, &constraints(12, 22, 690.0), &FixedAdvance::default()).unwrap(), 12);
    }

    #[test]
    fn bold_measures_wider() {
        let m = FixedAdvance::default();
        let bold = m.measure("Jane", 20, FontWeight::Bold).unwrap();
        assert!(bold > m.measure("Jane", 20, FontWeight::Regular).unwrap());
    }
}
