//! Cell formatting: fonts, fills, alignment, and number formats.
//!
//! A [`CellStyle`] is an immutable, hashable record interned through a
//! [`StyleRegistry`]; cells hold a [`StyleId`] rather than a full style.

mod alignment;
mod color;
mod fill;
mod font;
mod number_format;
mod registry;

pub use alignment::{Alignment, HorizontalAlignment, ReadingOrder, VerticalAlignment};
pub use color::Color;
pub use fill::{FillStyle, GradientStop, GradientType, PatternType};
pub use font::{FontStyle, FontVerticalAlign, Underline};
pub use number_format::NumberFormat;
pub use registry::{StyleId, StyleRegistry};

/// A complete, immutable cell style: font, fill, alignment, and number
/// format. Two `CellStyle`s that compare equal are always interned to the
/// same [`StyleId`] by a [`StyleRegistry`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub font: FontStyle,
    pub fill: FillStyle,
    pub alignment: Alignment,
    pub num_fmt: NumberFormat,
    /// Raw built-in format ID, when known independently of `num_fmt`'s
    /// parsed representation (a writer round-tripping an unrecognized ID
    /// needs this even though `num_fmt` falls back to `General`).
    pub num_fmt_id: Option<u32>,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.font.bold = bold;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.font.italic = italic;
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font.size = size;
        self
    }

    pub fn font_name<S: Into<String>>(mut self, name: S) -> Self {
        self.font.name = name.into();
        self
    }

    pub fn font_color(mut self, color: Color) -> Self {
        self.font.color = color;
        self
    }

    pub fn fill_color(mut self, color: Color) -> Self {
        self.fill = FillStyle::solid(color);
        self
    }

    pub fn number_format(mut self, fmt: NumberFormat) -> Self {
        self.num_fmt_id = None;
        self.num_fmt = fmt;
        self
    }

    pub fn horizontal_alignment(mut self, align: HorizontalAlignment) -> Self {
        self.alignment.horizontal = align;
        self
    }

    pub fn vertical_alignment(mut self, align: VerticalAlignment) -> Self {
        self.alignment.vertical = align;
        self
    }

    pub fn wrap_text(mut self, wrap: bool) -> Self {
        self.alignment.wrap_text = wrap;
        self
    }
}

impl std::hash::Hash for CellStyle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.font.hash(state);
        self.fill.hash(state);
        self.alignment.hash(state);
        self.num_fmt.hash(state);
        self.num_fmt_id.hash(state);
    }
}

impl Eq for CellStyle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let style = CellStyle::new()
            .bold(true)
            .italic(true)
            .font_size(14.0)
            .fill_color(Color::RED)
            .number_format(NumberFormat::percent());
        assert!(style.font.bold);
        assert!(style.font.italic);
        assert_eq!(style.num_fmt, NumberFormat::percent());
    }

    #[test]
    fn equal_styles_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = CellStyle::new().bold(true);
        let b = CellStyle::new().bold(true);
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
        assert_eq!(a, b);
    }
}
