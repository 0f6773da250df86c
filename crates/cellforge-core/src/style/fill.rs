//! Fill/background style types

use super::Color;

/// Fill style for cell background
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FillStyle {
    #[default]
    None,
    Solid {
        color: Color,
    },
    Pattern {
        pattern: PatternType,
        foreground: Color,
        background: Color,
    },
    Gradient {
        gradient_type: GradientType,
        angle: f64,
        stops: Vec<GradientStop>,
    },
}

impl FillStyle {
    pub fn solid(color: Color) -> Self {
        FillStyle::Solid { color }
    }

    pub fn pattern(pattern: PatternType, foreground: Color, background: Color) -> Self {
        FillStyle::Pattern {
            pattern,
            foreground,
            background,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FillStyle::None)
    }
}

impl std::hash::Hash for FillStyle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FillStyle::None => {}
            FillStyle::Solid { color } => color.hash(state),
            FillStyle::Pattern {
                pattern,
                foreground,
                background,
            } => {
                pattern.hash(state);
                foreground.hash(state);
                background.hash(state);
            }
            FillStyle::Gradient {
                gradient_type,
                angle,
                stops,
            } => {
                gradient_type.hash(state);
                angle.to_bits().hash(state);
                for stop in stops {
                    stop.position.to_bits().hash(state);
                    stop.color.hash(state);
                }
            }
        }
    }
}

impl Eq for FillStyle {}

/// Pattern fill types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternType {
    #[default]
    None,
    Solid,
    MediumGray,
    DarkGray,
    LightGray,
    DarkHorizontal,
    DarkVertical,
    Gray125,
}

/// Gradient types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GradientType {
    #[default]
    Linear,
    Path,
}

/// Gradient stop (position and color)
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub position: f64,
    pub color: Color,
}

impl GradientStop {
    pub fn new(position: f64, color: Color) -> Self {
        Self { position, color }
    }
}
