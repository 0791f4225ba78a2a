// Position stop-loss / take-profit levels
pub mod position;

pub use position::{position_levels, PositionCalculator};
