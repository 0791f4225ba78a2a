use crate::models::{Position, Side};
use rust_decimal::Decimal;
use std::sync::{PoisonError, RwLock};

/// Holds the single configured position and derives SL/TP levels from it
///
/// Levels depend only on entry price, side and the configured percentages.
/// The trailing flags are stored and reported but never move the levels.
#[derive(Default)]
pub struct PositionCalculator {
    position: RwLock<Position>,
}

impl PositionCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored position wholesale
    pub fn set_position(&self, position: Position) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = position;
        tracing::info!(
            entry = %position.entry_price,
            side = %position.side,
            sl_percent = %position.sl_percent,
            tp_percent = %position.tp_percent,
            trailing_sl = position.trailing_sl,
            trailing_tp = position.trailing_tp,
            "Position updated"
        );
    }

    pub fn position(&self) -> Position {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calculate_sl(&self) -> Option<Decimal> {
        stop_loss(&self.position())
    }

    pub fn calculate_tp(&self) -> Option<Decimal> {
        take_profit(&self.position())
    }

    /// `(sl, tp)` from one consistent read, or `None` until an entry price > 0 is set
    pub fn levels(&self) -> Option<(Decimal, Decimal)> {
        let position = self.position();
        if position.entry_price <= Decimal::ZERO {
            return None;
        }

        let levels = position_levels(&position);
        if levels.is_none() {
            tracing::warn!(entry = %position.entry_price, "SL/TP out of decimal range, skipping");
        }
        levels
    }
}

/// SL and TP for a position, `None` if either overflows
pub fn position_levels(position: &Position) -> Option<(Decimal, Decimal)> {
    Some((stop_loss(position)?, take_profit(position)?))
}

fn offset_price(entry: Decimal, percent: Decimal, up: bool) -> Option<Decimal> {
    let offset = percent.checked_div(Decimal::ONE_HUNDRED)?;
    let factor = if up {
        Decimal::ONE.checked_add(offset)?
    } else {
        Decimal::ONE.checked_sub(offset)?
    };
    entry.checked_mul(factor)
}

fn stop_loss(position: &Position) -> Option<Decimal> {
    offset_price(position.entry_price, position.sl_percent, position.side == Side::Short)
}

fn take_profit(position: &Position) -> Option<Decimal> {
    offset_price(position.entry_price, position.tp_percent, position.side == Side::Long)
}
