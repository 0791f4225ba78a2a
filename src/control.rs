// Inbound control operations: position, alert rules, price targets
use crate::alerts::AlertEngine;
use crate::config::StartupSettings;
use crate::error::ControlError;
use crate::models::{IndicatorName, Position, Side, Timeframe};
use crate::risk::{position_levels, PositionCalculator};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPositionRequest {
    pub entry_price: f64,
    /// "LONG" or "SHORT"
    pub position_type: String,
    pub sl_percent: f64,
    pub tp_percent: f64,
    #[serde(default)]
    pub trailing_sl: bool,
    #[serde(default)]
    pub trailing_tp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetAlertRuleRequest {
    pub timeframe: String,
    pub indicator: String,
    pub enabled: bool,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddPriceAlertRequest {
    pub price: f64,
}

/// Validates control requests and applies them to the running services
///
/// Every check runs before any mutation, so a rejected request leaves
/// position and alert state untouched.
#[derive(Clone)]
pub struct ControlPlane {
    position: Arc<PositionCalculator>,
    alerts: Arc<AlertEngine>,
}

impl ControlPlane {
    pub fn new(position: Arc<PositionCalculator>, alerts: Arc<AlertEngine>) -> Self {
        Self { position, alerts }
    }

    /// Replace the tracked position. An entry price of 0 clears the levels;
    /// a position whose levels overflow is rejected.
    pub fn set_position(&self, request: &SetPositionRequest) -> Result<Position, ControlError> {
        let side: Side = request
            .position_type
            .parse()
            .map_err(ControlError::UnknownSide)?;

        let position = Position {
            entry_price: non_negative("entry_price", request.entry_price)?,
            side,
            sl_percent: non_negative("sl_percent", request.sl_percent)?,
            tp_percent: non_negative("tp_percent", request.tp_percent)?,
            trailing_sl: request.trailing_sl,
            trailing_tp: request.trailing_tp,
        };
        if position.entry_price > Decimal::ZERO && position_levels(&position).is_none() {
            return Err(ControlError::LevelsOutOfRange {
                entry_price: position.entry_price,
            });
        }

        self.position.set_position(position);
        Ok(position)
    }

    pub fn set_alert_rule(&self, request: &SetAlertRuleRequest) -> Result<(), ControlError> {
        let timeframe: Timeframe = request
            .timeframe
            .parse()
            .map_err(ControlError::UnknownTimeframe)?;
        let indicator: IndicatorName = request
            .indicator
            .parse()
            .map_err(ControlError::UnknownIndicator)?;
        let threshold = non_negative("threshold", request.threshold)?;

        self.alerts
            .set_rule(timeframe, indicator, request.enabled, threshold)
    }

    pub fn add_price_alert(&self, request: &AddPriceAlertRequest) -> Result<Decimal, ControlError> {
        let price = to_decimal("price", request.price)?;
        self.alerts.add_price_alert(price)?;
        Ok(price)
    }

    /// Position, alert rules and price targets from settings, validated the
    /// same way runtime requests are. Stops at the first rejected entry.
    pub fn apply_startup(&self, startup: &StartupSettings) -> crate::Result<()> {
        if let Some(request) = &startup.position {
            self.set_position(request)?;
        }
        for request in &startup.alert_rules {
            self.set_alert_rule(request)?;
        }
        for &price in &startup.price_alerts {
            self.add_price_alert(&AddPriceAlertRequest { price })?;
        }

        tracing::info!(
            position = startup.position.is_some(),
            alert_rules = startup.alert_rules.len(),
            price_alerts = startup.price_alerts.len(),
            "Applied startup entries"
        );
        Ok(())
    }
}

fn to_decimal(field: &'static str, value: f64) -> Result<Decimal, ControlError> {
    let invalid = || ControlError::InvalidNumber {
        field,
        value: value.to_string(),
    };

    if !value.is_finite() {
        return Err(invalid());
    }
    Decimal::from_f64(value).ok_or_else(invalid)
}

fn non_negative(field: &'static str, value: f64) -> Result<Decimal, ControlError> {
    if value < 0.0 {
        return Err(ControlError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    to_decimal(field, value)
}
