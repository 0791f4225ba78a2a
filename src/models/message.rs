use super::{format_price, IndicatorValues, Timeframe};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Envelope broadcast to every subscriber, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Status {
        message: String,
    },
    PriceUpdate {
        price: String,
    },
    IndicatorsUpdate {
        indicators: BTreeMap<Timeframe, IndicatorValues>,
    },
    Alert {
        message: String,
    },
    PriceAlertAdded {
        price: String,
    },
    SltpUpdate {
        sl: String,
        tp: String,
    },
}

impl OutboundMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn price_update(price: Decimal) -> Self {
        Self::PriceUpdate {
            price: format_price(price),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    pub fn price_alert_added(price: Decimal) -> Self {
        Self::PriceAlertAdded {
            price: format_price(price),
        }
    }

    pub fn sltp_update(sl: Decimal, tp: Decimal) -> Self {
        Self::SltpUpdate {
            sl: format_price(sl),
            tp: format_price(tp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_price_update_wire_format() {
        let value = serde_json::to_value(OutboundMessage::price_update(dec!(64123.4))).unwrap();
        assert_eq!(value, json!({"type": "price_update", "price": "64123.40"}));
    }

    #[test]
    fn test_sltp_wire_format() {
        let value = serde_json::to_value(OutboundMessage::sltp_update(dec!(99), dec!(102))).unwrap();
        assert_eq!(value, json!({"type": "sltp_update", "sl": "99.00", "tp": "102.00"}));
    }

    #[test]
    fn test_indicators_wire_format() {
        let mut indicators = BTreeMap::new();
        indicators.insert(
            Timeframe::H1,
            IndicatorValues {
                rsi: 55.0,
                ema20: 1.0,
                ema50: 2.0,
                ema200: 3.0,
                bb: crate::models::BollingerBands {
                    upper: 4.0,
                    middle: 5.0,
                    lower: 6.0,
                },
            },
        );

        let value = serde_json::to_value(OutboundMessage::IndicatorsUpdate { indicators }).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "indicators_update",
                "indicators": {
                    "1h": {
                        "RSI": 55.0,
                        "EMA20": 1.0,
                        "EMA50": 2.0,
                        "EMA200": 3.0,
                        "BB": {"Upper": 4.0, "Middle": 5.0, "Lower": 6.0}
                    }
                }
            })
        );
    }

    #[test]
    fn test_status_and_alert_tags() {
        let status = serde_json::to_value(OutboundMessage::status("Connected to Binance")).unwrap();
        assert_eq!(status["type"], "status");

        let added = serde_json::to_value(OutboundMessage::price_alert_added(dec!(70000))).unwrap();
        assert_eq!(added, json!({"type": "price_alert_added", "price": "70000.00"}));

        let alert = serde_json::to_value(OutboundMessage::alert("1h_RSI")).unwrap();
        assert_eq!(alert, json!({"type": "alert", "message": "1h_RSI"}));
    }
}
