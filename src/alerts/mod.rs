// Threshold alerts against technical levels and user price targets
use crate::error::ControlError;
use crate::hub::Hub;
use crate::models::{format_price, round_price, Band, IndicatorName, IndicatorValues, OutboundMessage, Timeframe};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Price-target tolerance: 0.1% of the current price
const PRICE_TARGET_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Default proximity threshold (percent) for every rule
const DEFAULT_THRESHOLD_PERCENT: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertRule {
    pub enabled: bool,
    pub threshold_percent: Decimal,
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
        }
    }
}

/// Identity of an alert. Its `Display` form is also the alert message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKey {
    Indicator {
        timeframe: Timeframe,
        indicator: IndicatorName,
    },
    Band {
        timeframe: Timeframe,
        band: Band,
    },
    /// Target price rounded to cents
    PriceTarget(Decimal),
}

impl AlertKey {
    pub fn price_target(price: Decimal) -> Self {
        AlertKey::PriceTarget(round_price(price))
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKey::Indicator {
                timeframe,
                indicator,
            } => write!(f, "{}_{}", timeframe, indicator),
            AlertKey::Band { timeframe, band } => write!(f, "{}_BB_{}", timeframe, band),
            AlertKey::PriceTarget(price) => write!(f, "Price reached {}", format_price(*price)),
        }
    }
}

struct AlertBook {
    rules: HashMap<(Timeframe, IndicatorName), AlertRule>,
    /// Every key that has ever fired; never shrinks
    fired: HashSet<AlertKey>,
    price_targets: Vec<Decimal>,
}

/// Owns alert configuration, the fired-key set and pending price targets
///
/// All three sit behind one mutex, so rule changes and evaluation never
/// interleave.
pub struct AlertEngine {
    book: Mutex<AlertBook>,
    hub: Hub,
}

impl AlertEngine {
    /// Every (timeframe, indicator) pair starts enabled at 0.1%
    pub fn new(hub: Hub) -> Self {
        let rules = Timeframe::ALL
            .into_iter()
            .flat_map(|tf| IndicatorName::ALL.into_iter().map(move |ind| (tf, ind)))
            .map(|key| (key, AlertRule::default()))
            .collect();

        Self {
            book: Mutex::new(AlertBook {
                rules,
                fired: HashSet::new(),
                price_targets: Vec::new(),
            }),
            hub,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AlertBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check each enabled rule against the current price
    ///
    /// A level matches when `|price - level| <= threshold% * price`. Bollinger
    /// rules check all three bands independently. Returns the keys that fired
    /// for the first time on this call.
    pub fn evaluate(
        &self,
        snapshot: &BTreeMap<Timeframe, IndicatorValues>,
        current_price: Decimal,
    ) -> Vec<AlertKey> {
        let price = current_price.to_f64().unwrap_or_default();
        let mut book = self.lock();
        let mut fired = Vec::new();

        for (&timeframe, values) in snapshot {
            for indicator in IndicatorName::ALL {
                let rule = match book.rules.get(&(timeframe, indicator)) {
                    Some(rule) if rule.enabled => *rule,
                    _ => continue,
                };
                let tolerance = rule.threshold_percent.to_f64().unwrap_or_default() / 100.0 * price;

                let candidates: Vec<(AlertKey, f64)> = match values.level(indicator) {
                    Some(level) => vec![(
                        AlertKey::Indicator {
                            timeframe,
                            indicator,
                        },
                        level,
                    )],
                    None => Band::ALL
                        .into_iter()
                        .map(|band| (AlertKey::Band { timeframe, band }, values.bb.band(band)))
                        .collect(),
                };

                for (key, level) in candidates {
                    if (price - level).abs() <= tolerance && self.trigger_locked(&mut book, key.clone()) {
                        fired.push(key);
                    }
                }
            }
        }

        fired
    }

    /// Fire an alert once for the lifetime of the engine
    ///
    /// Returns true if this call fired it.
    pub fn trigger(&self, key: AlertKey) -> bool {
        let mut book = self.lock();
        self.trigger_locked(&mut book, key)
    }

    fn trigger_locked(&self, book: &mut AlertBook, key: AlertKey) -> bool {
        let message = key.to_string();
        if !book.fired.insert(key) {
            return false;
        }

        tracing::info!(alert = %message, "Alert triggered");
        self.hub.broadcast(&OutboundMessage::alert(message));
        true
    }

    /// Match at most one pending price target against the current price
    ///
    /// The first target within 0.1% is removed and its alert triggered; the
    /// rest wait for the next call. Returns the removed target.
    pub fn check_price_alerts(&self, current_price: Decimal) -> Option<Decimal> {
        let tolerance = PRICE_TARGET_TOLERANCE * current_price;
        let mut book = self.lock();

        let index = book
            .price_targets
            .iter()
            .position(|target| (current_price - *target).abs() <= tolerance)?;

        let target = book.price_targets.remove(index);
        self.trigger_locked(&mut book, AlertKey::price_target(target));
        Some(target)
    }

    pub fn add_price_alert(&self, price: Decimal) -> Result<(), ControlError> {
        if price <= Decimal::ZERO {
            return Err(ControlError::NonPositivePrice(price));
        }

        let mut book = self.lock();
        book.price_targets.push(price);
        tracing::info!(price = %price, pending = book.price_targets.len(), "Price alert added");
        self.hub.broadcast(&OutboundMessage::price_alert_added(price));
        Ok(())
    }

    pub fn set_rule(
        &self,
        timeframe: Timeframe,
        indicator: IndicatorName,
        enabled: bool,
        threshold_percent: Decimal,
    ) -> Result<(), ControlError> {
        if threshold_percent < Decimal::ZERO {
            return Err(ControlError::InvalidNumber {
                field: "threshold",
                value: threshold_percent.to_string(),
            });
        }

        let mut book = self.lock();
        book.rules.insert(
            (timeframe, indicator),
            AlertRule {
                enabled,
                threshold_percent,
            },
        );
        tracing::info!(
            timeframe = %timeframe,
            indicator = %indicator,
            enabled,
            threshold = %threshold_percent,
            "Alert rule updated"
        );
        Ok(())
    }

    pub fn rule(&self, timeframe: Timeframe, indicator: IndicatorName) -> Option<AlertRule> {
        self.lock().rules.get(&(timeframe, indicator)).copied()
    }

    pub fn price_targets(&self) -> Vec<Decimal> {
        self.lock().price_targets.clone()
    }

    pub fn has_fired(&self, key: &AlertKey) -> bool {
        self.lock().fired.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Subscription;
    use crate::models::BollingerBands;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    fn engine() -> (AlertEngine, Subscription) {
        let hub = Hub::new(256);
        let sub = hub.register();
        (AlertEngine::new(hub), sub)
    }

    fn drain(sub: &mut Subscription) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(payload) = sub.queue.try_recv() {
            out.push(serde_json::from_str(&payload).unwrap());
        }
        out
    }

    fn values_far_away() -> IndicatorValues {
        IndicatorValues {
            rsi: 50.0,
            ema20: 1.0,
            ema50: 1.0,
            ema200: 1.0,
            bb: BollingerBands {
                upper: 1.0,
                middle: 1.0,
                lower: 1.0,
            },
        }
    }

    #[test]
    fn test_default_rules() {
        let (engine, _sub) = engine();
        for tf in Timeframe::ALL {
            for ind in IndicatorName::ALL {
                let rule = engine.rule(tf, ind).unwrap();
                assert!(rule.enabled);
                assert_eq!(rule.threshold_percent, dec!(0.1));
            }
        }
    }

    #[test]
    fn test_key_display() {
        let ind = AlertKey::Indicator {
            timeframe: Timeframe::H1,
            indicator: IndicatorName::Rsi,
        };
        let band = AlertKey::Band {
            timeframe: Timeframe::M30,
            band: Band::Lower,
        };
        assert_eq!(ind.to_string(), "1h_RSI");
        assert_eq!(band.to_string(), "30m_BB_lower");
        assert_eq!(AlertKey::price_target(dec!(100)).to_string(), "Price reached 100.00");
    }

    #[test]
    fn test_ema_within_threshold_fires_once() {
        let (engine, mut sub) = engine();
        let mut values = values_far_away();
        values.ema50 = 100_050.0; // 0.05% away from 100000
        let snapshot = BTreeMap::from([(Timeframe::H1, values)]);

        let fired = engine.evaluate(&snapshot, dec!(100000));
        assert_eq!(
            fired,
            vec![AlertKey::Indicator {
                timeframe: Timeframe::H1,
                indicator: IndicatorName::Ema50
            }]
        );

        let messages = drain(&mut sub);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "alert");
        assert_eq!(messages[0]["message"], "1h_EMA50");
    }

    #[test]
    fn test_alert_key_is_one_shot() {
        let (engine, mut sub) = engine();
        let mut values = values_far_away();
        values.rsi = 100.0;
        let snapshot = BTreeMap::from([(Timeframe::H1, values)]);

        assert_eq!(engine.evaluate(&snapshot, dec!(100)).len(), 1);
        assert_eq!(drain(&mut sub).len(), 1);

        // diverge, then reconverge: still silent
        engine.evaluate(&snapshot, dec!(500));
        assert!(engine.evaluate(&snapshot, dec!(100)).is_empty());
        assert!(drain(&mut sub).is_empty());
        assert!(engine.has_fired(&AlertKey::Indicator {
            timeframe: Timeframe::H1,
            indicator: IndicatorName::Rsi
        }));
    }

    #[test]
    fn test_outside_threshold_does_not_fire() {
        let (engine, mut sub) = engine();
        let mut values = values_far_away();
        values.ema20 = 100_200.0; // 0.2% away
        let snapshot = BTreeMap::from([(Timeframe::M1, values)]);

        assert!(engine.evaluate(&snapshot, dec!(100000)).is_empty());
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn test_bollinger_bands_checked_independently() {
        let (engine, mut sub) = engine();
        let mut values = values_far_away();
        values.bb = BollingerBands {
            upper: 1000.5,
            middle: 900.0,
            lower: 999.5,
        };
        let snapshot = BTreeMap::from([(Timeframe::H4, values)]);

        let fired = engine.evaluate(&snapshot, dec!(1000));
        assert_eq!(fired.len(), 2);

        let messages: Vec<String> = drain(&mut sub)
            .into_iter()
            .map(|m| m["message"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(messages, vec!["4h_BB_upper", "4h_BB_lower"]);
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let (engine, _sub) = engine();
        engine
            .set_rule(Timeframe::H1, IndicatorName::Ema20, false, dec!(0.1))
            .unwrap();

        let mut values = values_far_away();
        values.ema20 = 100.0;
        let snapshot = BTreeMap::from([(Timeframe::H1, values)]);

        assert!(engine.evaluate(&snapshot, dec!(100)).is_empty());
    }

    #[test]
    fn test_wider_threshold_matches() {
        let (engine, _sub) = engine();
        engine
            .set_rule(Timeframe::M30, IndicatorName::Ema200, true, dec!(5))
            .unwrap();

        let mut values = values_far_away();
        values.ema200 = 96.0;
        let snapshot = BTreeMap::from([(Timeframe::M30, values)]);

        assert_eq!(engine.evaluate(&snapshot, dec!(100)).len(), 1);
    }

    #[test]
    fn test_set_rule_rejects_negative_threshold() {
        let (engine, _sub) = engine();
        let result = engine.set_rule(Timeframe::H1, IndicatorName::Rsi, true, dec!(-1));
        assert!(matches!(result, Err(ControlError::InvalidNumber { .. })));
        assert_eq!(engine.rule(Timeframe::H1, IndicatorName::Rsi), Some(AlertRule::default()));
    }

    #[test]
    fn test_add_price_alert() {
        let (engine, mut sub) = engine();
        engine.add_price_alert(dec!(65000)).unwrap();

        assert_eq!(engine.price_targets(), vec![dec!(65000)]);
        let messages = drain(&mut sub);
        assert_eq!(messages[0]["type"], "price_alert_added");
        assert_eq!(messages[0]["price"], "65000.00");
    }

    #[test]
    fn test_add_price_alert_rejects_non_positive() {
        let (engine, mut sub) = engine();
        assert_eq!(
            engine.add_price_alert(dec!(0)),
            Err(ControlError::NonPositivePrice(dec!(0)))
        );
        assert!(engine.add_price_alert(dec!(-5)).is_err());
        assert!(engine.price_targets().is_empty());
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn test_price_alert_removes_one_per_call() {
        let (engine, mut sub) = engine();
        engine.add_price_alert(dec!(100)).unwrap();
        engine.add_price_alert(dec!(100)).unwrap();
        drain(&mut sub);

        assert_eq!(engine.check_price_alerts(dec!(100)), Some(dec!(100)));
        assert_eq!(engine.price_targets().len(), 1);

        assert_eq!(engine.check_price_alerts(dec!(100)), Some(dec!(100)));
        assert!(engine.price_targets().is_empty());

        assert_eq!(engine.check_price_alerts(dec!(100)), None);

        // same key both times, so only one alert went out
        let messages = drain(&mut sub);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["message"], "Price reached 100.00");
    }

    #[test]
    fn test_price_alert_half_cent_matches_announcement() {
        let (engine, mut sub) = engine();
        engine.add_price_alert(dec!(100.005)).unwrap();
        assert_eq!(engine.check_price_alerts(dec!(100)), Some(dec!(100.005)));
        assert!(engine.has_fired(&AlertKey::price_target(dec!(100.01))));

        let messages = drain(&mut sub);
        assert_eq!(messages[0]["price"], "100.01");
        assert_eq!(messages[1]["message"], "Price reached 100.01");
    }

    #[test]
    fn test_price_alert_tolerance_and_order() {
        let (engine, _sub) = engine();
        engine.add_price_alert(dec!(50000)).unwrap();
        engine.add_price_alert(dec!(60030)).unwrap();
        engine.add_price_alert(dec!(59990)).unwrap();

        // 60030 is 0.05% away, 59990 too, but only the first in order goes
        assert_eq!(engine.check_price_alerts(dec!(60000)), Some(dec!(60030)));
        assert_eq!(engine.price_targets(), vec![dec!(50000), dec!(59990)]);

        // 0.1% of 60000 is 60; 60061 is out of range
        engine.add_price_alert(dec!(60061)).unwrap();
        assert_eq!(engine.check_price_alerts(dec!(60000)), Some(dec!(59990)));
        assert_eq!(engine.check_price_alerts(dec!(60000)), None);
        assert_eq!(engine.price_targets(), vec![dec!(50000), dec!(60061)]);
    }

    #[test]
    fn test_trigger_direct() {
        let (engine, mut sub) = engine();
        let key = AlertKey::Indicator {
            timeframe: Timeframe::H1,
            indicator: IndicatorName::Rsi,
        };

        assert!(engine.trigger(key.clone()));
        assert!(!engine.trigger(key));
        assert_eq!(drain(&mut sub).len(), 1);
    }
}
