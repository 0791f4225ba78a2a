// Periodic evaluation: indicators -> alerts -> SL/TP, every interval
use crate::alerts::{AlertEngine, AlertKey};
use crate::hub::Hub;
use crate::indicators::IndicatorProvider;
use crate::market::{CandleStore, MarketState};
use crate::models::{IndicatorValues, OutboundMessage, Timeframe};
use crate::risk::PositionCalculator;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// What one cycle produced
#[derive(Debug, Default)]
pub struct CycleReport {
    pub indicators: BTreeMap<Timeframe, IndicatorValues>,
    pub alerts: Vec<AlertKey>,
    pub price_alert: Option<Decimal>,
    pub levels: Option<(Decimal, Decimal)>,
}

pub struct EvaluationCycle {
    candles: CandleStore,
    market: MarketState,
    provider: Arc<dyn IndicatorProvider>,
    alerts: Arc<AlertEngine>,
    position: Arc<PositionCalculator>,
    hub: Hub,
    period: Duration,
}

impl EvaluationCycle {
    pub fn new(
        candles: CandleStore,
        market: MarketState,
        provider: Arc<dyn IndicatorProvider>,
        alerts: Arc<AlertEngine>,
        position: Arc<PositionCalculator>,
        hub: Hub,
        period: Duration,
    ) -> Self {
        Self {
            candles,
            market,
            provider,
            alerts,
            position,
            hub,
            period,
        }
    }

    /// Tick every `period` until `shutdown` flips. The first cycle runs one
    /// period after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Evaluation cycle started, every {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once();
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("Evaluation cycle stopped");
    }

    /// One pass: broadcast indicators, fire indicator alerts, match at most one
    /// price target, then broadcast SL/TP if an entry is set
    pub fn run_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for tf in Timeframe::ALL {
            let closes = self.candles.closes(tf);
            match self.provider.compute(&closes) {
                Some(values) => {
                    report.indicators.insert(tf, values);
                }
                None => {
                    tracing::debug!(timeframe = %tf, candles = closes.len(), "Not enough history, skipping indicators");
                }
            }
        }

        self.hub.broadcast(&OutboundMessage::IndicatorsUpdate {
            indicators: report.indicators.clone(),
        });

        let price = self.market.current_price();
        if price > Decimal::ZERO {
            report.alerts = self.alerts.evaluate(&report.indicators, price);
            report.price_alert = self.alerts.check_price_alerts(price);
        }

        report.levels = self.position.levels();
        if let Some((sl, tp)) = report.levels {
            self.hub.broadcast(&OutboundMessage::sltp_update(sl, tp));
        }

        report
    }
}
