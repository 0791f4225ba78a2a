use super::{CandleStore, ConnectionStatus, MarketState};
use crate::api::{parse_agg_trade, BinanceClient};
use crate::error::FeedError;
use crate::hub::Hub;
use crate::models::{OutboundMessage, Tick, Timeframe};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const STATUS_CONNECTED: &str = "Connected to Binance";
const STATUS_DISCONNECTED: &str = "Disconnected from Binance";

/// Feed connection settings
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub stream_url: String,
    /// Fixed wait between connection attempts; there is no backoff or limit
    pub reconnect_delay: Duration,
    /// Candles requested per timeframe during hydration
    pub history_limit: usize,
}

/// Why one connected session ended
enum SessionEnd {
    Shutdown,
    Lost(Option<FeedError>),
}

/// Owns the exchange connection and keeps market state and candles current
///
/// Lifecycle: `Disconnected -> Connecting -> Connected -> Disconnected`, driven
/// by a single loop. Connection failures are never fatal.
pub struct FeedConnector {
    config: FeedConfig,
    client: BinanceClient,
    market: MarketState,
    candles: CandleStore,
    hub: Hub,
}

impl FeedConnector {
    pub fn new(
        config: FeedConfig,
        client: BinanceClient,
        market: MarketState,
        candles: CandleStore,
        hub: Hub,
    ) -> Self {
        Self {
            config,
            client,
            market,
            candles,
            hub,
        }
    }

    /// Replace each timeframe's series with recent history
    ///
    /// A failed timeframe keeps an empty series and fills from live ticks.
    /// Returns the number of candles loaded per timeframe.
    pub async fn hydrate(&self) -> Vec<(Timeframe, usize)> {
        let mut loaded = Vec::with_capacity(Timeframe::ALL.len());

        for tf in Timeframe::ALL {
            match self.client.fetch_klines(tf, self.config.history_limit).await {
                Ok(history) => {
                    let count = history.len().min(self.candles.max_candles());
                    self.candles.replace(tf, history);
                    tracing::info!(timeframe = %tf, count, "Fetched historical candles");
                    loaded.push((tf, count));
                }
                Err(e) => {
                    tracing::warn!(timeframe = %tf, "Historical fetch failed, starting empty: {}", e);
                    loaded.push((tf, 0));
                }
            }
        }

        loaded
    }

    /// Connect/read/reconnect until `shutdown` flips
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(url = %self.config.stream_url, "Starting exchange feed");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.market.set_status(ConnectionStatus::Connecting);
            let connect = tokio::select! {
                result = connect_async(self.config.stream_url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connect {
                Ok((mut ws_stream, _)) => {
                    self.transition(ConnectionStatus::Connected);
                    tracing::info!("Connected to exchange stream");

                    let end = loop {
                        let next = tokio::select! {
                            next = ws_stream.next() => next,
                            _ = shutdown.changed() => break SessionEnd::Shutdown,
                        };

                        match next {
                            Some(Ok(Message::Text(text))) => self.handle_payload(text.as_str()),
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!("Exchange closed the stream: {:?}", frame);
                                break SessionEnd::Lost(None);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break SessionEnd::Lost(Some(e.into())),
                            None => break SessionEnd::Lost(None),
                        }
                    };

                    self.transition(ConnectionStatus::Disconnected);
                    match end {
                        SessionEnd::Shutdown => {
                            let _ = ws_stream.close(None).await;
                            break;
                        }
                        SessionEnd::Lost(Some(e)) => tracing::error!("Exchange stream error: {}", e),
                        SessionEnd::Lost(None) => tracing::warn!("Exchange stream ended"),
                    }
                }
                Err(e) => {
                    self.market.set_status(ConnectionStatus::Disconnected);
                    tracing::error!("Exchange connection error: {}", FeedError::from(e));
                }
            }

            tracing::debug!("Reconnecting in {:?}", self.config.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.market.set_status(ConnectionStatus::Disconnected);
        tracing::info!("Exchange feed stopped");
    }

    /// Parse and apply one stream payload; malformed payloads are dropped
    pub fn handle_payload(&self, payload: &str) {
        match parse_agg_trade(payload) {
            Ok(tick) => self.process_tick(&tick),
            Err(e) => tracing::warn!("Dropping stream message: {}", e),
        }
    }

    /// Update price, announce it, then fold the tick into every timeframe
    pub fn process_tick(&self, tick: &Tick) {
        self.market.set_price(tick.price);
        self.hub.broadcast(&OutboundMessage::price_update(tick.price));
        self.candles.apply(tick);
    }

    fn transition(&self, status: ConnectionStatus) {
        let previous = self.market.set_status(status);
        if previous == status {
            return;
        }

        tracing::info!(from = %previous, to = %status, "Feed connection state changed");
        let text = match status {
            ConnectionStatus::Connected => STATUS_CONNECTED,
            _ => STATUS_DISCONNECTED,
        };
        self.hub.broadcast(&OutboundMessage::status(text));
    }
}
