// Live market data: exchange connection, price state, candle series
pub mod candle_store;
pub mod feed;
pub mod state;

pub use candle_store::CandleStore;
pub use feed::{FeedConfig, FeedConnector};
pub use state::{ConnectionStatus, MarketSnapshot, MarketState};
