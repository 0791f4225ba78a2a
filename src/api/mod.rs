pub mod binance;

pub use binance::{parse_agg_trade, parse_kline_row, BinanceClient};
