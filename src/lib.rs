// Core modules
pub mod alerts;
pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod hub;
pub mod indicators;
pub mod market;
pub mod models;
pub mod risk;
pub mod scheduler;

// Re-export commonly used types
pub use alerts::{AlertEngine, AlertKey, AlertRule};
pub use control::ControlPlane;
pub use error::{ControlError, Error, FeedError};
pub use hub::{Hub, SubscriberServer};
pub use market::{CandleStore, ConnectionStatus, FeedConnector, MarketState};
pub use models::*;
pub use risk::PositionCalculator;
pub use scheduler::EvaluationCycle;

// Error handling
pub type Result<T> = std::result::Result<T, Error>;
