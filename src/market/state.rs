use rust_decimal::Decimal;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Exchange connection lifecycle
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. A failed
/// connect goes straight from `Connecting` back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Connected => f.write_str("connected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketSnapshot {
    pub current_price: Decimal,
    pub connection_status: ConnectionStatus,
}

/// Shared handle to the latest price and connection status
///
/// Written only by the feed task; everything else reads copies.
#[derive(Clone, Default)]
pub struct MarketState {
    inner: Arc<RwLock<MarketSnapshot>>,
}

impl MarketState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_price(&self) -> Decimal {
        self.snapshot().current_price
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.snapshot().connection_status
    }

    pub(crate) fn set_price(&self, price: Decimal) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .current_price = price;
    }

    /// Returns the previous status
    pub(crate) fn set_status(&self, status: ConnectionStatus) -> ConnectionStatus {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut guard.connection_status, status)
    }
}
