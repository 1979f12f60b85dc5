//! Provider traits and structured error types.
//!
//! `HistoryProvider` is the network boundary for daily series and
//! `DirectorySource` supplies the symbol universe. Both are object safe so
//! the scan pipeline can run against HTTP clients or scripted mocks.

use thiserror::Error;

use crate::domain::{DateRange, Market, PriceSeries, QueryVariant, SymbolRecord};

/// Structured error types for provider operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {provider}")]
    HttpStatus { provider: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {code}")]
    SymbolNotFound { code: String },

    #[error("variant {variant} not served by {provider}")]
    UnsupportedVariant {
        provider: String,
        variant: QueryVariant,
    },

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{market} directory unavailable: primary failed ({primary}); secondary failed ({secondary})")]
    DirectoryExhausted {
        market: Market,
        primary: String,
        secondary: String,
    },

    #[error("http client setup failed: {0}")]
    ClientSetup(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether another query (another variant or a later attempt) may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DataError::CircuitBreakerTripped | DataError::ClientSetup(_)
        )
    }
}

/// Daily close history for one symbol.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily closes for `code` over `range` using one query variant.
    fn query_history(
        &self,
        code: &str,
        variant: QueryVariant,
        range: &DateRange,
    ) -> Result<PriceSeries, DataError>;
}

/// Universe of tradable symbols for a market.
pub trait DirectorySource: Send + Sync {
    fn name(&self) -> &str;

    /// List every symbol of `market`, already normalized into `SymbolRecord`s.
    fn list_symbols(&self, market: Market) -> Result<Vec<SymbolRecord>, DataError>;
}
