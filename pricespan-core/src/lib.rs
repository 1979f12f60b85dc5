//! pricespan core: symbols, market-data providers, fetch policy, aggregation.
//!
//! - Domain types (symbols, date ranges, close series, report rows)
//! - Provider traits with Eastmoney and Sina HTTP implementations
//! - Directory fallback between a primary and a secondary symbol source
//! - Per-symbol fetcher combining variant fallback with bounded retry
//! - Period extrema aggregation

pub mod aggregate;
pub mod data;
pub mod domain;

pub use aggregate::{aggregate, AggregateError, Extrema};
