//! Domain types for pricespan

pub mod row;
pub mod series;
pub mod symbol;

pub use row::AggregateRow;
pub use series::{
    DateRange, PriceAdjust, PricePoint, PriceSeries, QueryVariant, Venue, DEFAULT_LOOKBACK_DAYS,
    MAX_LOOKBACK_DAYS,
};
pub use symbol::{
    canonical_code, Exchange, InstrumentClass, Market, SymbolError, SymbolRecord,
};
