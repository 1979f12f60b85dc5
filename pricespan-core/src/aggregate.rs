//! Period extrema over a fetched close series.

use thiserror::Error;

use crate::domain::PriceSeries;

/// Highest and lowest close observed over the batch's date range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub max_close: f64,
    pub min_close: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// The fetch succeeded but returned nothing usable.
    #[error("series for '{code}' has no usable closes")]
    EmptySeries { code: String },
}

/// Reduce a series to its maximum and minimum close.
///
/// Non-finite closes are skipped; a series with none left fails with
/// [`AggregateError::EmptySeries`].
pub fn aggregate(series: &PriceSeries) -> Result<Extrema, AggregateError> {
    series
        .closes()
        .filter(|c| c.is_finite())
        .fold(None, |acc: Option<Extrema>, close| {
            Some(match acc {
                None => Extrema {
                    max_close: close,
                    min_close: close,
                },
                Some(e) => Extrema {
                    max_close: e.max_close.max(close),
                    min_close: e.min_close.min(close),
                },
            })
        })
        .ok_or_else(|| AggregateError::EmptySeries {
            code: series.code.clone(),
        })
}
