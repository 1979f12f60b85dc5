//! Date ranges, query variants and fetched daily close series.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::symbol::InstrumentClass;

/// Default trailing window: two calendar years.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 730;

/// Longest trailing window a scan accepts: one hundred years.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Inclusive calendar range shared by every fetch in one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `[end - lookback_days, end]`. A start before the earliest
    /// representable date is clamped to it.
    pub fn trailing(end: NaiveDate, lookback_days: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// Whether `date` falls inside the range, both ends included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Start date in the provider's `YYYYMMDD` form.
    pub fn start_param(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    /// End date in the provider's `YYYYMMDD` form.
    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Which remote endpoint family serves a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Domestic,
    CrossBorder,
}

/// Price adjustment requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceAdjust {
    /// Forward-adjusted for splits and dividends.
    Forward,
    Unadjusted,
}

/// One concrete form of the remote history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryVariant {
    pub venue: Venue,
    pub adjust: PriceAdjust,
}

impl QueryVariant {
    pub const DOMESTIC_FORWARD: QueryVariant = QueryVariant {
        venue: Venue::Domestic,
        adjust: PriceAdjust::Forward,
    };
    pub const DOMESTIC_UNADJUSTED: QueryVariant = QueryVariant {
        venue: Venue::Domestic,
        adjust: PriceAdjust::Unadjusted,
    };
    pub const CROSS_BORDER_FORWARD: QueryVariant = QueryVariant {
        venue: Venue::CrossBorder,
        adjust: PriceAdjust::Forward,
    };
    pub const CROSS_BORDER_UNADJUSTED: QueryVariant = QueryVariant {
        venue: Venue::CrossBorder,
        adjust: PriceAdjust::Unadjusted,
    };

    /// Ordered fallback chain for a class: preferred variant first.
    pub fn chain(class: InstrumentClass) -> &'static [QueryVariant] {
        match class {
            InstrumentClass::AShare => &[Self::DOMESTIC_FORWARD, Self::DOMESTIC_UNADJUSTED],
            InstrumentClass::HShare => {
                &[Self::CROSS_BORDER_FORWARD, Self::CROSS_BORDER_UNADJUSTED]
            }
        }
    }
}

impl fmt::Display for QueryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let venue = match self.venue {
            Venue::Domestic => "domestic",
            Venue::CrossBorder => "cross_border",
        };
        let adjust = match self.adjust {
            PriceAdjust::Forward => "forward",
            PriceAdjust::Unadjusted => "unadjusted",
        };
        write!(f, "{venue}/{adjust}")
    }
}

/// Daily close for one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub code: String,
    pub variant: QueryVariant,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting `points` by date.
    pub fn new(code: impl Into<String>, variant: QueryVariant, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            code: code.into(),
            variant,
            points,
        }
    }

    /// Number of daily points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn trailing_range_spans_lookback() {
        let r = DateRange::trailing(d(2024, 12, 31), DEFAULT_LOOKBACK_DAYS);
        assert_eq!(r.start, d(2023, 1, 1));
        assert_eq!(r.end, d(2024, 12, 31));
        assert_eq!(r.start_param(), "20230101");
        assert_eq!(r.end_param(), "20241231");
        assert!(r.contains(d(2024, 6, 1)));
        assert!(!r.contains(d(2025, 1, 1)));
    }

    #[test]
    fn oversized_lookback_clamps_instead_of_overflowing() {
        let r = DateRange::trailing(d(2024, 12, 31), 200_000_000);
        assert_eq!(r.start, NaiveDate::MIN);
        assert_eq!(r.end, d(2024, 12, 31));

        let r = DateRange::trailing(d(2024, 12, 31), u32::MAX);
        assert_eq!(r.start, NaiveDate::MIN);
    }

    #[test]
    fn max_lookback_stays_representable() {
        let r = DateRange::trailing(d(2024, 12, 31), MAX_LOOKBACK_DAYS);
        assert!(r.start > NaiveDate::MIN);
        assert!(r.start < d(1926, 1, 1));
    }

    #[test]
    fn chain_prefers_forward_adjusted() {
        let a = QueryVariant::chain(InstrumentClass::AShare);
        assert_eq!(a[0], QueryVariant::DOMESTIC_FORWARD);
        assert_eq!(a[1], QueryVariant::DOMESTIC_UNADJUSTED);

        let h = QueryVariant::chain(InstrumentClass::HShare);
        assert!(h.iter().all(|v| v.venue == Venue::CrossBorder));
    }

    #[test]
    fn series_sorted_by_date() {
        let s = PriceSeries::new(
            "600000",
            QueryVariant::DOMESTIC_FORWARD,
            vec![
                PricePoint { date: d(2024, 1, 3), close: 2.0 },
                PricePoint { date: d(2024, 1, 2), close: 1.0 },
            ],
        );
        assert_eq!(s.closes().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }
}
