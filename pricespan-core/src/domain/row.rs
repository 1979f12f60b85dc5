//! AggregateRow: one line of the scan report.

use serde::{Deserialize, Serialize};

use super::symbol::SymbolRecord;

/// Period extrema for one symbol, joined with its directory fields.
///
/// Rows are built once per successfully aggregated symbol and never
/// mutated afterwards; `period_max >= period_min` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub code: String,
    pub display_name: String,
    pub last_price: Option<f64>,
    pub period_max: f64,
    pub period_min: f64,
}

impl AggregateRow {
    /// Row for `symbol` with its period extrema.
    pub fn from_symbol(symbol: &SymbolRecord, period_max: f64, period_min: f64) -> Self {
        debug_assert!(period_max >= period_min);
        Self {
            code: symbol.code.clone(),
            display_name: symbol.display_name.clone(),
            last_price: symbol.last_price,
            period_max,
            period_min,
        }
    }

    /// Current price as a percentage of the period high, rounded to 2 decimals.
    pub fn ratio_pct(&self) -> Option<f64> {
        let last = self.last_price?;
        if self.period_max <= 0.0 {
            return None;
        }
        Some((last / self.period_max * 100.0 * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentClass;

    fn symbol(last_price: Option<f64>) -> SymbolRecord {
        SymbolRecord {
            code: "600000".into(),
            display_name: "X".into(),
            last_price,
            instrument_class: InstrumentClass::AShare,
        }
    }

    #[test]
    fn ratio_rounds_to_two_decimals() {
        let row = AggregateRow::from_symbol(&symbol(Some(10.0)), 11.0, 10.0);
        assert_eq!(row.ratio_pct(), Some(90.91));
    }

    #[test]
    fn ratio_absent_without_quote() {
        let row = AggregateRow::from_symbol(&symbol(None), 11.0, 10.0);
        assert_eq!(row.ratio_pct(), None);
    }

    #[test]
    fn ratio_absent_for_non_positive_high() {
        let row = AggregateRow::from_symbol(&symbol(Some(1.0)), 0.0, -1.0);
        assert_eq!(row.ratio_pct(), None);
    }
}
