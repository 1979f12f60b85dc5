//! Symbols: canonical codes, instrument classes and the directory record.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Market segment scanned as one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// Mainland exchanges (Shanghai, Shenzhen, Beijing).
    AShare,
    /// Hong Kong main board and GEM.
    HShare,
}

impl Market {
    /// Instrument class every symbol of this market belongs to.
    pub fn instrument_class(self) -> InstrumentClass {
        match self {
            Market::AShare => InstrumentClass::AShare,
            Market::HShare => InstrumentClass::HShare,
        }
    }

    /// Short tag used in file names and log lines.
    pub fn tag(self) -> &'static str {
        match self {
            Market::AShare => "a_share",
            Market::HShare => "h_share",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.tag())
    }
}

/// Security class; decides which remote query variants apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentClass {
    AShare,
    HShare,
}

impl InstrumentClass {
    /// Classify a canonical code by its format: six digits are mainland
    /// listings, five digits are Hong Kong listings.
    pub fn classify(code: &str) -> Option<Self> {
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match code.len() {
            6 => Some(InstrumentClass::AShare),
            5 => Some(InstrumentClass::HShare),
            _ => None,
        }
    }
}

/// Listing venue, derived from the canonical code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
    HongKong,
}

impl Exchange {
    /// Listing exchange implied by a canonical code's prefix.
    pub fn of(code: &str, class: InstrumentClass) -> Self {
        match class {
            InstrumentClass::HShare => Exchange::HongKong,
            InstrumentClass::AShare => {
                if code.starts_with("92") || code.starts_with('4') || code.starts_with('8') {
                    Exchange::Beijing
                } else if code.starts_with('6') || code.starts_with('9') || code.starts_with('5') {
                    Exchange::Shanghai
                } else {
                    Exchange::Shenzhen
                }
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("no digits in symbol '{0}'")]
    NoDigits(String),

    #[error("'{raw}' normalizes to '{code}', which matches no instrument class")]
    UnknownClass { raw: String, code: String },

    #[error("'{code}' is a {actual:?} code, expected {expected:?}")]
    WrongMarket {
        code: String,
        expected: InstrumentClass,
        actual: InstrumentClass,
    },
}

/// Reduce a provider symbol (`sh600000`, `600000.SH`, `hk00700`, `00700.HK`)
/// to its digit run.
pub fn canonical_code(raw: &str) -> Result<String, SymbolError> {
    let code: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if code.is_empty() {
        return Err(SymbolError::NoDigits(raw.to_string()));
    }
    Ok(code)
}

/// One tradable instrument as handed to the dispatch engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub code: String,
    pub display_name: String,
    /// Latest quote; `None` for suspended symbols.
    pub last_price: Option<f64>,
    pub instrument_class: InstrumentClass,
}

impl SymbolRecord {
    /// Build a record from raw directory fields, normalizing the code and
    /// checking it belongs to `market`.
    pub fn normalize(
        raw_code: &str,
        display_name: &str,
        last_price: Option<f64>,
        market: Market,
    ) -> Result<Self, SymbolError> {
        let code = canonical_code(raw_code)?;
        let class = InstrumentClass::classify(&code).ok_or_else(|| SymbolError::UnknownClass {
            raw: raw_code.to_string(),
            code: code.clone(),
        })?;
        let expected = market.instrument_class();
        if class != expected {
            return Err(SymbolError::WrongMarket {
                code,
                expected,
                actual: class,
            });
        }
        Ok(Self {
            code,
            display_name: display_name.trim().to_string(),
            last_price: last_price.filter(|p| p.is_finite() && *p > 0.0),
            instrument_class: class,
        })
    }

    /// Listing exchange of this symbol.
    pub fn exchange(&self) -> Exchange {
        Exchange::of(&self.code, self.instrument_class)
    }
}
