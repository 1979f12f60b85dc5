//! Directory with a primary and a secondary source.

use super::provider::{DataError, DirectorySource};
use crate::domain::{Market, SymbolRecord};

/// Tries `primary`, and on any error falls back to `secondary`.
///
/// Only when both fail does listing fail, with
/// [`DataError::DirectoryExhausted`] carrying both causes. An empty list
/// from the primary is a valid answer and is returned as is.
pub struct FallbackDirectory {
    primary: Box<dyn DirectorySource>,
    secondary: Box<dyn DirectorySource>,
}

impl FallbackDirectory {
    /// Directory asking `primary` first and `secondary` only on error.
    pub fn new(primary: Box<dyn DirectorySource>, secondary: Box<dyn DirectorySource>) -> Self {
        Self { primary, secondary }
    }
}

impl DirectorySource for FallbackDirectory {
    fn name(&self) -> &str {
        "fallback"
    }

    fn list_symbols(&self, market: Market) -> Result<Vec<SymbolRecord>, DataError> {
        let primary_err = match self.primary.list_symbols(market) {
            Ok(symbols) => {
                log::info!(
                    "{}: listed {} {market} symbols",
                    self.primary.name(),
                    symbols.len()
                );
                return Ok(symbols);
            }
            Err(e) => e,
        };

        log::warn!(
            "{} directory failed for {market}: {primary_err}; trying {}",
            self.primary.name(),
            self.secondary.name()
        );

        match self.secondary.list_symbols(market) {
            Ok(symbols) => {
                log::info!(
                    "{}: listed {} {market} symbols",
                    self.secondary.name(),
                    symbols.len()
                );
                Ok(symbols)
            }
            Err(secondary_err) => Err(DataError::DirectoryExhausted {
                market,
                primary: primary_err.to_string(),
                secondary: secondary_err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentClass;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: Result<Vec<SymbolRecord>, DataError>,
        calls: Arc<AtomicUsize>,
    }

    impl DirectorySource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn list_symbols(&self, _market: Market) -> Result<Vec<SymbolRecord>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn rec(code: &str) -> SymbolRecord {
        SymbolRecord {
            code: code.into(),
            display_name: code.into(),
            last_price: Some(1.0),
            instrument_class: InstrumentClass::AShare,
        }
    }

    fn fixed(
        name: &'static str,
        result: Result<Vec<SymbolRecord>, DataError>,
    ) -> (Box<dyn DirectorySource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let src = Fixed {
            name,
            result,
            calls: Arc::clone(&calls),
        };
        (Box::new(src), calls)
    }

    #[test]
    fn primary_success_skips_secondary() {
        let (p, _) = fixed("p", Ok(vec![rec("600000")]));
        let (s, s_calls) = fixed("s", Ok(vec![rec("000001")]));
        let dir = FallbackDirectory::new(p, s);
        let out = dir.list_symbols(Market::AShare).unwrap();
        assert_eq!(out[0].code, "600000");
        assert_eq!(s_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn primary_failure_uses_secondary() {
        let (p, _) = fixed("p", Err(DataError::NetworkUnreachable("down".into())));
        let (s, s_calls) = fixed("s", Ok(vec![rec("000001")]));
        let dir = FallbackDirectory::new(p, s);
        let out = dir.list_symbols(Market::AShare).unwrap();
        assert_eq!(out[0].code, "000001");
        assert_eq!(s_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn both_failing_is_exhausted() {
        let (p, _) = fixed("p", Err(DataError::NetworkUnreachable("down".into())));
        let (s, _) = fixed("s", Err(DataError::Timeout("slow".into())));
        let dir = FallbackDirectory::new(p, s);
        let err = dir.list_symbols(Market::AShare).unwrap_err();
        assert!(matches!(err, DataError::DirectoryExhausted { .. }));
        let msg = err.to_string();
        assert!(msg.contains("down") && msg.contains("slow"));
    }

    #[test]
    fn empty_primary_is_not_a_failure() {
        let (p, _) = fixed("p", Ok(Vec::new()));
        let (s, s_calls) = fixed("s", Ok(vec![rec("000001")]));
        let dir = FallbackDirectory::new(p, s);
        assert!(dir.list_symbols(Market::AShare).unwrap().is_empty());
        assert_eq!(s_calls.load(Ordering::SeqCst), 0);
    }
}
