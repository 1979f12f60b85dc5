//! Sina Market Center symbol directory (primary source).
//!
//! The node listing is paged; pages are requested until one comes back
//! empty. A-share rows carry an exchange-prefixed `symbol` (`sh600000`)
//! and quote the last price as `trade`; Hong Kong rows carry a bare
//! `symbol` and quote `lasttrade`. Both shapes are normalized here.

use serde::Deserialize;

use super::http::{build_client, lenient_f64, transport_error, HttpSettings};
use super::provider::{DataError, DirectorySource};
use crate::domain::{Market, SymbolRecord};

const BASE_URL: &str = "https://vip.stock.finance.sina.com.cn/quotes_service/api/json_v2.php";
const PAGE_SIZE: usize = 80;
/// Hard stop in case the endpoint keeps repeating its last page.
const MAX_PAGES: usize = 500;

#[derive(Debug, Deserialize)]
struct NodeRow {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    trade: Option<f64>,
    #[serde(deserialize_with = "lenient_f64", default)]
    lasttrade: Option<f64>,
}

impl NodeRow {
    fn into_record(self, market: Market) -> Option<SymbolRecord> {
        let price = self.trade.or(self.lasttrade);
        match SymbolRecord::normalize(&self.symbol, &self.name, price, market) {
            Ok(rec) => Some(rec),
            Err(e) => {
                log::debug!("sina: skipping directory row: {e}");
                None
            }
        }
    }
}

fn endpoint(market: Market) -> (&'static str, &'static str) {
    match market {
        Market::AShare => ("Market_Center.getHQNodeData", "hs_a"),
        Market::HShare => ("Market_Center.getHKStockData", "qbgg_hk"),
    }
}

/// Parse one page body. Sina answers `null` (or `[]`) past the last page.
fn parse_page(body: &str) -> Result<Vec<NodeRow>, DataError> {
    let rows: Option<Vec<NodeRow>> = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("sina node page: {e}")))?;
    Ok(rows.unwrap_or_default())
}

pub struct SinaDirectory {
    client: reqwest::blocking::Client,
}

impl SinaDirectory {
    /// Build a client with its own HTTP connection pool.
    pub fn new(settings: &HttpSettings) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client(settings)?,
        })
    }

    fn fetch_page(&self, market: Market, page: usize) -> Result<Vec<NodeRow>, DataError> {
        let (method, node) = endpoint(market);
        let resp = self
            .client
            .get(format!("{BASE_URL}/{method}"))
            .query(&[
                ("page", page.to_string()),
                ("num", PAGE_SIZE.to_string()),
                ("sort", "symbol".into()),
                ("asc", "1".into()),
                ("node", node.into()),
            ])
            .send()
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                provider: "sina".into(),
                status: status.as_u16(),
            });
        }
        parse_page(&resp.text().map_err(transport_error)?)
    }
}

impl DirectorySource for SinaDirectory {
    fn name(&self) -> &str {
        "sina"
    }

    fn list_symbols(&self, market: Market) -> Result<Vec<SymbolRecord>, DataError> {
        let mut records = Vec::new();
        for page in 1..=MAX_PAGES {
            let rows = self.fetch_page(market, page)?;
            if rows.is_empty() {
                break;
            }
            records.extend(rows.into_iter().filter_map(|r| r.into_record(market)));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_share_page() {
        let body = r#"[
            {"symbol":"sh600000","code":"600000","name":"浦发银行","trade":"10.150"},
            {"symbol":"bj430047","code":"430047","name":"诺思兰德","trade":"0.000"}
        ]"#;
        let recs: Vec<_> = parse_page(body)
            .unwrap()
            .into_iter()
            .filter_map(|r| r.into_record(Market::AShare))
            .collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].code, "600000");
        assert_eq!(recs[0].last_price, Some(10.15));
        assert_eq!(recs[1].last_price, None);
    }

    #[test]
    fn hk_page_uses_lasttrade() {
        let body = r#"[{"symbol":"00700","name":"腾讯控股","lasttrade":"380.200"}]"#;
        let recs: Vec<_> = parse_page(body)
            .unwrap()
            .into_iter()
            .filter_map(|r| r.into_record(Market::HShare))
            .collect();
        assert_eq!(recs[0].code, "00700");
        assert_eq!(recs[0].last_price, Some(380.2));
    }

    #[test]
    fn past_last_page() {
        assert!(parse_page("null").unwrap().is_empty());
        assert!(parse_page("[]").unwrap().is_empty());
        assert!(parse_page("<html>").is_err());
    }
}
