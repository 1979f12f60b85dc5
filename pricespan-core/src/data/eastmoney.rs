//! Eastmoney quote API: daily kline history and the spot symbol list.
//!
//! History is served by the `push2his` kline endpoint. The instrument is
//! addressed as `secid={market_id}.{code}` where the market id comes from the
//! listing exchange (`1` Shanghai, `0` Shenzhen/Beijing, `116` Hong Kong).
//! `fqt=1` requests forward-adjusted closes and `fqt=0` raw closes.
//!
//! The spot list (`clist`) doubles as the secondary symbol directory.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, lenient_f64, transport_error, HttpSettings};
use super::provider::{DataError, DirectorySource, HistoryProvider};
use crate::domain::{
    DateRange, Exchange, InstrumentClass, Market, PriceAdjust, PricePoint, PriceSeries,
    QueryVariant, SymbolRecord, Venue,
};

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const CLIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClistResponse {
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    diff: Vec<ClistRow>,
}

#[derive(Debug, Deserialize)]
struct ClistRow {
    #[serde(rename = "f12")]
    code: String,
    #[serde(rename = "f14", default)]
    name: String,
    #[serde(rename = "f2", deserialize_with = "lenient_f64", default)]
    price: Option<f64>,
}

fn market_id(exchange: Exchange) -> u16 {
    match exchange {
        Exchange::Shanghai => 1,
        Exchange::Shenzhen | Exchange::Beijing => 0,
        Exchange::HongKong => 116,
    }
}

fn fqt(adjust: PriceAdjust) -> u8 {
    match adjust {
        PriceAdjust::Forward => 1,
        PriceAdjust::Unadjusted => 0,
    }
}

/// `fs` filter selecting every listing board of a market.
fn board_filter(market: Market) -> &'static str {
    match market {
        Market::AShare => "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048",
        Market::HShare => "m:128+t:3,m:128+t:4,m:128+t:1,m:128+t:2",
    }
}

/// Eastmoney HTTP client.
pub struct EastmoneyClient {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl EastmoneyClient {
    /// Client sharing `circuit_breaker` with every other Eastmoney client.
    pub fn new(
        settings: &HttpSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client(settings)?,
            circuit_breaker,
        })
    }

    /// Remote instrument id for a code under a variant.
    fn secid(code: &str, variant: QueryVariant) -> Result<String, DataError> {
        let class = InstrumentClass::classify(code).ok_or_else(|| DataError::SymbolNotFound {
            code: code.to_string(),
        })?;
        let expected = match class {
            InstrumentClass::AShare => Venue::Domestic,
            InstrumentClass::HShare => Venue::CrossBorder,
        };
        if variant.venue != expected {
            return Err(DataError::UnsupportedVariant {
                provider: "eastmoney".into(),
                variant,
            });
        }
        Ok(format!("{}.{code}", market_id(Exchange::of(code, class))))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(transport_error)?;
        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
            }
            return Err(DataError::HttpStatus {
                provider: "eastmoney".into(),
                status: status.as_u16(),
            });
        }

        let body = resp.json::<T>().map_err(|e| {
            DataError::ResponseFormatChanged(format!("eastmoney response did not parse: {e}"))
        })?;
        self.circuit_breaker.record_success();
        Ok(body)
    }

    fn list_page(&self, market: Market, page: usize) -> Result<ClistData, DataError> {
        let query = [
            ("pn", page.to_string()),
            ("pz", PAGE_SIZE.to_string()),
            ("po", "1".into()),
            ("np", "1".into()),
            ("fltt", "2".into()),
            ("invt", "2".into()),
            ("fid", "f12".into()),
            ("fs", board_filter(market).into()),
            ("fields", "f2,f12,f14".into()),
        ];
        let resp: ClistResponse = self.get_json(CLIST_URL, &query)?;
        Ok(resp.data.unwrap_or(ClistData {
            total: 0,
            diff: Vec::new(),
        }))
    }
}

/// Parse kline rows (`"2024-01-02,7.16"`), keeping rows inside `range`.
fn parse_klines(
    code: &str,
    variant: QueryVariant,
    range: &DateRange,
    klines: &[String],
) -> Result<PriceSeries, DataError> {
    let mut points = Vec::with_capacity(klines.len());
    for line in klines {
        let mut fields = line.split(',');
        let (Some(date), Some(close)) = (fields.next(), fields.next()) else {
            return Err(DataError::ResponseFormatChanged(format!(
                "kline row for {code} has too few fields: {line}"
            )));
        };
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
            DataError::ResponseFormatChanged(format!("kline date '{date}' for {code}: {e}"))
        })?;
        let close = close.trim().parse::<f64>().map_err(|e| {
            DataError::ResponseFormatChanged(format!("kline close '{close}' for {code}: {e}"))
        })?;
        if range.contains(date) {
            points.push(PricePoint { date, close });
        }
    }
    Ok(PriceSeries::new(code, variant, points))
}

fn normalize_rows(market: Market, rows: Vec<ClistRow>) -> Vec<SymbolRecord> {
    rows.into_iter()
        .filter_map(
            |row| match SymbolRecord::normalize(&row.code, &row.name, row.price, market) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    log::debug!("eastmoney: skipping directory row: {e}");
                    None
                }
            },
        )
        .collect()
}

impl HistoryProvider for EastmoneyClient {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn query_history(
        &self,
        code: &str,
        variant: QueryVariant,
        range: &DateRange,
    ) -> Result<PriceSeries, DataError> {
        let query = [
            ("secid", Self::secid(code, variant)?),
            ("fields1", "f1,f2,f3".into()),
            ("fields2", "f51,f53".into()),
            ("klt", "101".into()),
            ("fqt", fqt(variant.adjust).to_string()),
            ("beg", range.start_param()),
            ("end", range.end_param()),
        ];
        let resp: KlineResponse = self.get_json(KLINE_URL, &query)?;
        let data = resp.data.ok_or_else(|| DataError::SymbolNotFound {
            code: code.to_string(),
        })?;
        parse_klines(code, variant, range, &data.klines)
    }
}

impl DirectorySource for EastmoneyClient {
    fn name(&self) -> &str {
        "eastmoney"
    }

    fn list_symbols(&self, market: Market) -> Result<Vec<SymbolRecord>, DataError> {
        let mut rows = Vec::new();
        let mut page = 1;
        loop {
            let data = self.list_page(market, page)?;
            let fetched = data.diff.len();
            rows.extend(data.diff);
            if fetched == 0 || rows.len() >= data.total {
                break;
            }
            page += 1;
        }
        log::debug!("eastmoney: {} raw {market} rows over {page} pages", rows.len());
        Ok(normalize_rows(market, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    #[test]
    fn secid_by_exchange() {
        let v = QueryVariant::DOMESTIC_FORWARD;
        assert_eq!(EastmoneyClient::secid("600000", v).unwrap(), "1.600000");
        assert_eq!(EastmoneyClient::secid("000001", v).unwrap(), "0.000001");
        assert_eq!(EastmoneyClient::secid("430047", v).unwrap(), "0.430047");
        assert_eq!(
            EastmoneyClient::secid("00700", QueryVariant::CROSS_BORDER_UNADJUSTED).unwrap(),
            "116.00700"
        );
    }

    #[test]
    fn secid_rejects_venue_mismatch() {
        let err = EastmoneyClient::secid("00700", QueryVariant::DOMESTIC_FORWARD).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedVariant { .. }));
    }

    #[test]
    fn parses_kline_payload() {
        let body = r#"{"rc":0,"data":{"code":"600000","market":1,"klines":[
            "2023-12-29,6.50","2024-01-02,7.16","2024-01-03,7.20"]}}"#;
        let resp: KlineResponse = serde_json::from_str(body).unwrap();
        let series = parse_klines(
            "600000",
            QueryVariant::DOMESTIC_FORWARD,
            &range(),
            &resp.data.unwrap().klines,
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes().collect::<Vec<_>>(), vec![7.16, 7.20]);
    }

    #[test]
    fn null_data_means_unknown_symbol() {
        let resp: KlineResponse = serde_json::from_str(r#"{"rc":0,"data":null}"#).unwrap();
        assert!(resp.data.is_none());
    }

    #[test]
    fn malformed_kline_row() {
        let rows = vec!["2024-01-02".to_string()];
        let err = parse_klines("600000", QueryVariant::DOMESTIC_FORWARD, &range(), &rows);
        assert!(matches!(err, Err(DataError::ResponseFormatChanged(_))));
    }

    #[test]
    fn clist_rows_normalized() {
        let body = r#"{"rc":0,"data":{"total":3,"diff":[
            {"f2":10.15,"f12":"600000","f14":"浦发银行"},
            {"f2":"-","f12":"000001","f14":"平安银行"},
            {"f2":1.0,"f12":"BAD","f14":"junk"}]}}"#;
        let resp: ClistResponse = serde_json::from_str(body).unwrap();
        let recs = normalize_rows(Market::AShare, resp.data.unwrap().diff);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].last_price, Some(10.15));
        assert_eq!(recs[1].code, "000001");
        assert_eq!(recs[1].last_price, None);
    }
}
