// =============================================================================
// Upstream Adapter — HTTP client for calendar / symbol-v2 / ping / time /
// signed order endpoints
// =============================================================================
//
// SECURITY: the secret key is never logged or serialized. Signed requests
// carry the API key in the `X-MEXC-APIKEY` header, never in the query string.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use crate::cache::{Cache, CacheClass};
use crate::error::{Error, Result};
use crate::exchange::rate_limit::RateLimiter;
use crate::types::{CalendarEntry, SymbolRecord};

type HmacSha256 = Hmac<Sha256>;

/// Retries allowed per request on transport error, on top of the first
/// attempt — 3 retries means 4 total attempts before giving up.
const RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// The outcome of a signed market-buy order submission.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub raw: serde_json::Value,
}

/// Upstream REST client with HMAC-SHA256 request signing and a TTL cache
/// consulted ahead of every read.
pub struct ExchangeClient {
    api_key: Option<String>,
    secret: Option<String>,
    base_url: String,
    calendar_endpoint: String,
    symbols_v2_endpoint: String,
    order_endpoint: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    cache: Arc<Cache>,
}

impl ExchangeClient {
    pub fn new(cfg: &crate::config::Config, cache: Arc<Cache>, api_key: Option<String>, secret: Option<String>) -> Self {
        let mut default_headers = HeaderMap::new();
        if let Some(key) = &api_key {
            if let Ok(val) = HeaderValue::from_str(key) {
                default_headers.insert("X-MEXC-APIKEY", val);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_key,
            secret,
            base_url: cfg.mexc_base_url.clone(),
            calendar_endpoint: cfg.mexc_calendar_endpoint.clone(),
            symbols_v2_endpoint: cfg.mexc_symbols_v2_endpoint.clone(),
            order_endpoint: cfg.mexc_order_endpoint.clone(),
            client,
            rate_limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            cache,
        }
    }

    // -------------------------------------------------------------------------
    // Signing
    // -------------------------------------------------------------------------

    fn canonical_query(params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        sorted
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn sign(&self, secret: &str, canonical: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as i64
    }

    /// Build a signed query string: canonical key-sorted params plus a
    /// millisecond timestamp, with the signature appended last.
    fn signed_query(&self, mut params: Vec<(&str, String)>) -> Result<String> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| Error::ConfigMissing("MEXC_SECRET_KEY not configured".into()))?;

        params.push(("timestamp", Self::timestamp_ms().to_string()));
        let canonical = Self::canonical_query(&params);
        let signature = self.sign(secret, &canonical);
        Ok(format!("{canonical}&signature={signature}"))
    }

    // -------------------------------------------------------------------------
    // Low-level request execution: rate limit, retry, error mapping
    // -------------------------------------------------------------------------

    async fn execute(&self, method: reqwest::Method, url: &str) -> Result<serde_json::Value> {
        for attempt in 0..=RETRIES {
            self.rate_limiter.wait().await;

            match self.client.request(method.clone(), url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::UpstreamHttp {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| Error::UpstreamDecode(e.to_string()));
                }
                Err(e) => {
                    if attempt == RETRIES {
                        return Err(Error::UpstreamNetwork(e.to_string()));
                    }
                    let backoff = Duration::from_secs_f64(0.5 * 2f64.powi(attempt as i32));
                    warn!(attempt, error = %e, "transport error, retrying after backoff");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    // -------------------------------------------------------------------------
    // Calendar
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_calendar")]
    pub async fn get_calendar(&self) -> Result<Vec<CalendarEntry>> {
        let cache_key = "calendar";

        if let Some(raw) = self.cache.get::<Vec<serde_json::Value>>(cache_key).await {
            return Ok(parse_calendar_entries(&raw));
        }

        let url = format!("{}{}", self.base_url, self.calendar_endpoint);
        let body = self.execute(reqwest::Method::GET, &url).await?;

        let raw = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        self.cache.set(cache_key, &raw, CacheClass::Calendar).await;

        let entries = parse_calendar_entries(&raw);
        debug!(count = entries.len(), "calendar fetched");
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Symbols
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_symbols")]
    pub async fn get_symbols(&self, vcoin_id: Option<&str>) -> Result<Vec<SymbolRecord>> {
        let cache_key = format!("symbols:{}", vcoin_id.unwrap_or("all"));

        if let Some(raw) = self.cache.get::<Vec<serde_json::Value>>(&cache_key).await {
            return Ok(filter_symbols(parse_symbol_records(&raw), vcoin_id));
        }

        let url = format!("{}{}", self.base_url, self.symbols_v2_endpoint);
        let body = self.execute(reqwest::Method::GET, &url).await?;

        let raw = body
            .get("data")
            .and_then(|v| v.get("symbols"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        self.cache.set(&cache_key, &raw, CacheClass::Symbols).await;

        let records = filter_symbols(parse_symbol_records(&raw), vcoin_id);
        debug!(count = records.len(), "symbols fetched");
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Signed endpoints
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::place_market_buy")]
    pub async fn place_market_buy(&self, symbol: &str, quote_qty: f64) -> Result<OrderResponse> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", "BUY".to_string()),
            ("type", "MARKET".to_string()),
            ("quoteOrderQty", format!("{quote_qty:.8}")),
        ];
        let qs = self.signed_query(params)?;
        let url = format!("{}{}?{}", self.base_url, self.order_endpoint, qs);

        debug!(symbol, quote_qty, "placing market buy order");

        let body = self.execute(reqwest::Method::POST, &url).await?;
        Ok(OrderResponse { raw: body })
    }

    #[instrument(skip(self), name = "exchange::account_info")]
    pub async fn account_info(&self) -> Result<serde_json::Value> {
        let cache_key = "account";
        if let Some(raw) = self.cache.get::<serde_json::Value>(cache_key).await {
            return Ok(raw);
        }

        let qs = self.signed_query(vec![])?;
        let url = format!("{}/api/v3/account?{}", self.base_url, qs);
        let body = self.execute(reqwest::Method::GET, &url).await?;

        self.cache.set(cache_key, &body, CacheClass::Account).await;
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Connectivity
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::ping")]
    pub async fn ping(&self) -> bool {
        let url = format!("{}/api/v3/ping", self.base_url);
        self.execute(reqwest::Method::GET, &url).await.is_ok()
    }

    /// Server time in epoch milliseconds. Falls back to the local clock if
    /// the upstream call fails for any reason.
    #[instrument(skip(self), name = "exchange::server_time")]
    pub async fn server_time(&self) -> i64 {
        let cache_key = "server_time";
        if let Some(cached) = self.cache.get::<i64>(cache_key).await {
            return cached;
        }

        let url = format!("{}/api/v3/time", self.base_url);
        match self.execute(reqwest::Method::GET, &url).await {
            Ok(body) => {
                let server_time = body.get("serverTime").and_then(|v| v.as_i64());
                match server_time {
                    Some(t) => {
                        self.cache.set(cache_key, &t, CacheClass::ServerTime).await;
                        t
                    }
                    None => Self::timestamp_ms(),
                }
            }
            Err(e) => {
                warn!(error = %e, "server_time request failed — falling back to local clock");
                Self::timestamp_ms()
            }
        }
    }
}

fn parse_calendar_entries(raw: &[serde_json::Value]) -> Vec<CalendarEntry> {
    raw.iter()
        .filter_map(|v| {
            let vcoin_id = v.get("vcoinId")?.as_str()?.to_string();
            let symbol = v.get("symbol")?.as_str().unwrap_or_default().to_string();
            let project_name = v.get("projectName")?.as_str().unwrap_or_default().to_string();
            let first_open_time_ms = v.get("firstOpenTime")?.as_i64()?;
            Some(CalendarEntry {
                vcoin_id,
                symbol,
                project_name,
                first_open_time_ms,
            })
        })
        .collect()
}

fn parse_symbol_records(raw: &[serde_json::Value]) -> Vec<SymbolRecord> {
    raw.iter()
        .filter_map(|v| serde_json::from_value::<SymbolRecord>(v.clone()).ok())
        .collect()
}

fn filter_symbols(records: Vec<SymbolRecord>, vcoin_id: Option<&str>) -> Vec<SymbolRecord> {
    match vcoin_id {
        Some(id) => records.into_iter().filter(|r| r.vcoin_id == id).collect(),
        None => records,
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_query_sorts_by_key() {
        let params = vec![
            ("side", "BUY".to_string()),
            ("symbol", "AUSDT".to_string()),
            ("type", "MARKET".to_string()),
        ];
        let canonical = ExchangeClient::canonical_query(&params);
        assert_eq!(canonical, "side=BUY&symbol=AUSDT&type=MARKET");
    }

    #[test]
    fn parse_calendar_drops_invalid_entries() {
        let raw = vec![
            serde_json::json!({"vcoinId": "A", "symbol": "AUSDT", "projectName": "Alpha", "firstOpenTime": 1000}),
            serde_json::json!({"symbol": "missing-vcoin"}),
        ];
        let entries = parse_calendar_entries(&raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].vcoin_id, "A");
    }

    #[test]
    fn filter_symbols_by_vcoin_id() {
        let records = vec![
            SymbolRecord {
                vcoin_id: "A".into(),
                contract: None,
                price_scale: None,
                qty_scale: None,
                open_time_ms: None,
                sts: 1,
                st: 1,
                tt: 1,
            },
            SymbolRecord {
                vcoin_id: "B".into(),
                contract: None,
                price_scale: None,
                qty_scale: None,
                open_time_ms: None,
                sts: 1,
                st: 1,
                tt: 1,
            },
        ];
        let filtered = filter_symbols(records, Some("A"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].vcoin_id, "A");
    }
}
