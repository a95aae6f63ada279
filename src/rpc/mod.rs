use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ExplorerApiConfig;
use crate::core::TxRecord;
use crate::core::address::decode_erc20_recipient;
use crate::error::FetchError;
use crate::explorer::{CounterpartyProvider, counterparties_from_txs};

const WEI_PER_ETH: f64 = 1e18;

/// Native balance formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub balance: String,
    pub usd_value: String,
}

impl Balance {
    pub fn zero() -> Self {
        Self {
            balance: "0.000000".into(),
            usd_value: "0.00".into(),
        }
    }

    pub fn from_wei(wei: &str, eth_price_usd: f64) -> Option<Self> {
        let wei: u128 = wei.trim().parse().ok()?;
        let eth = wei as f64 / WEI_PER_ETH;
        Some(Self {
            balance: format!("{eth:.6}"),
            usd_value: format!("{:.2}", eth * eth_price_usd),
        })
    }
}

/// What an Etherscan-style `{status, message, result}` envelope means.
#[derive(Debug, PartialEq)]
enum Envelope {
    Ok(Value),
    /// `status=0` with "No transactions found" and friends: a valid empty answer.
    Empty,
    RateLimited,
    Error { status: String, message: String },
}

fn interpret(json: Value) -> Envelope {
    let status = json.get("status").and_then(Value::as_str).unwrap_or_default().to_string();
    let message = json.get("message").and_then(Value::as_str).unwrap_or_default().to_string();

    // Proxy module answers are JSON-RPC shaped, without status.
    if status.is_empty() {
        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            return Envelope::Error {
                status: "rpc".into(),
                message: err.to_string(),
            };
        }
        return match json.get("result") {
            Some(result) if !result.is_null() => Envelope::Ok(result.clone()),
            _ => Envelope::Error { status, message },
        };
    }

    if status == "1" {
        return Envelope::Ok(json.get("result").cloned().unwrap_or(Value::Null));
    }
    if message == "NOTOK" {
        let detail = json.get("result").and_then(Value::as_str).unwrap_or_default();
        if detail.to_lowercase().contains("rate limit") {
            return Envelope::RateLimited;
        }
        return Envelope::Error {
            status,
            message: detail.to_string(),
        };
    }
    if message.starts_with("No ") {
        return Envelope::Empty;
    }
    Envelope::Error { status, message }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTx {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: String,
    time_stamp: String,
    #[serde(default)]
    input: String,
}

/// Map an explorer tx row; ERC-20 `transfer` calls take the decoded recipient as `to`.
fn parse_tx(row: Value) -> Option<TxRecord> {
    let raw: RawTx = serde_json::from_value(row).ok()?;
    let secs: i64 = raw.time_stamp.parse().ok()?;
    let to = decode_erc20_recipient(&raw.input).unwrap_or(raw.to);
    Some(TxRecord {
        hash: raw.hash,
        from: raw.from.to_lowercase(),
        to: to.to_lowercase(),
        value: raw.value,
        timestamp: DateTime::from_timestamp(secs, 0)?,
    })
}

/// Page through `fetch` until `max` rows or a short page.
///
/// A failure after at least one good page keeps the rows already collected.
async fn collect_pages<F, Fut>(max: usize, page_size: usize, mut fetch: F) -> Result<Vec<TxRecord>, FetchError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
{
    let mut txs = Vec::new();
    let mut page = 1;

    while txs.len() < max {
        let rows = match fetch(page).await {
            Ok(Value::Array(rows)) => rows,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => return Err(FetchError::Decode(format!("txlist result is not an array: {other}"))),
            Err(e) if page > 1 => {
                warn!("Page {page} failed, keeping {} transactions: {e}", txs.len());
                break;
            }
            Err(e) => return Err(e),
        };
        let fetched = rows.len();
        txs.extend(rows.into_iter().filter_map(parse_tx));

        if fetched < page_size {
            break;
        }
        page += 1;
    }

    txs.truncate(max);
    Ok(txs)
}

/// One transaction as shown in the report, signed from the owner's side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub usd_value: String,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
}

impl RecentTransaction {
    /// `owner` must already be normalized; `tx.to` holds the decoded ERC-20 recipient when there is one.
    pub fn new(owner: &str, tx: &TxRecord, eth_price_usd: f64) -> Self {
        let received = tx.to == owner;
        let eth = tx.value.trim().parse::<u128>().unwrap_or(0) as f64 / WEI_PER_ETH;
        let (kind, sign) = if received {
            ("Received ETH", '+')
        } else {
            ("Sent ETH", '-')
        };
        Self {
            hash: tx.hash.clone(),
            kind: kind.into(),
            value: format!("{sign}{eth:.4} ETH"),
            usd_value: format!("${:.2}", eth * eth_price_usd),
            timestamp: tx.timestamp,
            from: tx.from.clone(),
            to: tx.to.clone(),
        }
    }
}

/// Token contracts queried per address.
const TOKEN_BALANCE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    pub name: String,
    pub balance: String,
    /// No token price source; always "0.00".
    pub usd_value: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    contract_address: String,
    token_symbol: String,
    #[serde(default)]
    token_name: String,
    #[serde(default)]
    token_decimal: String,
}

impl TokenInfo {
    /// Balance row for a raw `tokenbalance` answer, or `None` when it is zero or unreadable.
    fn with_raw_balance(&self, raw: &str) -> Option<TokenBalance> {
        let raw: u128 = raw.trim().parse().ok()?;
        if raw == 0 {
            return None;
        }
        let decimals: i32 = self.token_decimal.trim().parse().unwrap_or(0);
        let amount = raw as f64 / 10f64.powi(decimals);
        Some(TokenBalance {
            symbol: self.token_symbol.clone(),
            name: self.token_name.clone(),
            balance: format!("{amount:.2}"),
            usd_value: "0.00".into(),
            contract_address: self.contract_address.clone(),
        })
    }
}

/// Distinct token contracts in first-seen order, skipping rows without a symbol or contract.
fn unique_tokens(rows: Vec<Value>, limit: usize) -> Vec<TokenInfo> {
    let mut tokens: Vec<TokenInfo> = Vec::new();
    for row in rows {
        let Ok(mut token) = serde_json::from_value::<TokenInfo>(row) else {
            continue;
        };
        if token.contract_address.is_empty() || token.token_symbol.is_empty() {
            continue;
        }
        token.contract_address = token.contract_address.to_lowercase();
        if tokens.iter().all(|t| t.contract_address != token.contract_address) {
            tokens.push(token);
        }
    }
    tokens.truncate(limit);
    tokens
}

/// Block explorer client: the single place that paginates and retries.
pub struct EtherscanClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    page_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    eth_price_usd: f64,
    /// Transactions fetched per address when used as a counterparty source.
    counterparty_tx_limit: usize,
}

impl EtherscanClient {
    pub fn new(config: &ExplorerApiConfig, counterparty_tx_limit: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            client,
            page_size: config.page_size.max(1),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            eth_price_usd: config.eth_price_usd,
            counterparty_tx_limit,
        })
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let mut query: Vec<(&str, String)> = params.to_vec();
        if let Some(ref key) = self.api_key {
            query.push(("apikey", key.clone()));
        }
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Issue a call, retrying rate-limit rejections. Empty answers come back as `Value::Null`.
    pub async fn call(&self, params: &[(&str, String)]) -> Result<Value, FetchError> {
        for attempt in 1..=self.max_retries {
            match interpret(self.get(params).await?) {
                Envelope::Ok(result) => return Ok(result),
                Envelope::Empty => return Ok(Value::Null),
                Envelope::Error { status, message } => return Err(FetchError::Api { status, message }),
                Envelope::RateLimited => {
                    debug!("Rate limited (attempt {attempt}/{}), backing off", self.max_retries);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(FetchError::RateLimited(self.max_retries))
    }

    /// Newest-first transactions, paging until `max` records or a short page.
    pub async fn txlist(&self, address: &str, max: usize) -> Result<Vec<TxRecord>, FetchError> {
        let page_size = self.page_size.min(max.max(1));
        let client = self;
        let txs = collect_pages(max, page_size, move |page| {
            let params = vec![
                ("module", "account".into()),
                ("action", "txlist".into()),
                ("address", address.to_string()),
                ("startblock", "0".into()),
                ("endblock", "99999999".into()),
                ("page", page.to_string()),
                ("offset", page_size.to_string()),
                ("sort", "desc".into()),
            ];
            async move { client.call(&params).await }
        })
        .await?;
        debug!("Fetched {} transactions for {address}", txs.len());
        Ok(txs)
    }

    pub fn eth_price_usd(&self) -> f64 {
        self.eth_price_usd
    }

    /// Non-zero balances of the tokens seen in the address's recent token transfers.
    ///
    /// At most `TOKEN_BALANCE_LIMIT` contracts are queried; a failing token is skipped.
    pub async fn token_balances(&self, address: &str) -> Result<Vec<TokenBalance>, FetchError> {
        let result = self
            .call(&[
                ("module", "account".into()),
                ("action", "tokentx".into()),
                ("address", address.to_string()),
                ("page", "1".into()),
                ("offset", "100".into()),
                ("sort", "desc".into()),
            ])
            .await?;
        let rows = match result {
            Value::Array(rows) => rows,
            _ => return Ok(Vec::new()),
        };

        let mut balances = Vec::new();
        for token in unique_tokens(rows, TOKEN_BALANCE_LIMIT) {
            let raw = self
                .call(&[
                    ("module", "account".into()),
                    ("action", "tokenbalance".into()),
                    ("contractaddress", token.contract_address.clone()),
                    ("address", address.to_string()),
                    ("tag", "latest".into()),
                ])
                .await;
            match raw {
                Ok(Value::String(raw)) => balances.extend(token.with_raw_balance(&raw)),
                Ok(_) => {}
                Err(e) => warn!("Token balance for {} failed: {e}", token.contract_address),
            }
        }
        Ok(balances)
    }

    pub async fn balance(&self, address: &str) -> Result<Balance, FetchError> {
        let result = self
            .call(&[
                ("module", "account".into()),
                ("action", "balance".into()),
                ("address", address.to_string()),
                ("tag", "latest".into()),
            ])
            .await?;
        match result {
            Value::Null => Ok(Balance::zero()),
            Value::String(wei) => Balance::from_wei(&wei, self.eth_price_usd)
                .ok_or_else(|| FetchError::Decode(format!("bad wei amount: {wei}"))),
            other => Err(FetchError::Decode(format!("balance result: {other}"))),
        }
    }

    /// Outgoing transaction count (nonce).
    pub async fn transaction_count(&self, address: &str) -> Result<u64, FetchError> {
        let result = self
            .call(&[
                ("module", "proxy".into()),
                ("action", "eth_getTransactionCount".into()),
                ("address", address.to_string()),
                ("tag", "latest".into()),
            ])
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| FetchError::Decode(format!("nonce result: {result}")))?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|e| FetchError::Decode(format!("nonce {hex}: {e}")))
    }

    pub async fn first_transaction(&self, address: &str) -> Result<Option<DateTime<Utc>>, FetchError> {
        let result = self
            .call(&[
                ("module", "account".into()),
                ("action", "txlist".into()),
                ("address", address.to_string()),
                ("startblock", "0".into()),
                ("endblock", "99999999".into()),
                ("page", "1".into()),
                ("offset", "1".into()),
                ("sort", "asc".into()),
            ])
            .await?;
        let first = match result {
            Value::Array(rows) => rows.into_iter().next().and_then(parse_tx),
            _ => None,
        };
        Ok(first.map(|tx| tx.timestamp))
    }
}

#[async_trait]
impl CounterpartyProvider for EtherscanClient {
    async fn counterparties(&self, address: &str) -> Result<Vec<String>, FetchError> {
        let txs = self.txlist(address, self.counterparty_tx_limit).await?;
        if txs.is_empty() {
            debug!("No transactions found for {address}");
        }
        Ok(counterparties_from_txs(address, &txs))
    }
}
