//! Binance USDT-margined futures REST client.
//!
//! Public market-data calls are sent unsigned and without the API key header.
//! Private calls carry `X-MBX-APIKEY` and a signed query string (see
//! [`auth`](super::auth)). No call mutates local state; positions, balances
//! and orders live on the exchange only.
//!
//! # REST endpoints
//!
//! | Operation          | Method | Path                          | Signed |
//! |--------------------|--------|-------------------------------|--------|
//! | Ping               | GET    | `/fapi/v1/ping`               | no     |
//! | Server time        | GET    | `/fapi/v1/time`               | no     |
//! | Exchange info      | GET    | `/fapi/v1/exchangeInfo`       | no     |
//! | Recent trades      | GET    | `/fapi/v1/trades`             | no     |
//! | Historical trades  | GET    | `/fapi/v1/historicalTrades`   | no     |
//! | Order book depth   | GET    | `/fapi/v1/depth`              | no     |
//! | Mark price         | GET    | `/fapi/v1/premiumIndex`       | no     |
//! | Candles            | GET    | `/fapi/v1/klines`             | no     |
//! | Change leverage    | POST   | `/fapi/v1/leverage`           | yes    |
//! | Account snapshot   | GET    | `/fapi/v1/account`            | yes    |
//! | Balances           | GET    | `/fapi/v1/balance`            | yes    |
//! | Trade history      | GET    | `/fapi/v1/userTrades`         | yes    |
//! | Income history     | GET    | `/fapi/v1/income`             | yes    |
//! | All orders         | GET    | `/fapi/v1/allOrders`          | yes    |
//! | Position mode      | GET    | `/fapi/v1/positionSide/dual`  | yes    |
//! | Query order        | GET    | `/fapi/v1/order`              | yes    |
//! | New order          | POST   | `/fapi/v1/order`              | yes    |
//! | Cancel order       | DELETE | `/fapi/v1/order`              | yes    |
//! | Cancel all orders  | DELETE | `/fapi/v1/allOpenOrders`      | yes    |

use anyhow::{Context, Result};
use dr_core::{BotError, Candle, Interval, Order, OrderType, Position, PositionSide, Side, Symbol, parse_klines};
use reqwest::Method;
use tracing::{debug, info};

use super::auth::{RequestSigner, encode_params};
use super::config::FuturesClientConfig;
use crate::response::ExchangeResponse;
use crate::sizing::{OrderSizing, format_quantity};

const API_PREFIX: &str = "/fapi/v1";

type Params<'a> = Vec<(&'a str, Option<String>)>;

/// Binance USDT-margined futures client.
pub struct FuturesClient {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// API key sent in `X-MBX-APIKEY` on private calls.
    api_key: String,
    /// Signs private query strings.
    signer: RequestSigner,
    /// REST base URL (e.g. `https://fapi.binance.com`).
    base_url: String,
    /// Safety ceiling for [`change_leverage`](Self::change_leverage).
    max_leverage: u32,
    /// How opening orders are sized.
    sizing: OrderSizing,
}

impl FuturesClient {
    /// Create a new futures client (no connections opened yet).
    pub fn new(config: FuturesClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key,
            signer: RequestSigner::new(config.secret_key, config.recv_window),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_leverage: config.max_leverage,
            sizing: config.sizing,
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Send an unsigned GET.
    async fn public(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<ExchangeResponse> {
        let query = encode_params(params);
        let mut url = format!("{}{API_PREFIX}{path}", self.base_url);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        debug!("GET {url}");
        self.send(self.http.get(&url)).await
    }

    /// Send a signed request with the API key header.
    async fn signed(&self, method: Method, path: &str, params: &[(&str, Option<String>)]) -> Result<ExchangeResponse> {
        let signed = self.signer.sign(params);
        debug!("{method} {API_PREFIX}{path}?{}", signed.query);
        let url = format!("{}{API_PREFIX}{path}?{}", self.base_url, signed.to_query_string());
        self.send(self.http.request(method, &url).header("X-MBX-APIKEY", &self.api_key)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ExchangeResponse> {
        let resp = request.send().await.context("exchange request failed")?;
        let status = resp.status().as_u16();
        let text = resp.text().await.context("failed to read exchange response body")?;
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok(ExchangeResponse::new(status, body))
    }

    /// Send a public GET and require a 2xx response.
    async fn public_json(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<serde_json::Value> {
        Ok(self.public(path, params).await?.into_result()?)
    }

    /// Send a signed request and require a 2xx response.
    async fn signed_json(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, Option<String>)],
    ) -> Result<serde_json::Value> {
        Ok(self.signed(method, path, params).await?.into_result()?)
    }

    // -----------------------------------------------------------------------
    // Public market data
    // -----------------------------------------------------------------------

    /// Test connectivity.
    pub async fn ping(&self) -> Result<()> {
        self.public_json("/ping", &[]).await?;
        Ok(())
    }

    /// Exchange server time in milliseconds.
    pub async fn server_time(&self) -> Result<u64> {
        let body = self.public_json("/time", &[]).await?;
        body.get("serverTime")
            .and_then(|t| t.as_u64())
            .ok_or_else(|| BotError::Parse(format!("serverTime missing: {body}")).into())
    }

    /// Symbol list, filters, and rate limits.
    pub async fn exchange_info(&self) -> Result<serde_json::Value> {
        self.public_json("/exchangeInfo", &[]).await
    }

    pub async fn recent_trades(&self, symbol: &str, limit: u32) -> Result<serde_json::Value> {
        let params: Params = vec![("symbol", Some(symbol.to_string())), ("limit", Some(limit.to_string()))];
        self.public_json("/trades", &params).await
    }

    pub async fn historical_trades(&self, symbol: &str, limit: u32, from_id: Option<u64>) -> Result<serde_json::Value> {
        let params: Params = vec![
            ("symbol", Some(symbol.to_string())),
            ("limit", Some(limit.to_string())),
            ("fromId", from_id.map(|id| id.to_string())),
        ];
        self.public_json("/historicalTrades", &params).await
    }

    /// Order book snapshot.
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<serde_json::Value> {
        let params: Params = vec![("symbol", Some(symbol.to_string())), ("limit", Some(limit.to_string()))];
        self.public_json("/depth", &params).await
    }

    /// Current mark price.
    pub async fn mark_price(&self, symbol: &str) -> Result<f64> {
        let params: Params = vec![("symbol", Some(symbol.to_string()))];
        let body = self.public_json("/premiumIndex", &params).await?;
        body.get("markPrice")
            .and_then(|p| p.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| BotError::Parse(format!("markPrice missing: {body}")).into())
    }

    /// Candle series, oldest first.
    ///
    /// `interval` is validated before any request is made.
    pub async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Result<Vec<Candle>> {
        let interval: Interval = interval.parse()?;
        let params: Params = vec![
            ("symbol", Some(symbol.to_string())),
            ("interval", Some(interval.as_str().to_string())),
            ("limit", Some(limit.to_string())),
            ("startTime", start_time.map(|t| t.to_string())),
            ("endTime", end_time.map(|t| t.to_string())),
        ];
        let body = self.public_json("/klines", &params).await?;
        Ok(parse_klines(&body)?)
    }

    // -----------------------------------------------------------------------
    // Account (signed)
    // -----------------------------------------------------------------------

    /// Set the initial leverage for `symbol`.
    ///
    /// Leverage above the configured ceiling is rejected without a request.
    pub async fn change_leverage(&self, symbol: &str, leverage: u32) -> Result<serde_json::Value> {
        if leverage > self.max_leverage {
            return Err(BotError::BusinessRule(format!(
                "leverage value of {leverage} is too high, must be no higher than {}",
                self.max_leverage
            ))
            .into());
        }
        let params: Params = vec![("symbol", Some(symbol.to_string())), ("leverage", Some(leverage.to_string()))];
        let body = self.signed_json(Method::POST, "/leverage", &params).await?;
        info!("leverage for {symbol} set to {leverage}");
        Ok(body)
    }

    /// Full account snapshot (balances, positions).
    pub async fn account(&self) -> Result<serde_json::Value> {
        self.signed_json(Method::GET, "/account", &[]).await
    }

    /// Per-asset balances.
    pub async fn balance(&self) -> Result<serde_json::Value> {
        self.signed_json(Method::GET, "/balance", &[]).await
    }

    pub async fn user_trades(&self, symbol: &str) -> Result<serde_json::Value> {
        let params: Params = vec![("symbol", Some(symbol.to_string()))];
        self.signed_json(Method::GET, "/userTrades", &params).await
    }

    pub async fn income_history(&self) -> Result<serde_json::Value> {
        self.signed_json(Method::GET, "/income", &[]).await
    }

    pub async fn all_orders(&self, symbol: &str) -> Result<serde_json::Value> {
        let params: Params = vec![("symbol", Some(symbol.to_string()))];
        self.signed_json(Method::GET, "/allOrders", &params).await
    }

    /// Whether the account is in hedge (dual-side) mode.
    pub async fn position_mode(&self) -> Result<serde_json::Value> {
        self.signed_json(Method::GET, "/positionSide/dual", &[]).await
    }

    /// `totalMarginBalance` from the account snapshot.
    pub async fn margin_balance(&self) -> Result<f64> {
        let account = self.account().await?;
        account
            .get("totalMarginBalance")
            .and_then(|b| b.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| BotError::Parse("totalMarginBalance missing from account snapshot".into()).into())
    }

    /// Wallet balance of one asset.
    pub async fn asset_balance(&self, asset: &str) -> Result<f64> {
        let balances = self.balance().await?;
        balances
            .as_array()
            .into_iter()
            .flatten()
            .find(|b| b.get("asset").and_then(|a| a.as_str()) == Some(asset))
            .and_then(|b| b.get("balance").and_then(|v| v.as_str()).and_then(|s| s.parse::<f64>().ok()))
            .ok_or_else(|| BotError::BusinessRule(format!("asset \"{asset}\" not found in account balances")).into())
    }

    /// Every position in the account snapshot with a non-zero amount.
    ///
    /// A snapshot without a `positions` field yields an empty list.
    pub async fn get_open_positions(&self) -> Result<Vec<Position>> {
        let account = self.account().await?;
        Ok(open_positions_from_account(&account))
    }

    /// Side of the open position in `symbol`, or `None` when there is none.
    pub async fn get_current_position(&self, symbol: &str) -> Result<Option<PositionSide>> {
        let open = self.get_open_positions().await?;
        let side = open.iter().find(|p| p.symbol == symbol).map(Position::side);
        if side.is_none() {
            debug!("no open position for {symbol}");
        }
        Ok(side)
    }

    // -----------------------------------------------------------------------
    // Orders (signed)
    // -----------------------------------------------------------------------

    /// Place a new order. Returns the raw response; callers check its status class.
    pub async fn new_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        order_type: OrderType,
    ) -> Result<ExchangeResponse> {
        let params: Params = vec![
            ("symbol", Some(symbol.to_string())),
            ("quantity", Some(format_quantity(quantity))),
            ("side", Some(side.as_str().to_string())),
            ("type", Some(order_type.as_str().to_string())),
        ];
        info!("placing {} {side} order: {symbol} qty={quantity}", order_type.as_str());
        self.signed(Method::POST, "/order", &params).await
    }

    /// Look up one order.
    pub async fn get_order(&self, symbol: &str, order_id: u64) -> Result<serde_json::Value> {
        let params: Params = vec![("symbol", Some(symbol.to_string())), ("orderId", Some(order_id.to_string()))];
        self.signed_json(Method::GET, "/order", &params).await
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<ExchangeResponse> {
        let params: Params = vec![("symbol", Some(symbol.to_string())), ("orderId", Some(order_id.to_string()))];
        self.signed(Method::DELETE, "/order", &params).await
    }

    pub async fn cancel_all_open_orders(&self, symbol: &str) -> Result<ExchangeResponse> {
        let params: Params = vec![("symbol", Some(symbol.to_string()))];
        self.signed(Method::DELETE, "/allOpenOrders", &params).await
    }

    /// Flatten the open position in `symbol` with an opposite-side market order.
    ///
    /// Returns `None` without placing an order when nothing is open.
    pub async fn close_position(&self, symbol: &str) -> Result<Option<ExchangeResponse>> {
        let open = self.get_open_positions().await?;
        let Some(target) = open.iter().find(|p| p.symbol == symbol) else {
            info!("no open position for {symbol}, nothing to close");
            return Ok(None);
        };
        let Some(side) = target.side().closing_side() else {
            return Ok(None);
        };
        let resp = self.place(&Order::market(symbol, side, target.amount())).await?;
        Ok(Some(resp))
    }

    /// Open a market position in `side`, sized from the margin balance.
    ///
    /// Only USDT-quoted symbols are supported.
    pub async fn open_position(&self, symbol: &Symbol, side: Side) -> Result<ExchangeResponse> {
        if symbol.quote() != "USDT" {
            return Err(BotError::BusinessRule(format!("cannot size orders quoted in {}, only USDT", symbol.quote())).into());
        }
        let pair = symbol.pair();
        let balance = self.margin_balance().await?;
        let price = self.mark_price(&pair).await?;
        let quantity = self.sizing.base_quantity(balance, price);
        debug!("sizing {pair}: margin_balance={balance} mark_price={price} quantity={quantity}");
        if quantity <= 0.0 {
            return Err(BotError::BusinessRule(format!(
                "order quantity for {pair} rounds to zero (balance={balance}, price={price})"
            ))
            .into());
        }
        self.place(&Order::market(pair, side, quantity)).await
    }

    /// Send a prepared order.
    pub async fn place(&self, order: &Order) -> Result<ExchangeResponse> {
        self.new_order(&order.symbol, order.side, order.quantity, order.order_type).await
    }
}

/// Extract the non-zero positions from an account snapshot.
pub fn open_positions_from_account(account: &serde_json::Value) -> Vec<Position> {
    let Some(positions) = account.get("positions").and_then(|p| p.as_array()) else {
        return Vec::new();
    };
    positions.iter().filter_map(Position::from_json).filter(|p| p.position_amt != 0.0).collect()
}
