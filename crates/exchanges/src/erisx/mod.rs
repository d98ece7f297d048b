//! ErisX integration
//!
//! ErisX runs two FIX 4.4 sessions per participant: one for order entry and
//! one for market data. Both are opened by [`ErisxApi::new`] and driven on
//! the current monoio thread.
//!
//! Balances and trade history live behind the ErisX clearing API, which is
//! not covered here; those calls answer `FeatureNotSupported`.

pub mod config;
pub mod parse;
pub mod session;

use crate::errors::{CxlRejReason, ExchangeError, OrdRejReason, Result};
use crate::fix::tags::{exec_type, md_entry_type, msg_type, ord_status, subscription, tag, user};
use crate::fix::{FixMessage, PendingResponse};
use crate::traits::Exchange;
use crate::types::{Order, OrderBook, Security, Side};
use async_trait::async_trait;
use keeper_core::{log_order, nanos, ClientOrderId, PerfTimer, RequestId, Wad};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use config::{parse_cert_string, ErisxConfig};
pub use parse::{format_pair_string, parse_order_book, parse_orders_list, parse_security_list};
pub use session::ErisxFix;

/// How long to keep waiting for book entries once the venue has sent an
/// empty refresh.
const EMPTY_BOOK_GRACE: Duration = Duration::from_secs(2);

/// HandlInst (21) automated, no broker intervention
const HANDL_INST_AUTO_PRIVATE: &str = "1";
/// Product (460) currency
const PRODUCT_CURRENCY: &str = "2";
/// OrdType (40) limit
const ORD_TYPE_LIMIT: &str = "2";
/// TimeInForce (59) good till cancel
const TIME_IN_FORCE_GTC: &str = "1";
/// ExecInst (18) participate don't initiate, i.e. post only
const EXEC_INST_POST_ONLY: &str = "6";
/// MassStatusReqType (585) all orders
const MASS_STATUS_ALL_ORDERS: &str = "8";

fn reject_text(msg: &FixMessage) -> String {
    msg.get(tag::TEXT).unwrap_or("no reason given").to_string()
}

/// Error for a reject that arrived instead of the expected reply.
fn unexpected_reply(msg: &FixMessage, expected: &str) -> ExchangeError {
    match msg.msg_type() {
        msg_type::BUSINESS_MESSAGE_REJECT => ExchangeError::BusinessReject {
            ref_msg_type: msg.get(tag::REF_MSG_TYPE).unwrap_or_default().to_string(),
            text: reject_text(msg),
        },
        other => ExchangeError::InvalidResponse(format!("expected 35={expected}, got 35={other}: {}", reject_text(msg))),
    }
}

/// ErisX client over FIX
pub struct ErisxApi {
    fix_trading: Option<ErisxFix>,
    fix_marketdata: Option<ErisxFix>,
}

impl ErisxApi {
    /// Log on to every session that has an endpoint and a user.
    pub async fn new(config: ErisxConfig) -> Result<Self> {
        info!("🚀 Initializing ErisX exchange");
        let tls = config.tls_settings()?;
        info!("   TLS client certificate: {}", tls.is_some());

        let session = |endpoint: &str, sender: &str, username: &str| {
            let fix_config = ErisxFix::fix_config(endpoint, sender, username, &config.password, tls.clone())
                .with_heartbeat_interval(config.heartbeat_interval)
                .with_response_timeout(config.response_timeout);
            ErisxFix::with_config(fix_config)
        };

        let fix_trading = match (&config.fix_trading_endpoint, &config.fix_trading_user) {
            (Some(endpoint), Some(user)) => {
                info!("   Trading: {} as {}", endpoint, user);
                let fix = session(endpoint, user, user);
                fix.logon().await?;
                Some(fix)
            }
            _ => None,
        };

        let fix_marketdata = match (&config.fix_marketdata_endpoint, &config.fix_marketdata_user) {
            (Some(endpoint), Some(user)) => {
                // market data logs on with the trading user's credentials
                let username = config.fix_trading_user.as_deref().unwrap_or(user);
                info!("   Market data: {} as {}", endpoint, user);
                let fix = session(endpoint, user, username);
                if let Err(e) = fix.logon().await {
                    if let Some(trading) = &fix_trading {
                        trading.logout().await?;
                    }
                    return Err(e);
                }
                Some(fix)
            }
            _ => None,
        };

        if fix_trading.is_none() && fix_marketdata.is_none() {
            warn!("ErisX configured without any FIX session");
        }
        info!("✅ ErisX client initialized");
        Ok(Self {
            fix_trading,
            fix_marketdata,
        })
    }

    pub fn trading_session(&self) -> Option<&ErisxFix> {
        self.fix_trading.as_ref()
    }

    pub fn marketdata_session(&self) -> Option<&ErisxFix> {
        self.fix_marketdata.as_ref()
    }

    fn trading(&self) -> Result<&ErisxFix> {
        self.fix_trading
            .as_ref()
            .ok_or_else(|| ExchangeError::ConfigurationError("ErisX trading session is not configured".to_string()))
    }

    fn marketdata(&self) -> Result<&ErisxFix> {
        self.fix_marketdata
            .as_ref()
            .ok_or_else(|| ExchangeError::ConfigurationError("ErisX market data session is not configured".to_string()))
    }

    /// Aggregated book for `pair`, taken from the first market data message
    /// that carries bids or offers. The subscription is dropped afterwards.
    pub async fn get_orderbook(&self, pair: &str) -> Result<OrderBook> {
        let fix = self.marketdata()?;
        let symbol = format_pair_string(pair);
        let request_id = RequestId::new();

        let mut msg = fix.create_message(msg_type::MARKET_DATA_REQUEST)?;
        msg.append_pair(tag::MD_REQ_ID, request_id.as_str())
            .append_pair(tag::SUBSCRIPTION_REQUEST_TYPE, subscription::SNAPSHOT_AND_UPDATES)
            .append_pair(tag::MARKET_DEPTH, 0)
            .append_pair(tag::MD_UPDATE_TYPE, 1)
            .append_pair(tag::AGGREGATED_BOOK, "Y")
            .append_pair(tag::NO_MD_ENTRY_TYPES, 2)
            .append_pair(tag::MD_ENTRY_TYPE, md_entry_type::BID)
            .append_pair(tag::MD_ENTRY_TYPE, md_entry_type::OFFER)
            .append_pair(tag::NO_RELATED_SYM, 1)
            .append_pair(tag::SYMBOL, &symbol);

        let pending = fix.request(msg, request_id.as_str())?;
        let book = collect_order_book(&pending, &symbol).await;

        let subscribed = !matches!(
            book,
            Err(ExchangeError::InvalidResponse(_) | ExchangeError::SessionClosed(_) | ExchangeError::NotLoggedIn(_))
        );
        if subscribed {
            let mut unsubscribe = fix.create_message(msg_type::MARKET_DATA_REQUEST)?;
            unsubscribe
                .append_pair(tag::MD_REQ_ID, request_id.as_str())
                .append_pair(tag::SUBSCRIPTION_REQUEST_TYPE, subscription::UNSUBSCRIBE)
                .append_pair(tag::MARKET_DEPTH, 0)
                .append_pair(tag::NO_MD_ENTRY_TYPES, 2)
                .append_pair(tag::MD_ENTRY_TYPE, md_entry_type::BID)
                .append_pair(tag::MD_ENTRY_TYPE, md_entry_type::OFFER)
                .append_pair(tag::NO_RELATED_SYM, 1)
                .append_pair(tag::SYMBOL, &symbol);
            if let Err(e) = fix.write(unsubscribe) {
                debug!("could not unsubscribe from {}: {}", symbol, e);
            }
        }
        book
    }

    /// Change the password shared by both sessions.
    pub async fn reset_password(&self, new_password: &str) -> Result<()> {
        let fix = self.trading()?;
        let request_id = RequestId::new();
        let config = fix.config();

        let mut msg = fix.create_message(msg_type::USER_REQUEST)?;
        msg.append_pair(tag::USER_REQUEST_ID, request_id.as_str())
            .append_pair(tag::USER_REQUEST_TYPE, user::REQUEST_CHANGE_PASSWORD)
            .append_pair(tag::USERNAME, &config.username)
            .append_pair(tag::PASSWORD, &config.password)
            .append_pair(tag::NEW_PASSWORD, new_password);

        let pending = fix.request(msg, request_id.as_str())?;
        let response = pending.wait_for(&[msg_type::USER_RESPONSE]).await?;
        let status = response.get(tag::USER_STATUS);
        if response.msg_type() == msg_type::USER_RESPONSE && status == Some(user::STATUS_PASSWORD_CHANGED) {
            info!("🔑 ErisX password changed for {}", config.username);
            return Ok(());
        }

        let text = response
            .get(tag::USER_STATUS_TEXT)
            .or_else(|| response.get(tag::TEXT))
            .map(str::to_string)
            .unwrap_or_else(|| format!("user status {}", status.unwrap_or("missing")));
        Err(ExchangeError::AuthenticationFailed(text))
    }

    /// Log out of both sessions.
    pub async fn logout(&self) -> Result<()> {
        if let Some(fix) = &self.fix_marketdata {
            fix.logout().await?;
        }
        if let Some(fix) = &self.fix_trading {
            fix.logout().await?;
        }
        Ok(())
    }
}

/// Whole collection is bounded by the response timeout, however many
/// statistics-only refreshes arrive meanwhile.
async fn collect_order_book(pending: &PendingResponse, symbol: &str) -> Result<OrderBook> {
    let mut deadline = Instant::now() + pending.timeout();
    let mut saw_empty_refresh = false;
    loop {
        let msg = match pending.next_before(deadline).await {
            Ok(msg) => msg,
            Err(ExchangeError::Timeout(_)) if saw_empty_refresh => {
                debug!("no {} book entries after an empty refresh, book is empty", symbol);
                return Ok(OrderBook::empty(symbol, (nanos() / 1_000) as i64));
            }
            Err(e) => return Err(e),
        };

        match msg.msg_type() {
            msg_type::MARKET_DATA_SNAPSHOT | msg_type::MARKET_DATA_INCREMENTAL => {
                if parse::has_book_entries(&msg) {
                    return parse_order_book(&msg, symbol, (nanos() / 1_000) as i64);
                }
                if msg.get_parsed::<usize>(tag::NO_MD_ENTRIES).unwrap_or(0) == 0 {
                    saw_empty_refresh = true;
                    deadline = deadline.min(Instant::now() + EMPTY_BOOK_GRACE);
                } else {
                    debug!("skipping {} statistics refresh", symbol);
                }
            }
            msg_type::MARKET_DATA_REQUEST_REJECT | msg_type::REJECT | msg_type::BUSINESS_MESSAGE_REJECT => {
                return Err(ExchangeError::InvalidResponse(format!(
                    "market data request for {} rejected: {}",
                    symbol,
                    reject_text(&msg)
                )));
            }
            other => debug!("ignoring 35={} on market data request for {}", other, symbol),
        }
    }
}

#[async_trait(?Send)]
impl Exchange for ErisxApi {
    fn name(&self) -> &str {
        "erisx"
    }

    async fn get_markets(&self) -> Result<HashMap<String, Security>> {
        let fix = self.marketdata()?;
        let request_id = RequestId::new();

        let mut msg = fix.create_message(msg_type::SECURITY_LIST_REQUEST)?;
        msg.append_pair(tag::SECURITY_REQ_ID, request_id.as_str())
            .append_pair(tag::SECURITY_LIST_REQUEST_TYPE, 0)
            .append_pair(tag::SYMBOL, "NA")
            .append_pair(tag::PRODUCT, PRODUCT_CURRENCY);

        let pending = fix.request(msg, request_id.as_str())?;
        let response = pending.wait_for(&[msg_type::SECURITY_LIST]).await?;
        if response.msg_type() != msg_type::SECURITY_LIST {
            return Err(unexpected_reply(&response, msg_type::SECURITY_LIST));
        }
        parse_security_list(&response)
    }

    async fn get_pair(&self, pair: &str) -> Result<Security> {
        let symbol = format_pair_string(pair);
        self.get_markets()
            .await?
            .remove(&symbol)
            .ok_or(ExchangeError::SymbolNotFound(symbol))
    }

    /// Open orders are only visible per session, through a mass status
    /// request on the trading session.
    async fn get_orders(&self, pair: &str) -> Result<Vec<Order>> {
        let fix = self.trading()?;
        let request_id = RequestId::new();

        let mut msg = fix.create_message(msg_type::ORDER_MASS_STATUS_REQUEST)?;
        msg.append_pair(tag::MASS_STATUS_REQ_ID, request_id.as_str())
            .append_pair(tag::MASS_STATUS_REQ_TYPE, MASS_STATUS_ALL_ORDERS);

        let pending = fix.request(msg, request_id.as_str())?;
        let reports = fix.wait_for_get_orders_response(&pending).await?;

        let symbol = format_pair_string(pair);
        let orders: Vec<Order> = parse_orders_list(&reports)?
            .into_iter()
            .filter(|order| order.pair == symbol)
            .collect();
        debug!("{} open {} orders", orders.len(), symbol);
        Ok(orders)
    }

    /// Post-only GTC limit order. Returns `<OrderID>|<ClOrdID>`.
    async fn place_order(&self, pair: &str, is_sell: bool, price: Wad, amount: Wad) -> Result<String> {
        let fix = self.trading()?;
        let _timer = PerfTimer::start("erisx_place_order");
        let side = Side::from_is_sell(is_sell);
        let symbol = format_pair_string(pair);
        let base_currency = symbol.split('/').next().unwrap_or(symbol.as_str()).to_string();
        let client_order_id = ClientOrderId::new();

        let mut msg = fix.create_message(msg_type::NEW_ORDER_SINGLE)?;
        msg.append_pair(tag::CL_ORD_ID, client_order_id.as_str())
            .append_pair(tag::HANDL_INST, HANDL_INST_AUTO_PRIVATE)
            .append_pair(tag::CURRENCY, &base_currency)
            .append_pair(tag::SIDE, side.fix_code())
            .append_pair(tag::SYMBOL, &symbol)
            .append_pair(tag::PRODUCT, PRODUCT_CURRENCY)
            .append_utc_timestamp(tag::TRANSACT_TIME)
            .append_pair(tag::ORDER_QTY, amount)
            .append_pair(tag::ORD_TYPE, ORD_TYPE_LIMIT)
            .append_pair(tag::PRICE, price)
            .append_pair(tag::TIME_IN_FORCE, TIME_IN_FORCE_GTC)
            .append_pair(tag::EXEC_INST, EXEC_INST_POST_ONLY);

        let pending = fix.request(msg, client_order_id.as_str())?;
        let report = pending.wait_for(&[msg_type::EXECUTION_REPORT]).await?;

        let rejected = match report.msg_type() {
            msg_type::EXECUTION_REPORT => {
                report.get(tag::EXEC_TYPE) == Some(exec_type::REJECTED)
                    || report.get(tag::ORD_STATUS) == Some(ord_status::REJECTED)
            }
            msg_type::BUSINESS_MESSAGE_REJECT | msg_type::REJECT => true,
            other => {
                return Err(ExchangeError::InvalidResponse(format!(
                    "unexpected 35={other} for new order {client_order_id}"
                )))
            }
        };
        if rejected {
            return Err(ExchangeError::OrderRejected {
                reason: OrdRejReason::from_field(report.get(tag::ORD_REJ_REASON)),
                text: reject_text(&report),
            });
        }

        let order_id = parse::join_order_id(
            report.require(tag::ORDER_ID)?,
            report.get(tag::CL_ORD_ID).unwrap_or(client_order_id.as_str()),
        );
        info!("Placed {} order #{} with amount {} at price of {}", side, order_id, amount, price);
        log_order!("PLACED", &order_id, &symbol);
        Ok(order_id)
    }

    /// `true` once the venue confirms the cancel; a cancel reject is `false`.
    async fn cancel_order(&self, order_id: &str, pair: &str, is_sell: bool) -> Result<bool> {
        let (venue_order_id, client_order_id) = parse::split_order_id(order_id)?;
        let fix = self.trading()?;
        let cancel_id = ClientOrderId::new();
        let symbol = format_pair_string(pair);

        let mut msg = fix.create_message(msg_type::ORDER_CANCEL_REQUEST)?;
        msg.append_pair(tag::CL_ORD_ID, cancel_id.as_str())
            .append_pair(tag::ORDER_ID, venue_order_id)
            .append_pair(tag::ORIG_CL_ORD_ID, client_order_id)
            .append_pair(tag::SYMBOL, &symbol)
            .append_pair(tag::SIDE, Side::from_is_sell(is_sell).fix_code())
            .append_utc_timestamp(tag::TRANSACT_TIME);

        let pending = fix.request(msg, cancel_id.as_str())?;
        let response = pending.wait_for(&[msg_type::EXECUTION_REPORT]).await?;
        if response.msg_type() != msg_type::EXECUTION_REPORT {
            warn!(
                "Cancel of #{} refused ({}): {}",
                order_id,
                CxlRejReason::from_field(response.get(tag::CXL_REJ_REASON)),
                reject_text(&response)
            );
            return Ok(false);
        }

        let canceled = response.get(tag::EXEC_TYPE) == Some(exec_type::CANCELED);
        if canceled {
            log_order!("CANCELLED", order_id, &symbol);
        }
        Ok(canceled)
    }
}
