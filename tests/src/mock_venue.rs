//! In-process FIX venue for integration tests
//!
//! Listens on `127.0.0.1:0` and answers the ErisX message set from a
//! [`VenueScript`]. Every inbound message is recorded so tests can assert
//! on what the client actually sent.

use keeper_exchanges::fix::tags::{exec_type, msg_type, ord_status, subscription, tag, user};
use keeper_exchanges::fix::{FixMessage, FixParser};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MarketSpec {
    pub symbol: String,
    pub currency: String,
    pub min_price_increment: String,
    pub description: String,
    pub min_trade_vol: Option<String>,
}

impl MarketSpec {
    pub fn new(symbol: &str, currency: &str, min_price_increment: &str, description: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            min_price_increment: min_price_increment.to_string(),
            description: description.to_string(),
            min_trade_vol: None,
        }
    }

    pub fn with_min_trade_vol(mut self, vol: &str) -> Self {
        self.min_trade_vol = Some(vol.to_string());
        self
    }
}

/// How the venue behaves
#[derive(Debug, Clone)]
pub struct VenueScript {
    /// Logons with any other password are refused
    pub password: String,
    pub markets: Vec<MarketSpec>,
    /// `(price, size)` levels
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
    /// Send an empty refresh and a statistics refresh before the book
    pub empty_refresh_first: bool,
    /// Reject every new order with this text
    pub reject_orders: Option<String>,
    pub allow_password_change: bool,
    /// Answer market data requests with `(count, every)` statistics
    /// refreshes and never a book
    pub statistics_stream: Option<(usize, Duration)>,
}

impl Default for VenueScript {
    fn default() -> Self {
        Self {
            password: "secret".to_string(),
            markets: vec![
                MarketSpec::new("BTC/USD", "BTC", "0.1", "Bitcoin").with_min_trade_vol("0.0001"),
                MarketSpec::new("ETH/USD", "ETH", "0.01", "Ether"),
            ],
            bids: vec![("150.10".to_string(), "2".to_string()), ("150.20".to_string(), "1.5".to_string())],
            asks: vec![("150.50".to_string(), "3".to_string())],
            empty_refresh_first: true,
            reject_orders: None,
            allow_password_change: true,
            statistics_stream: None,
        }
    }
}

#[derive(Debug, Clone)]
struct RestingOrder {
    order_id: String,
    cl_ord_id: String,
    symbol: String,
    side: String,
    qty: String,
    price: String,
    transact_time: String,
}

#[derive(Default)]
struct VenueState {
    script: Option<VenueScript>,
    received: Vec<FixMessage>,
    orders: Vec<RestingOrder>,
    next_order_id: u64,
}

/// Handle on a running mock venue
#[derive(Clone)]
pub struct MockVenue {
    endpoint: String,
    state: Arc<Mutex<VenueState>>,
}

impl MockVenue {
    /// Bind and start accepting on the current monoio thread.
    pub fn start(script: VenueScript) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let endpoint = listener.local_addr()?.to_string();
        let state = Arc::new(Mutex::new(VenueState {
            script: Some(script),
            next_order_id: 1000,
            ..Default::default()
        }));
        info!("🧪 Mock venue listening on {}", endpoint);

        let venue = Self { endpoint, state };
        let acceptor = venue.clone();
        monoio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                monoio::spawn(acceptor.clone().serve(stream));
            }
        });
        Ok(venue)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Every message received so far, in arrival order.
    pub fn received(&self) -> Vec<FixMessage> {
        self.state.lock().map(|s| s.received.clone()).unwrap_or_default()
    }

    pub fn received_of(&self, mt: &str) -> Vec<FixMessage> {
        self.received().into_iter().filter(|m| m.msg_type() == mt).collect()
    }

    pub fn open_order_count(&self) -> usize {
        self.state.lock().map(|s| s.orders.len()).unwrap_or(0)
    }

    fn script(&self) -> VenueScript {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.script.clone())
            .unwrap_or_default()
    }

    async fn serve(self, mut stream: TcpStream) {
        let mut parser = FixParser::new();
        let mut seq = 1u64;
        loop {
            let (result, buf) = stream.read(Vec::with_capacity(4096)).await;
            match result {
                Ok(0) | Err(_) => break,
                Ok(_) => parser.append_buffer(&buf),
            }
            while let Ok(Some(msg)) = parser.get_message() {
                if let Ok(mut state) = self.state.lock() {
                    state.received.push(msg.clone());
                }
                let (replies, close) = self.answer(&msg);
                for reply in replies {
                    if !send(&mut stream, &msg, reply, &mut seq).await {
                        return;
                    }
                }
                if let Some((count, every)) = self.statistics_stream_for(&msg) {
                    // blocks this connection's reads, which is fine for a subscription test
                    for _ in 0..count {
                        monoio::time::sleep(every).await;
                        let refresh = statistics_refresh(&msg);
                        if !send(&mut stream, &msg, refresh, &mut seq).await {
                            return;
                        }
                    }
                }
                if close {
                    debug!("mock venue closing connection");
                    return;
                }
            }
        }
    }

    fn statistics_stream_for(&self, msg: &FixMessage) -> Option<(usize, Duration)> {
        if msg.msg_type() != msg_type::MARKET_DATA_REQUEST
            || msg.get(tag::SUBSCRIPTION_REQUEST_TYPE) == Some(subscription::UNSUBSCRIBE)
        {
            return None;
        }
        self.script().statistics_stream
    }

    fn answer(&self, msg: &FixMessage) -> (Vec<FixMessage>, bool) {
        let script = self.script();
        let reply = |mt: &str| FixMessage::new(msg.begin_string(), mt);

        match msg.msg_type() {
            msg_type::LOGON => {
                if msg.get(tag::PASSWORD) != Some(script.password.as_str()) {
                    let mut logout = reply(msg_type::LOGOUT);
                    logout.append_pair(tag::TEXT, "invalid password");
                    return (vec![logout], true);
                }
                let mut logon = reply(msg_type::LOGON);
                logon
                    .append_pair(tag::ENCRYPT_METHOD, 0)
                    .append_pair(tag::HEART_BT_INT, msg.get(tag::HEART_BT_INT).unwrap_or("10"))
                    .append_pair(tag::RESET_SEQ_NUM_FLAG, "Y");
                (vec![logon], false)
            }
            msg_type::TEST_REQUEST => {
                let mut heartbeat = reply(msg_type::HEARTBEAT);
                if let Some(id) = msg.get(tag::TEST_REQ_ID) {
                    heartbeat.append_pair(tag::TEST_REQ_ID, id);
                }
                (vec![heartbeat], false)
            }
            msg_type::HEARTBEAT | msg_type::SEQUENCE_RESET => (Vec::new(), false),
            msg_type::LOGOUT => (vec![reply(msg_type::LOGOUT)], true),
            msg_type::SECURITY_LIST_REQUEST => (vec![self.security_list(msg, &script)], false),
            msg_type::NEW_ORDER_SINGLE => (vec![self.new_order(msg, &script)], false),
            msg_type::ORDER_CANCEL_REQUEST => (vec![self.cancel(msg)], false),
            msg_type::ORDER_MASS_STATUS_REQUEST => (self.mass_status(msg), false),
            msg_type::MARKET_DATA_REQUEST => (self.market_data(msg, &script), false),
            msg_type::USER_REQUEST => {
                let mut response = reply(msg_type::USER_RESPONSE);
                response
                    .append_pair(tag::USER_REQUEST_ID, msg.get(tag::USER_REQUEST_ID).unwrap_or_default())
                    .append_pair(tag::USERNAME, msg.get(tag::USERNAME).unwrap_or_default());
                if script.allow_password_change && msg.get(tag::PASSWORD) == Some(script.password.as_str()) {
                    response.append_pair(tag::USER_STATUS, user::STATUS_PASSWORD_CHANGED);
                } else {
                    response
                        .append_pair(tag::USER_STATUS, "3")
                        .append_pair(tag::USER_STATUS_TEXT, "password change not permitted");
                }
                (vec![response], false)
            }
            other => {
                let mut reject = reply(msg_type::BUSINESS_MESSAGE_REJECT);
                reject
                    .append_pair(tag::REF_SEQ_NUM, msg.seq_num().unwrap_or(0))
                    .append_pair(tag::REF_MSG_TYPE, other)
                    .append_pair(tag::BUSINESS_REJECT_REASON, 3)
                    .append_pair(tag::TEXT, "unsupported message type");
                (vec![reject], false)
            }
        }
    }

    fn security_list(&self, msg: &FixMessage, script: &VenueScript) -> FixMessage {
        let mut list = FixMessage::new(msg.begin_string(), msg_type::SECURITY_LIST);
        list.append_pair(tag::SECURITY_REQ_ID, msg.get(tag::SECURITY_REQ_ID).unwrap_or_default())
            .append_pair(tag::NO_RELATED_SYM, script.markets.len());
        for market in &script.markets {
            list.append_pair(tag::SYMBOL, &market.symbol)
                .append_pair(tag::PRODUCT, 2)
                .append_pair(tag::MIN_PRICE_INCREMENT, &market.min_price_increment)
                .append_pair(tag::SECURITY_DESC, &market.description)
                .append_pair(tag::CURRENCY, &market.currency);
            if let Some(vol) = &market.min_trade_vol {
                list.append_pair(tag::MIN_TRADE_VOL, vol);
            }
        }
        list
    }

    fn new_order(&self, msg: &FixMessage, script: &VenueScript) -> FixMessage {
        let cl_ord_id = msg.get(tag::CL_ORD_ID).unwrap_or_default().to_string();
        let mut report = FixMessage::new(msg.begin_string(), msg_type::EXECUTION_REPORT);

        if let Some(text) = &script.reject_orders {
            report
                .append_pair(tag::ORDER_ID, "NONE")
                .append_pair(tag::CL_ORD_ID, &cl_ord_id)
                .append_pair(tag::EXEC_TYPE, exec_type::REJECTED)
                .append_pair(tag::ORD_STATUS, ord_status::REJECTED)
                .append_pair(tag::ORD_REJ_REASON, 3)
                .append_pair(tag::TEXT, text);
            return report;
        }

        let order = match self.state.lock() {
            Ok(mut state) => {
                state.next_order_id += 1;
                let order = RestingOrder {
                    order_id: state.next_order_id.to_string(),
                    cl_ord_id,
                    symbol: msg.get(tag::SYMBOL).unwrap_or_default().to_string(),
                    side: msg.get(tag::SIDE).unwrap_or("1").to_string(),
                    qty: msg.get(tag::ORDER_QTY).unwrap_or("0").to_string(),
                    price: msg.get(tag::PRICE).unwrap_or("0").to_string(),
                    transact_time: msg.get(tag::TRANSACT_TIME).unwrap_or_default().to_string(),
                };
                state.orders.push(order.clone());
                order
            }
            Err(_) => return report,
        };
        fill_report(&mut report, &order);
        report
            .append_pair(tag::EXEC_TYPE, exec_type::NEW)
            .append_pair(tag::ORD_STATUS, ord_status::NEW);
        report
    }

    fn cancel(&self, msg: &FixMessage) -> FixMessage {
        let orig = msg.get(tag::ORIG_CL_ORD_ID).unwrap_or_default();
        let cl_ord_id = msg.get(tag::CL_ORD_ID).unwrap_or_default();
        let removed = self.state.lock().ok().and_then(|mut state| {
            let index = state.orders.iter().position(|o| o.cl_ord_id == orig)?;
            Some(state.orders.remove(index))
        });

        match removed {
            Some(order) => {
                let mut report = FixMessage::new(msg.begin_string(), msg_type::EXECUTION_REPORT);
                fill_report(&mut report, &order);
                report.remove(tag::CL_ORD_ID);
                report
                    .append_pair(tag::CL_ORD_ID, cl_ord_id)
                    .append_pair(tag::ORIG_CL_ORD_ID, orig)
                    .append_pair(tag::EXEC_TYPE, exec_type::CANCELED)
                    .append_pair(tag::ORD_STATUS, ord_status::CANCELED);
                report
            }
            None => {
                let mut reject = FixMessage::new(msg.begin_string(), msg_type::ORDER_CANCEL_REJECT);
                reject
                    .append_pair(tag::ORDER_ID, msg.get(tag::ORDER_ID).unwrap_or("NONE"))
                    .append_pair(tag::CL_ORD_ID, cl_ord_id)
                    .append_pair(tag::ORIG_CL_ORD_ID, orig)
                    .append_pair(tag::ORD_STATUS, ord_status::REJECTED)
                    .append_pair(tag::CXL_REJ_REASON, 1)
                    .append_pair(tag::TEXT, "unknown order");
                reject
            }
        }
    }

    fn mass_status(&self, msg: &FixMessage) -> Vec<FixMessage> {
        let request_id = msg.get(tag::MASS_STATUS_REQ_ID).unwrap_or_default();
        let orders = self.state.lock().map(|s| s.orders.clone()).unwrap_or_default();

        if orders.is_empty() {
            let mut none = FixMessage::new(msg.begin_string(), msg_type::EXECUTION_REPORT);
            none.append_pair(tag::MASS_STATUS_REQ_ID, request_id)
                .append_pair(tag::ORDER_ID, "UNKNOWN")
                .append_pair(tag::EXEC_TYPE, exec_type::ORDER_STATUS)
                .append_pair(tag::ORD_STATUS, ord_status::REJECTED)
                .append_pair(tag::TOT_NUM_REPORTS, 0)
                .append_pair(tag::LAST_RPT_REQUESTED, "Y");
            return vec![none];
        }

        let total = orders.len();
        orders
            .iter()
            .enumerate()
            .map(|(i, order)| {
                let mut report = FixMessage::new(msg.begin_string(), msg_type::EXECUTION_REPORT);
                report.append_pair(tag::MASS_STATUS_REQ_ID, request_id);
                fill_report(&mut report, order);
                report
                    .append_pair(tag::EXEC_TYPE, exec_type::ORDER_STATUS)
                    .append_pair(tag::ORD_STATUS, ord_status::NEW)
                    .append_pair(tag::TOT_NUM_REPORTS, total)
                    .append_pair(tag::LAST_RPT_REQUESTED, if i + 1 == total { "Y" } else { "N" });
                report
            })
            .collect()
    }

    fn market_data(&self, msg: &FixMessage, script: &VenueScript) -> Vec<FixMessage> {
        let request_id = msg.get(tag::MD_REQ_ID).unwrap_or_default();
        if msg.get(tag::SUBSCRIPTION_REQUEST_TYPE) == Some(subscription::UNSUBSCRIBE) {
            return Vec::new();
        }

        let symbol = msg.get(tag::SYMBOL).unwrap_or_default();
        if !script.markets.iter().any(|m| m.symbol == symbol) {
            let mut reject = FixMessage::new(msg.begin_string(), msg_type::MARKET_DATA_REQUEST_REJECT);
            reject
                .append_pair(tag::MD_REQ_ID, request_id)
                .append_pair(tag::MD_REQ_REJ_REASON, 0)
                .append_pair(tag::TEXT, format!("unknown symbol {symbol}"));
            return vec![reject];
        }

        let mut replies = Vec::new();
        if script.empty_refresh_first {
            let mut empty = FixMessage::new(msg.begin_string(), msg_type::MARKET_DATA_INCREMENTAL);
            empty.append_pair(tag::MD_REQ_ID, request_id).append_pair(tag::NO_MD_ENTRIES, 0);
            replies.push(empty);

            replies.push(statistics_refresh(msg));
        }

        if script.statistics_stream.is_some() || (script.bids.is_empty() && script.asks.is_empty()) {
            return replies;
        }
        let mut book = FixMessage::new(msg.begin_string(), msg_type::MARKET_DATA_INCREMENTAL);
        book.append_pair(tag::MD_REQ_ID, request_id)
            .append_pair(tag::NO_MD_ENTRIES, script.bids.len() + script.asks.len());
        let levels = script
            .bids
            .iter()
            .map(|level| ("0", level))
            .chain(script.asks.iter().map(|level| ("1", level)));
        for (entry_type, (price, size)) in levels {
            book.append_pair(tag::MD_UPDATE_ACTION, 0)
                .append_pair(tag::MD_ENTRY_TYPE, entry_type)
                .append_pair(tag::SYMBOL, symbol)
                .append_pair(tag::MD_ENTRY_PX, price)
                .append_pair(tag::MD_ENTRY_SIZE, size);
        }
        replies.push(book);
        replies
    }
}

fn fill_report(report: &mut FixMessage, order: &RestingOrder) {
    report
        .append_pair(tag::ORDER_ID, &order.order_id)
        .append_pair(tag::CL_ORD_ID, &order.cl_ord_id)
        .append_pair(tag::SYMBOL, &order.symbol)
        .append_pair(tag::SIDE, &order.side)
        .append_pair(tag::ORDER_QTY, &order.qty)
        .append_pair(tag::PRICE, &order.price)
        .append_pair(tag::LEAVES_QTY, &order.qty)
        .append_pair(tag::TRANSACT_TIME, &order.transact_time);
}

/// Stamp the session header on `reply` and write it; false once the peer is gone.
async fn send(stream: &mut TcpStream, request: &FixMessage, mut reply: FixMessage, seq: &mut u64) -> bool {
    reply
        .append_header(tag::MSG_SEQ_NUM, *seq)
        .append_header(tag::SENDER_COMP_ID, request.get(tag::TARGET_COMP_ID).unwrap_or("ERISX"))
        .append_header(tag::TARGET_COMP_ID, request.get(tag::SENDER_COMP_ID).unwrap_or("CLIENT"))
        .append_utc_timestamp_header(tag::SENDING_TIME);
    *seq += 1;
    let (result, _) = stream.write_all(reply.encode()).await;
    result.is_ok()
}

/// Trading volume only, no bid or offer entries.
fn statistics_refresh(request: &FixMessage) -> FixMessage {
    let mut stats = FixMessage::new(request.begin_string(), msg_type::MARKET_DATA_INCREMENTAL);
    stats
        .append_pair(tag::MD_REQ_ID, request.get(tag::MD_REQ_ID).unwrap_or_default())
        .append_pair(tag::NO_MD_ENTRIES, 1)
        .append_pair(tag::MD_UPDATE_ACTION, 0)
        .append_pair(tag::MD_ENTRY_TYPE, "B")
        .append_pair(tag::SYMBOL, request.get(tag::SYMBOL).unwrap_or_default())
        .append_pair(tag::MD_ENTRY_SIZE, "12.5");
    stats
}
