//! FIX session engine
//!
//! One `FixEngine` drives one FIX session over one socket. After logon
//! three tasks run on the current monoio thread:
//!
//! - **writer** assigns MsgSeqNum in send order and owns the write half
//! - **reader** frames inbound bytes, answers session messages itself and
//!   hands application messages to the [`MessageRouter`]
//! - **heartbeat** sends Heartbeat / TestRequest when the line goes quiet
//!
//! Callers talk to the session through [`FixEngine::request`], which opens
//! a correlated queue before the request goes out, or through the
//! unsolicited queue with [`FixEngine::wait_for_response`].

use crate::errors::{ExchangeError, Result};
use crate::fix::message::FixMessage;
use crate::fix::parser::FixParser;
use crate::fix::router::{correlation_key, MessageRouter};
use crate::fix::tags::{msg_type, tag, FIX_44};
use crate::fix::transport::{self, FixReader, FixWriter, TlsSettings};
use flume::{Receiver, Sender};
use keeper_core::timing::fix_utc_timestamp;
use keeper_core::{log_error, log_fix, log_latency, nanos, PerfTimer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POSS_DUP_FLAG: u32 = 43;

/// Connection settings for one FIX session
#[derive(Debug, Clone)]
pub struct FixConfig {
    /// `host:port`
    pub endpoint: String,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub username: String,
    pub password: String,
    pub begin_string: String,
    /// HeartBtInt (108), seconds
    pub heartbeat_interval: u64,
    pub response_timeout: Duration,
    /// Bounds connect, each socket write and the logout handshake
    pub write_timeout: Duration,
    pub read_buffer_size: usize,
    pub tls: Option<TlsSettings>,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            sender_comp_id: String::new(),
            target_comp_id: String::new(),
            username: String::new(),
            password: String::new(),
            begin_string: FIX_44.to_string(),
            heartbeat_interval: 3,
            response_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            read_buffer_size: 4096,
            tls: None,
        }
    }
}

impl FixConfig {
    pub fn new(endpoint: impl Into<String>, sender_comp_id: impl Into<String>, target_comp_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_begin_string(mut self, begin_string: impl Into<String>) -> Self {
        self.begin_string = begin_string.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval = seconds;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_tls(mut self, tls: Option<TlsSettings>) -> Self {
        self.tls = tls;
        self
    }

    pub fn session_id(&self) -> String {
        format!("{}->{}", self.sender_comp_id, self.target_comp_id)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ExchangeError::ConfigurationError("FIX endpoint is empty".to_string()));
        }
        if self.sender_comp_id.is_empty() || self.target_comp_id.is_empty() {
            return Err(ExchangeError::ConfigurationError("SenderCompID and TargetCompID are required".to_string()));
        }
        if self.heartbeat_interval == 0 {
            return Err(ExchangeError::ConfigurationError("heartbeat interval must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixConnectionState {
    Unknown,
    Disconnected,
    Connected,
    LoggedIn,
    LoggedOut,
}

impl std::fmt::Display for FixConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FixConnectionState::Unknown => "UNKNOWN",
            FixConnectionState::Disconnected => "DISCONNECTED",
            FixConnectionState::Connected => "CONNECTED",
            FixConnectionState::LoggedIn => "LOGGED_IN",
            FixConnectionState::LoggedOut => "LOGGED_OUT",
        };
        f.write_str(name)
    }
}

enum AdminEvent {
    Logon,
    Logout(FixMessage),
    Disconnected,
}

enum WriterCommand {
    Send(FixMessage),
    /// SequenceReset-GapFill answering a ResendRequest from `begin_seq_no`
    GapFill { begin_seq_no: u64 },
    Flush,
    Shutdown,
}

/// State shared between the engine handle and its session tasks.
struct Session {
    config: FixConfig,
    session_id: String,
    state: Mutex<FixConnectionState>,
    router: MessageRouter,
    generation: AtomicU64,
    next_outbound: AtomicU64,
    expected_inbound: AtomicU64,
    inbound_gaps: AtomicU64,
    last_sent: AtomicU64,
    last_received: AtomicU64,
    test_request_pending: AtomicBool,
    logout_initiated: AtomicBool,
    admin_tx: Sender<AdminEvent>,
    admin_rx: Receiver<AdminEvent>,
}

impl Session {
    fn state(&self) -> FixConnectionState {
        self.state.lock().map(|s| *s).unwrap_or(FixConnectionState::Unknown)
    }

    fn set_state(&self, new_state: FixConnectionState) {
        if let Ok(mut state) = self.state.lock() {
            if *state != new_state {
                debug!("{} state {} -> {}", self.session_id, *state, new_state);
                *state = new_state;
            }
        }
    }

    fn create_message(&self, mt: &str) -> FixMessage {
        let mut msg = FixMessage::new(&self.config.begin_string, mt);
        msg.append_header(tag::SENDER_COMP_ID, &self.config.sender_comp_id)
            .append_header(tag::TARGET_COMP_ID, &self.config.target_comp_id)
            .append_utc_timestamp_header(tag::SENDING_TIME);
        msg
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn reset_for_connection(&self) {
        self.next_outbound.store(1, Ordering::SeqCst);
        self.expected_inbound.store(1, Ordering::SeqCst);
        self.inbound_gaps.store(0, Ordering::SeqCst);
        let now = nanos();
        self.last_sent.store(now, Ordering::SeqCst);
        self.last_received.store(now, Ordering::SeqCst);
        self.test_request_pending.store(false, Ordering::SeqCst);
        self.logout_initiated.store(false, Ordering::SeqCst);
        self.router.reopen();
        while self.admin_rx.try_recv().is_ok() {}
    }

    fn on_disconnect(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        if self.state() != FixConnectionState::LoggedOut {
            warn!("🔌 {} disconnected", self.session_id);
            self.set_state(FixConnectionState::Disconnected);
        }
        self.router.close();
        let _ = self.admin_tx.send(AdminEvent::Disconnected);
    }

    async fn wait_admin(&self, timeout: Duration, accept: impl Fn(&AdminEvent) -> bool) -> Option<AdminEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match monoio::time::timeout(remaining, self.admin_rx.recv_async()).await {
                Ok(Ok(event)) if accept(&event) => return Some(event),
                Ok(Ok(_)) => continue,
                _ => return None,
            }
        }
    }

    fn check_inbound_seq(&self, msg: &FixMessage) {
        let Some(seq) = msg.seq_num() else {
            warn!("{} inbound {} without MsgSeqNum", self.session_id, msg.msg_type());
            return;
        };
        if msg.get(tag::RESET_SEQ_NUM_FLAG) == Some("Y") {
            // the Logon that requested the reset consumed outbound number 1
            debug!("{} resetting sequence numbers", self.session_id);
            self.next_outbound.store(2, Ordering::SeqCst);
            self.expected_inbound.store(seq + 1, Ordering::SeqCst);
            return;
        }
        if msg.msg_type() == msg_type::SEQUENCE_RESET {
            return;
        }

        let expected = self.expected_inbound.load(Ordering::SeqCst);
        if seq > expected {
            warn!("{} inbound sequence gap: expected {}, received {}", self.session_id, expected, seq);
            self.inbound_gaps.fetch_add(1, Ordering::SeqCst);
        } else if seq < expected {
            warn!("{} inbound MsgSeqNum {} lower than expected {}", self.session_id, seq, expected);
            return;
        }
        self.expected_inbound.store(seq + 1, Ordering::SeqCst);
    }

    fn handle_inbound(&self, msg: FixMessage, writer_tx: &Sender<WriterCommand>) {
        self.last_received.store(nanos(), Ordering::SeqCst);
        self.test_request_pending.store(false, Ordering::SeqCst);
        self.check_inbound_seq(&msg);

        match msg.msg_type() {
            msg_type::LOGON => {
                info!("✅ {} logged in", self.session_id);
                self.set_state(FixConnectionState::LoggedIn);
                let _ = self.admin_tx.send(AdminEvent::Logon);
            }
            msg_type::HEARTBEAT => {}
            msg_type::TEST_REQUEST => {
                let mut heartbeat = self.create_message(msg_type::HEARTBEAT);
                if let Some(id) = msg.get(tag::TEST_REQ_ID) {
                    heartbeat.append_pair(tag::TEST_REQ_ID, id);
                }
                let _ = writer_tx.send(WriterCommand::Send(heartbeat));
            }
            msg_type::RESEND_REQUEST => {
                let begin_seq_no = msg.get_parsed::<u64>(tag::BEGIN_SEQ_NO).unwrap_or(1).max(1);
                warn!("{} resend requested from {}, answering with gap fill", self.session_id, begin_seq_no);
                let _ = writer_tx.send(WriterCommand::GapFill { begin_seq_no });
            }
            msg_type::SEQUENCE_RESET => match msg.get_parsed::<u64>(tag::NEW_SEQ_NO) {
                Some(new_seq_no) => {
                    debug!("{} next inbound MsgSeqNum set to {}", self.session_id, new_seq_no);
                    self.expected_inbound.store(new_seq_no, Ordering::SeqCst);
                }
                None => warn!("{} SequenceReset without NewSeqNo", self.session_id),
            },
            msg_type::LOGOUT => {
                if !self.logout_initiated.load(Ordering::SeqCst) {
                    warn!(
                        "{} counterparty logged out: {}",
                        self.session_id,
                        msg.get(tag::TEXT).unwrap_or("no reason given")
                    );
                    let _ = writer_tx.send(WriterCommand::Send(self.create_message(msg_type::LOGOUT)));
                    let _ = writer_tx.send(WriterCommand::Shutdown);
                }
                self.set_state(FixConnectionState::LoggedOut);
                let _ = self.admin_tx.send(AdminEvent::Logout(msg));
            }
            _ => self.router.route(msg),
        }
    }

    async fn send(&self, writer: &mut FixWriter, msg: &FixMessage) -> Result<()> {
        let bytes = msg.encode();
        if msg.get(tag::PASSWORD).is_some() || msg.get(tag::NEW_PASSWORD).is_some() {
            log_fix!("→", &self.session_id, &redacted(msg).encode());
        } else {
            log_fix!("→", &self.session_id, &bytes);
        }
        monoio::time::timeout(self.config.write_timeout, writer.write_all(bytes))
            .await
            .map_err(|_| ExchangeError::Timeout(format!("{} write", self.session_id)))??;
        self.last_sent.store(nanos(), Ordering::SeqCst);
        Ok(())
    }
}

fn redacted(msg: &FixMessage) -> FixMessage {
    let mut shown = msg.clone();
    for secret in [tag::PASSWORD, tag::NEW_PASSWORD] {
        if shown.get(secret).is_some() {
            shown.remove(secret);
            shown.append_pair(secret, "****");
        }
    }
    shown
}

fn log_rejection(session_id: &str, msg: &FixMessage) {
    let text = msg.get(tag::TEXT).unwrap_or("");
    if let Some(code) = msg.get(tag::CXL_REJ_REASON) {
        warn!("{} order cancellation rejected due to {:?}, tag 102 code: {}", session_id, text, code);
    } else if let Some(code) = msg.get(tag::ORD_REJ_REASON) {
        warn!("{} order placement rejected due to {:?}, tag 103 code: {}", session_id, text, code);
    } else if msg_type::is_reject(msg.msg_type()) {
        warn!("{} {} reject received: {:?}", session_id, msg.msg_type(), text);
    }
}

async fn run_writer(session: Arc<Session>, mut writer: FixWriter, rx: Receiver<WriterCommand>, generation: u64) {
    while let Ok(command) = rx.recv_async().await {
        let result = match command {
            WriterCommand::Send(mut msg) => {
                let seq = session.next_outbound.fetch_add(1, Ordering::SeqCst);
                msg.set_header(tag::MSG_SEQ_NUM, seq)
                    .set_header(tag::SENDING_TIME, fix_utc_timestamp(chrono::Utc::now()));
                session.router.record_outbound(seq, correlation_key(&msg));
                session.send(&mut writer, &msg).await
            }
            WriterCommand::GapFill { begin_seq_no } => {
                let mut msg = session.create_message(msg_type::SEQUENCE_RESET);
                msg.set_header(tag::MSG_SEQ_NUM, begin_seq_no)
                    .append_header(POSS_DUP_FLAG, "Y")
                    .append_pair(tag::GAP_FILL_FLAG, "Y")
                    .append_pair(tag::NEW_SEQ_NO, session.next_outbound.load(Ordering::SeqCst));
                session.send(&mut writer, &msg).await
            }
            WriterCommand::Flush => writer.flush_tls().await,
            WriterCommand::Shutdown => {
                if let Err(e) = writer.shutdown().await {
                    debug!("{} socket shutdown: {}", session.session_id, e);
                }
                break;
            }
        };
        if let Err(e) = result {
            error!("❌ {} write failed: {}", session.session_id, e);
            session.on_disconnect(generation);
            break;
        }
    }
    debug!("{} writer stopped", session.session_id);
}

async fn run_reader(session: Arc<Session>, mut reader: FixReader, writer_tx: Sender<WriterCommand>, generation: u64) {
    let mut parser = FixParser::new();
    loop {
        match reader.read().await {
            Ok(Some(bytes)) => {
                if reader.tls_wants_write() {
                    let _ = writer_tx.send(WriterCommand::Flush);
                }
                parser.append_buffer(&bytes);
                loop {
                    match parser.get_message() {
                        Ok(Some(msg)) => {
                            log_fix!("←", &session.session_id, &msg.encode());
                            session.handle_inbound(msg, &writer_tx);
                        }
                        Ok(None) => break,
                        Err(e) => warn!("{} dropped inbound frame: {}", session.session_id, e),
                    }
                }
            }
            Ok(None) => {
                info!("{} connection closed by counterparty", session.session_id);
                break;
            }
            Err(e) => {
                if session.is_current(generation) && session.state() != FixConnectionState::LoggedOut {
                    error!("❌ {} read failed: {}", session.session_id, e);
                }
                break;
            }
        }
    }
    session.on_disconnect(generation);
    let _ = writer_tx.send(WriterCommand::Shutdown);
}

/// `(heartbeat after, test request after)` in nanoseconds and the check period.
fn heartbeat_timing(heartbeat_interval: u64) -> (u64, u64, Duration) {
    let interval = heartbeat_interval.saturating_mul(1_000_000_000);
    let test_request_after = interval.saturating_add(interval / 5);
    let tick = Duration::from_millis((heartbeat_interval.saturating_mul(1000) / 4).clamp(50, 1000));
    (interval, test_request_after, tick)
}

async fn run_heartbeat(session: Arc<Session>, writer_tx: Sender<WriterCommand>, generation: u64) {
    let (interval, test_request_after, tick) = heartbeat_timing(session.config.heartbeat_interval);

    loop {
        monoio::time::sleep(tick).await;
        if writer_tx.is_disconnected() || !session.is_current(generation) {
            break;
        }
        if session.state() != FixConnectionState::LoggedIn {
            continue;
        }

        let now = nanos();
        if now.saturating_sub(session.last_sent.load(Ordering::SeqCst)) >= interval {
            session.last_sent.store(now, Ordering::SeqCst);
            let _ = writer_tx.send(WriterCommand::Send(session.create_message(msg_type::HEARTBEAT)));
        }
        if now.saturating_sub(session.last_received.load(Ordering::SeqCst)) >= test_request_after
            && !session.test_request_pending.swap(true, Ordering::SeqCst)
        {
            warn!("{} no inbound traffic for {}s, sending TestRequest", session.session_id, test_request_after / 1_000_000_000);
            let mut test_request = session.create_message(msg_type::TEST_REQUEST);
            test_request.append_pair(tag::TEST_REQ_ID, format!("TEST-{}", now / 1_000_000));
            let _ = writer_tx.send(WriterCommand::Send(test_request));
        }
    }
    debug!("{} heartbeat stopped", session.session_id);
}

async fn recv_within(rx: &Receiver<FixMessage>, timeout: Duration, what: &str) -> Result<FixMessage> {
    match monoio::time::timeout(timeout, rx.recv_async()).await {
        Ok(Ok(msg)) => Ok(msg),
        Ok(Err(_)) => Err(ExchangeError::SessionClosed(format!("session ended while waiting for {what}"))),
        Err(_) => Err(ExchangeError::Timeout(format!("no {what} within {timeout:?}"))),
    }
}

/// Wait on `rx` until a message of one of `types`, or a reject, arrives.
async fn wait_on_queue(
    session_id: &str,
    rx: &Receiver<FixMessage>,
    types: &[&str],
    timeout: Duration,
) -> Result<FixMessage> {
    let what = format!("35={}", types.join("/"));
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let msg = recv_within(rx, remaining, &what).await?;
        if msg_type::is_reject(msg.msg_type()) {
            log_rejection(session_id, &msg);
            return Ok(msg);
        }
        if types.contains(&msg.msg_type()) {
            log_rejection(session_id, &msg);
            return Ok(msg);
        }
        debug!("{} skipping 35={} while waiting for {}", session_id, msg.msg_type(), what);
    }
}

/// A request's correlated response queue; unregistered on drop.
pub struct PendingResponse {
    key: String,
    rx: Receiver<FixMessage>,
    timeout: Duration,
    session: Arc<Session>,
}

impl PendingResponse {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Next correlated message, whatever its type.
    pub async fn next(&self) -> Result<FixMessage> {
        recv_within(&self.rx, self.timeout, &format!("response to {}", self.key)).await
    }

    /// Like [`next`](Self::next), bounded by `deadline` instead of the timeout.
    pub async fn next_before(&self, deadline: Instant) -> Result<FixMessage> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        recv_within(&self.rx, remaining, &format!("response to {}", self.key)).await
    }

    pub async fn wait_for(&self, types: &[&str]) -> Result<FixMessage> {
        wait_on_queue(&self.session.session_id, &self.rx, types, self.timeout).await
    }

    /// Already delivered messages, without waiting.
    pub fn try_next(&self) -> Option<FixMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.session.router.unregister(&self.key);
    }
}

pub struct FixEngine {
    session: Arc<Session>,
    writer_tx: Mutex<Option<Sender<WriterCommand>>>,
}

impl FixEngine {
    pub fn new(config: FixConfig) -> Self {
        let (admin_tx, admin_rx) = flume::unbounded();
        let session_id = config.session_id();
        Self {
            session: Arc::new(Session {
                config,
                session_id,
                state: Mutex::new(FixConnectionState::Disconnected),
                router: MessageRouter::new(),
                generation: AtomicU64::new(0),
                next_outbound: AtomicU64::new(1),
                expected_inbound: AtomicU64::new(1),
                inbound_gaps: AtomicU64::new(0),
                last_sent: AtomicU64::new(0),
                last_received: AtomicU64::new(0),
                test_request_pending: AtomicBool::new(false),
                logout_initiated: AtomicBool::new(false),
                admin_tx,
                admin_rx,
            }),
            writer_tx: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FixConfig {
        &self.session.config
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn state(&self) -> FixConnectionState {
        self.session.state()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == FixConnectionState::LoggedIn
    }

    /// MsgSeqNum the next outbound message will carry.
    pub fn next_outbound_seq(&self) -> u64 {
        self.session.next_outbound.load(Ordering::SeqCst)
    }

    pub fn expected_inbound_seq(&self) -> u64 {
        self.session.expected_inbound.load(Ordering::SeqCst)
    }

    /// Inbound sequence gaps seen on the current connection.
    pub fn inbound_gap_count(&self) -> u64 {
        self.session.inbound_gaps.load(Ordering::SeqCst)
    }

    /// New message with BeginString, MsgType, SenderCompID, TargetCompID
    /// and SendingTime filled in.
    pub fn create_message(&self, mt: &str) -> Result<FixMessage> {
        if mt.is_empty() || mt.len() > 2 {
            return Err(ExchangeError::MalformedMessage(format!("MsgType must be 1-2 characters, got {mt:?}")));
        }
        Ok(self.session.create_message(mt))
    }

    fn writer(&self) -> Option<Sender<WriterCommand>> {
        self.writer_tx.lock().ok().and_then(|guard| guard.clone())
    }

    /// Connect and log on; returns once the counterparty's Logon arrives.
    pub async fn logon(&self) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        self.session.config.validate()?;
        let config = &self.session.config;
        info!("🔗 {} connecting to {}", self.session.session_id, config.endpoint);
        let timer = PerfTimer::start("fix_logon");

        let (reader, writer) =
            transport::connect(&config.endpoint, config.tls.as_ref(), config.write_timeout, config.read_buffer_size)
                .await?;

        let generation = self.session.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.session.reset_for_connection();
        self.session.set_state(FixConnectionState::Connected);

        let (tx, rx) = flume::unbounded();
        if let Ok(mut guard) = self.writer_tx.lock() {
            *guard = Some(tx.clone());
        }
        monoio::spawn(run_writer(self.session.clone(), writer, rx, generation));
        monoio::spawn(run_reader(self.session.clone(), reader, tx.clone(), generation));
        monoio::spawn(run_heartbeat(self.session.clone(), tx.clone(), generation));

        let mut logon = self.session.create_message(msg_type::LOGON);
        logon
            .append_pair(tag::ENCRYPT_METHOD, 0)
            .append_pair(tag::HEART_BT_INT, config.heartbeat_interval)
            .append_pair(tag::RESET_SEQ_NUM_FLAG, "Y")
            .append_pair(tag::USERNAME, &config.username)
            .append_pair(tag::PASSWORD, &config.password);
        tx.send(WriterCommand::Send(logon))
            .map_err(|_| ExchangeError::SessionClosed("writer stopped before logon".to_string()))?;

        let event = self.session.wait_admin(config.response_timeout, |_| true).await;
        match event {
            Some(AdminEvent::Logon) => {
                log_latency!(format!("{} logon", self.session.session_id), timer.elapsed_micros());
                Ok(())
            }
            Some(AdminEvent::Logout(msg)) => {
                let _ = tx.send(WriterCommand::Shutdown);
                let reason = msg.get(tag::TEXT).unwrap_or("logout received instead of logon").to_string();
                log_error!(format!("{} logon", self.session.session_id), &reason);
                Err(ExchangeError::LogonRejected(reason))
            }
            Some(AdminEvent::Disconnected) => Err(ExchangeError::SessionClosed(format!(
                "{} closed during logon",
                config.endpoint
            ))),
            None => {
                let _ = tx.send(WriterCommand::Shutdown);
                self.session.generation.fetch_add(1, Ordering::SeqCst);
                self.session.set_state(FixConnectionState::Disconnected);
                self.session.router.close();
                Err(ExchangeError::Timeout(format!("no Logon from {} within {:?}", config.endpoint, config.response_timeout)))
            }
        }
    }

    /// Queue a message; MsgSeqNum is assigned when it is written.
    pub fn write(&self, msg: FixMessage) -> Result<()> {
        let tx = self
            .writer()
            .ok_or_else(|| ExchangeError::NotLoggedIn(self.session.session_id.clone()))?;
        tx.send(WriterCommand::Send(msg))
            .map_err(|_| ExchangeError::SessionClosed(self.session.session_id.clone()))
    }

    /// Open the response queue for `key`, then send `msg`.
    pub fn request(&self, msg: FixMessage, key: impl Into<String>) -> Result<PendingResponse> {
        if !self.is_logged_in() {
            return Err(ExchangeError::NotLoggedIn(format!("{} is {}", self.session.session_id, self.state())));
        }
        let key = key.into();
        let rx = self.session.router.register(key.clone());
        let pending = PendingResponse {
            key,
            rx,
            timeout: self.session.config.response_timeout,
            session: self.session.clone(),
        };
        self.write(msg)?;
        Ok(pending)
    }

    /// Next unsolicited message of type `mt`, or a reject.
    pub async fn wait_for_response(&self, mt: &str) -> Result<FixMessage> {
        debug!("{} waiting for 35={} response", self.session.session_id, mt);
        let rx = self.session.router.unsolicited();
        wait_on_queue(&self.session.session_id, &rx, &[mt], self.session.config.response_timeout).await
    }

    /// ExecutionReports answering an OrderMassStatusRequest, up to the one
    /// flagged LastRptRequested. A reject ends the collection early.
    pub async fn wait_for_get_orders_response(&self, pending: &PendingResponse) -> Result<Vec<FixMessage>> {
        debug!("{} waiting for 35=8 order mass status response", self.session.session_id);
        let mut reports = Vec::new();
        loop {
            let msg = pending.next().await?;
            if msg_type::is_reject(msg.msg_type()) {
                log_rejection(&self.session.session_id, &msg);
                return Ok(reports);
            }
            if msg.msg_type() != msg_type::EXECUTION_REPORT {
                continue;
            }
            let last = msg.get(tag::LAST_RPT_REQUESTED) == Some("Y");
            reports.push(msg);
            if last {
                return Ok(reports);
            }
        }
    }

    /// Send Logout, wait briefly for the reply and close the socket. The
    /// state is `LoggedOut` afterwards whatever happens on the wire.
    pub async fn logout(&self) -> Result<()> {
        let tx = self.writer_tx.lock().ok().and_then(|mut guard| guard.take());
        if let Some(tx) = tx {
            let state = self.state();
            if matches!(state, FixConnectionState::LoggedIn | FixConnectionState::Connected) {
                self.session.logout_initiated.store(true, Ordering::SeqCst);
                let logout = self.session.create_message(msg_type::LOGOUT);
                if tx.send(WriterCommand::Send(logout)).is_ok() {
                    let reply = self
                        .session
                        .wait_admin(self.session.config.write_timeout, |e| {
                            matches!(e, AdminEvent::Logout(_) | AdminEvent::Disconnected)
                        })
                        .await;
                    match reply {
                        Some(AdminEvent::Logout(_)) => info!("👋 {} logged out", self.session.session_id),
                        Some(_) => debug!("{} closed before Logout reply", self.session.session_id),
                        None => warn!("{} no Logout reply within {:?}", self.session.session_id, self.session.config.write_timeout),
                    }
                }
            }
            let _ = tx.send(WriterCommand::Shutdown);
        }
        self.session.set_state(FixConnectionState::LoggedOut);
        self.session.router.close();
        Ok(())
    }
}
