//! Inbound application message demultiplexing.
//!
//! Each outstanding request owns a queue keyed by the correlation id it
//! carries; responses echo that id and land in the right queue. Anything
//! nobody waits for goes to the unsolicited queue.

use crate::fix::message::FixMessage;
use crate::fix::tags::{msg_type, tag};
use flume::{Receiver, Sender};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Tags that can carry a correlation id, in lookup order.
pub const CORRELATION_TAGS: [u32; 7] = [
    tag::MASS_STATUS_REQ_ID,
    tag::MD_REQ_ID,
    tag::SECURITY_REQ_ID,
    tag::USER_REQUEST_ID,
    tag::CL_ORD_ID,
    tag::ORIG_CL_ORD_ID,
    tag::BUSINESS_REJECT_REF_ID,
];

const MAX_TRACKED_SEQ_NUMS: usize = 4096;
/// Unsolicited messages kept for `wait_for_response`; the oldest go first.
pub const MAX_UNSOLICITED: usize = 1024;

/// First correlation id present on an outbound request.
pub fn correlation_key(msg: &FixMessage) -> Option<String> {
    CORRELATION_TAGS
        .iter()
        .find_map(|t| msg.get(*t))
        .map(str::to_string)
}

struct RouterState {
    queues: HashMap<String, Sender<FixMessage>>,
    seq_keys: HashMap<u64, String>,
    seq_order: VecDeque<u64>,
    unsolicited_tx: Option<Sender<FixMessage>>,
    unsolicited_rx: Receiver<FixMessage>,
}

pub struct MessageRouter {
    state: Mutex<RouterState>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(MAX_UNSOLICITED);
        Self {
            state: Mutex::new(RouterState {
                queues: HashMap::new(),
                seq_keys: HashMap::new(),
                seq_order: VecDeque::new(),
                unsolicited_tx: Some(tx),
                unsolicited_rx: rx,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RouterState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Open a queue for `key`. Re-registering replaces the previous queue.
    pub fn register(&self, key: impl Into<String>) -> Receiver<FixMessage> {
        let (tx, rx) = flume::unbounded();
        self.with_state(|state| state.queues.insert(key.into(), tx));
        rx
    }

    pub fn unregister(&self, key: &str) {
        self.with_state(|state| state.queues.remove(key));
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.with_state(|state| state.queues.contains_key(key))
    }

    /// Receiver of messages that matched no open queue.
    pub fn unsolicited(&self) -> Receiver<FixMessage> {
        self.with_state(|state| state.unsolicited_rx.clone())
    }

    /// Remember which correlation id went out under `seq`, so a session
    /// Reject quoting that RefSeqNum can be routed back.
    pub fn record_outbound(&self, seq: u64, key: Option<String>) {
        let Some(key) = key else {
            return;
        };
        self.with_state(|state| {
            state.seq_keys.insert(seq, key);
            state.seq_order.push_back(seq);
            while state.seq_order.len() > MAX_TRACKED_SEQ_NUMS {
                if let Some(old) = state.seq_order.pop_front() {
                    state.seq_keys.remove(&old);
                }
            }
        });
    }

    /// Deliver one inbound application message.
    pub fn route(&self, msg: FixMessage) {
        self.with_state(|state| {
            let mut candidates: Vec<String> = CORRELATION_TAGS
                .iter()
                .filter_map(|t| msg.get(*t))
                .map(str::to_string)
                .collect();
            if msg.msg_type() == msg_type::REJECT {
                if let Some(key) = msg
                    .get_parsed::<u64>(tag::REF_SEQ_NUM)
                    .and_then(|seq| state.seq_keys.get(&seq))
                {
                    candidates.insert(0, key.clone());
                }
            }

            let mut msg = msg;
            for key in candidates {
                let Some(tx) = state.queues.get(&key) else {
                    continue;
                };
                match tx.send(msg) {
                    Ok(()) => return,
                    Err(flume::SendError(returned)) => {
                        // waiter gave up; forget the queue and keep looking
                        state.queues.remove(&key);
                        msg = returned;
                    }
                }
            }

            let Some(tx) = &state.unsolicited_tx else {
                debug!("Router closed, dropping {} message", msg.msg_type());
                return;
            };
            match tx.try_send(msg) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(msg)) => {
                    if let Ok(old) = state.unsolicited_rx.try_recv() {
                        debug!("Unsolicited queue full, dropping oldest {} message", old.msg_type());
                    }
                    if tx.try_send(msg).is_err() {
                        debug!("Unsolicited queue full, dropping message");
                    }
                }
                Err(flume::TrySendError::Disconnected(_)) => debug!("Unsolicited queue closed, dropping message"),
            }
        });
    }

    /// Drop every queue so that waiters see the session end.
    pub fn close(&self) {
        self.with_state(|state| {
            state.queues.clear();
            state.seq_keys.clear();
            state.seq_order.clear();
            state.unsolicited_tx = None;
        });
    }

    /// Fresh unsolicited queue for a new connection.
    pub fn reopen(&self) {
        let (tx, rx) = flume::bounded(MAX_UNSOLICITED);
        self.with_state(|state| {
            state.queues.clear();
            state.seq_keys.clear();
            state.seq_order.clear();
            state.unsolicited_tx = Some(tx);
            state.unsolicited_rx = rx;
        });
    }
}
