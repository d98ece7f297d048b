//! FIX 4.4 session client
//!
//! - `message` / `parser`: codec and stream framing
//! - `transport`: plain TCP or rustls over monoio
//! - `router`: correlation of responses to requests
//! - `engine`: logon, heartbeats, sequence numbers, logout

pub mod engine;
pub mod message;
pub mod parser;
pub mod router;
pub mod tags;
pub mod transport;

pub use engine::{FixConfig, FixConnectionState, FixEngine, PendingResponse};
pub use message::{FixMessage, GroupEntry};
pub use parser::FixParser;
pub use router::MessageRouter;
pub use transport::TlsSettings;
