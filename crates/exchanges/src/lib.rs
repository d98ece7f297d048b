//! # Keeper exchange bindings
//!
//! Venue connectivity for market-making keepers.
//!
//! ## Architecture
//!
//! - **FIX 4.4 session engine** - logon, heartbeats, sequence numbers and
//!   correlated request/response over plain TCP or TLS, on monoio
//! - **Unified interface** - every venue implements [`Exchange`] and speaks
//!   the shared [`Order`] / [`Trade`] model
//! - **Fixed-point arithmetic** - prices and amounts are [`keeper_core::Wad`]
//! - **ErisX** - order entry and market data over two FIX sessions

pub mod errors;
pub mod fix;
pub mod traits;
pub mod types;

#[cfg(feature = "erisx")]
pub mod erisx;

// Re-export main types
#[cfg(feature = "erisx")]
pub use erisx::{ErisxApi, ErisxConfig, ErisxFix};
pub use errors::{ExchangeError, Result};
pub use fix::{FixConfig, FixConnectionState, FixEngine, FixMessage};
pub use traits::Exchange;
pub use types::*;

/// Prelude for convenient imports
pub mod prelude {
    #[cfg(feature = "erisx")]
    pub use crate::erisx::{ErisxApi, ErisxConfig};
    pub use crate::errors::{ExchangeError, Result};
    pub use crate::fix::{FixConfig, FixEngine, FixMessage, TlsSettings};
    pub use crate::traits::Exchange;
    pub use crate::types::*;
    pub use keeper_core::prelude::*;
}
