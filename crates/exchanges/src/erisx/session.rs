//! ErisX flavour of the FIX session

use crate::fix::{FixConfig, FixEngine, TlsSettings};
use std::ops::Deref;

pub const ERISX_TARGET_COMP_ID: &str = "ERISX";
pub const ERISX_BEGIN_STRING: &str = "FIX.4.4";
pub const ERISX_HEARTBEAT_INTERVAL: u64 = 10;

/// A [`FixEngine`] addressed to ErisX.
pub struct ErisxFix {
    engine: FixEngine,
}

impl ErisxFix {
    /// Session settings ErisX expects: TargetCompID `ERISX`, FIX 4.4 and a
    /// 10 second heartbeat.
    pub fn fix_config(
        endpoint: &str,
        sender_comp_id: &str,
        username: &str,
        password: &str,
        tls: Option<TlsSettings>,
    ) -> FixConfig {
        FixConfig::new(endpoint, sender_comp_id, ERISX_TARGET_COMP_ID)
            .with_credentials(username, password)
            .with_begin_string(ERISX_BEGIN_STRING)
            .with_heartbeat_interval(ERISX_HEARTBEAT_INTERVAL)
            .with_tls(tls)
    }

    pub fn new(endpoint: &str, sender_comp_id: &str, username: &str, password: &str, tls: Option<TlsSettings>) -> Self {
        Self::with_config(Self::fix_config(endpoint, sender_comp_id, username, password, tls))
    }

    pub fn with_config(config: FixConfig) -> Self {
        Self {
            engine: FixEngine::new(config),
        }
    }

    pub fn engine(&self) -> &FixEngine {
        &self.engine
    }
}

impl Deref for ErisxFix {
    type Target = FixEngine;

    fn deref(&self) -> &FixEngine {
        &self.engine
    }
}
