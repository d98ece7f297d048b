//! ErisX connection settings

use crate::errors::{ExchangeError, Result};
use crate::fix::TlsSettings;
use std::collections::HashMap;
use std::time::Duration;

pub const ENV_TRADING_ENDPOINT: &str = "ERISX_FIX_TRADING_ENDPOINT";
pub const ENV_TRADING_USER: &str = "ERISX_FIX_TRADING_USER";
pub const ENV_MARKETDATA_ENDPOINT: &str = "ERISX_FIX_MARKETDATA_ENDPOINT";
pub const ENV_MARKETDATA_USER: &str = "ERISX_FIX_MARKETDATA_USER";
pub const ENV_PASSWORD: &str = "ERISX_PASSWORD";
pub const ENV_CERTS: &str = "ERISX_CERTS";

/// ErisX client configuration
///
/// A session is opened for each endpoint that has a user; both share the
/// password and client certificate.
#[derive(Debug, Clone)]
pub struct ErisxConfig {
    pub fix_trading_endpoint: Option<String>,
    pub fix_trading_user: Option<String>,
    pub fix_marketdata_endpoint: Option<String>,
    pub fix_marketdata_user: Option<String>,
    pub password: String,
    /// `certfile=...,keyfile=...[,ca_certs=...]`
    pub certs: Option<String>,
    pub response_timeout: Duration,
    pub heartbeat_interval: u64,
}

impl Default for ErisxConfig {
    fn default() -> Self {
        Self {
            fix_trading_endpoint: None,
            fix_trading_user: None,
            fix_marketdata_endpoint: None,
            fix_marketdata_user: None,
            password: String::new(),
            certs: None,
            response_timeout: Duration::from_secs(30),
            heartbeat_interval: 10,
        }
    }
}

impl ErisxConfig {
    pub fn with_trading(mut self, endpoint: impl Into<String>, user: impl Into<String>) -> Self {
        self.fix_trading_endpoint = Some(endpoint.into());
        self.fix_trading_user = Some(user.into());
        self
    }

    pub fn with_marketdata(mut self, endpoint: impl Into<String>, user: impl Into<String>) -> Self {
        self.fix_marketdata_endpoint = Some(endpoint.into());
        self.fix_marketdata_user = Some(user.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_certs(mut self, certs: Option<String>) -> Self {
        self.certs = certs;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval = seconds;
        self
    }

    /// Read `ERISX_*` variables. The trading endpoint, trading user and
    /// password are required; market data and certificates are optional.
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| ExchangeError::MissingCredentials(name.to_string()))
        };
        let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut config = Self::default()
            .with_password(required(ENV_PASSWORD)?)
            .with_trading(required(ENV_TRADING_ENDPOINT)?, required(ENV_TRADING_USER)?)
            .with_certs(optional(ENV_CERTS));
        config.fix_marketdata_endpoint = optional(ENV_MARKETDATA_ENDPOINT);
        config.fix_marketdata_user = optional(ENV_MARKETDATA_USER);
        Ok(config)
    }

    /// Client certificate settings, if a cert string was given.
    pub fn tls_settings(&self) -> Result<Option<TlsSettings>> {
        self.certs
            .as_deref()
            .map(|certs| TlsSettings::from_map(&parse_cert_string(certs)?))
            .transpose()
    }
}

/// `k=v,k=v` into a map. Blank pieces are ignored.
pub fn parse_cert_string(certs: &str) -> Result<HashMap<String, String>> {
    let mut parsed = HashMap::new();
    for piece in certs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = piece
            .split_once('=')
            .ok_or_else(|| ExchangeError::ConfigurationError(format!("cert string entry {piece:?} is not key=value")))?;
        parsed.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(parsed)
}
