//! Exchange and FIX session errors

use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Exchange operation errors
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session not logged in: {0}")]
    NotLoggedIn(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Logon rejected: {0}")]
    LogonRejected(String),

    #[error("Malformed FIX message: {0}")]
    MalformedMessage(String),

    #[error("Checksum mismatch: expected {expected:03}, computed {computed:03}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("Missing field {tag} in {msg_type} message")]
    MissingField { tag: u32, msg_type: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Order rejected ({reason}): {text}")]
    OrderRejected { reason: OrdRejReason, text: String },

    #[error("Business message reject for {ref_msg_type}: {text}")]
    BusinessReject { ref_msg_type: String, text: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Fixed point error: {0}")]
    FixedPointError(String),
}

impl From<keeper_core::WadError> for ExchangeError {
    fn from(err: keeper_core::WadError) -> Self {
        Self::FixedPointError(err.to_string())
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<rustls::Error> for ExchangeError {
    fn from(err: rustls::Error) -> Self {
        Self::TlsError(err.to_string())
    }
}

/// OrdRejReason (tag 103)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdRejReason {
    BrokerOption = 0,
    UnknownSymbol = 1,
    ExchangeClosed = 2,
    OrderExceedsLimit = 3,
    TooLateToEnter = 4,
    UnknownOrder = 5,
    DuplicateOrder = 6,
    DuplicateVerballyCommunicated = 7,
    StaleOrder = 8,
    TradeAlongRequired = 9,
    InvalidInvestorId = 10,
    UnsupportedOrderCharacteristic = 11,
    IncorrectQuantity = 13,
    IncorrectAllocatedQuantity = 14,
    UnknownAccount = 15,
    Other = 99,
    /// No reason code on the message
    Unspecified = -1,
}

impl From<u16> for OrdRejReason {
    fn from(code: u16) -> Self {
        match code {
            0 => OrdRejReason::BrokerOption,
            1 => OrdRejReason::UnknownSymbol,
            2 => OrdRejReason::ExchangeClosed,
            3 => OrdRejReason::OrderExceedsLimit,
            4 => OrdRejReason::TooLateToEnter,
            5 => OrdRejReason::UnknownOrder,
            6 => OrdRejReason::DuplicateOrder,
            7 => OrdRejReason::DuplicateVerballyCommunicated,
            8 => OrdRejReason::StaleOrder,
            9 => OrdRejReason::TradeAlongRequired,
            10 => OrdRejReason::InvalidInvestorId,
            11 => OrdRejReason::UnsupportedOrderCharacteristic,
            13 => OrdRejReason::IncorrectQuantity,
            14 => OrdRejReason::IncorrectAllocatedQuantity,
            15 => OrdRejReason::UnknownAccount,
            _ => OrdRejReason::Other,
        }
    }
}

impl OrdRejReason {
    /// Reason from the raw tag value; absent or unparsable maps to `Unspecified`.
    pub fn from_field(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<u16>().ok())
            .map(Self::from)
            .unwrap_or(OrdRejReason::Unspecified)
    }
}

impl std::fmt::Display for OrdRejReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// CxlRejReason (tag 102)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CxlRejReason {
    TooLateToCancel = 0,
    UnknownOrder = 1,
    BrokerOption = 2,
    AlreadyPendingCancel = 3,
    Other = 99,
    Unspecified = -1,
}

impl From<u16> for CxlRejReason {
    fn from(code: u16) -> Self {
        match code {
            0 => CxlRejReason::TooLateToCancel,
            1 => CxlRejReason::UnknownOrder,
            2 => CxlRejReason::BrokerOption,
            3 => CxlRejReason::AlreadyPendingCancel,
            _ => CxlRejReason::Other,
        }
    }
}

impl CxlRejReason {
    pub fn from_field(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<u16>().ok())
            .map(Self::from)
            .unwrap_or(CxlRejReason::Unspecified)
    }
}

impl std::fmt::Display for CxlRejReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
