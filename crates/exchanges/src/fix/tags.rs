//! FIX 4.4 tags, message types and enumerated values used by the keeper.

pub const SOH: u8 = 0x01;

pub const FIX_44: &str = "FIX.4.4";

/// Field tags
pub mod tag {
    // Standard header / trailer
    pub const BEGIN_STRING: u32 = 8;
    pub const BODY_LENGTH: u32 = 9;
    pub const CHECKSUM: u32 = 10;
    pub const MSG_TYPE: u32 = 35;
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const SENDING_TIME: u32 = 52;
    pub const TARGET_COMP_ID: u32 = 56;

    // Session level
    pub const BEGIN_SEQ_NO: u32 = 7;
    pub const END_SEQ_NO: u32 = 16;
    pub const NEW_SEQ_NO: u32 = 36;
    pub const REF_SEQ_NUM: u32 = 45;
    pub const ENCRYPT_METHOD: u32 = 98;
    pub const HEART_BT_INT: u32 = 108;
    pub const TEST_REQ_ID: u32 = 112;
    pub const GAP_FILL_FLAG: u32 = 123;
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    pub const REF_TAG_ID: u32 = 371;
    pub const REF_MSG_TYPE: u32 = 372;
    pub const SESSION_REJECT_REASON: u32 = 373;
    pub const USERNAME: u32 = 553;
    pub const PASSWORD: u32 = 554;
    pub const TEXT: u32 = 58;

    // Orders and executions
    pub const CL_ORD_ID: u32 = 11;
    pub const CURRENCY: u32 = 15;
    pub const EXEC_INST: u32 = 18;
    pub const HANDL_INST: u32 = 21;
    pub const ORDER_ID: u32 = 37;
    pub const ORDER_QTY: u32 = 38;
    pub const ORD_STATUS: u32 = 39;
    pub const ORD_TYPE: u32 = 40;
    pub const ORIG_CL_ORD_ID: u32 = 41;
    pub const PRICE: u32 = 44;
    pub const SIDE: u32 = 54;
    pub const SYMBOL: u32 = 55;
    pub const TIME_IN_FORCE: u32 = 59;
    pub const TRANSACT_TIME: u32 = 60;
    pub const CXL_REJ_REASON: u32 = 102;
    pub const ORD_REJ_REASON: u32 = 103;
    pub const SECURITY_DESC: u32 = 107;
    pub const EXEC_TYPE: u32 = 150;
    pub const LEAVES_QTY: u32 = 151;
    pub const BUSINESS_REJECT_REF_ID: u32 = 379;
    pub const BUSINESS_REJECT_REASON: u32 = 380;
    pub const PRODUCT: u32 = 460;
    pub const MASS_STATUS_REQ_ID: u32 = 584;
    pub const MASS_STATUS_REQ_TYPE: u32 = 585;
    pub const TOT_NUM_REPORTS: u32 = 911;
    pub const LAST_RPT_REQUESTED: u32 = 912;

    // Securities
    pub const NO_RELATED_SYM: u32 = 146;
    pub const SECURITY_REQ_ID: u32 = 320;
    pub const SECURITY_LIST_REQUEST_TYPE: u32 = 559;
    pub const ROUND_LOT: u32 = 561;
    pub const MIN_TRADE_VOL: u32 = 562;
    pub const MIN_PRICE_INCREMENT: u32 = 969;
    pub const MAX_TRADE_VOL: u32 = 1140;

    // Market data
    pub const MD_REQ_ID: u32 = 262;
    pub const SUBSCRIPTION_REQUEST_TYPE: u32 = 263;
    pub const MARKET_DEPTH: u32 = 264;
    pub const MD_UPDATE_TYPE: u32 = 265;
    pub const AGGREGATED_BOOK: u32 = 266;
    pub const NO_MD_ENTRY_TYPES: u32 = 267;
    pub const NO_MD_ENTRIES: u32 = 268;
    pub const MD_ENTRY_TYPE: u32 = 269;
    pub const MD_ENTRY_PX: u32 = 270;
    pub const MD_ENTRY_SIZE: u32 = 271;
    pub const MD_UPDATE_ACTION: u32 = 279;
    pub const MD_REQ_REJ_REASON: u32 = 281;

    // User management
    pub const USER_REQUEST_ID: u32 = 923;
    pub const USER_REQUEST_TYPE: u32 = 924;
    pub const NEW_PASSWORD: u32 = 925;
    pub const USER_STATUS: u32 = 926;
    pub const USER_STATUS_TEXT: u32 = 927;
}

/// MsgType (35) values
pub mod msg_type {
    pub const HEARTBEAT: &str = "0";
    pub const TEST_REQUEST: &str = "1";
    pub const RESEND_REQUEST: &str = "2";
    pub const REJECT: &str = "3";
    pub const SEQUENCE_RESET: &str = "4";
    pub const LOGOUT: &str = "5";
    pub const EXECUTION_REPORT: &str = "8";
    pub const ORDER_CANCEL_REJECT: &str = "9";
    pub const LOGON: &str = "A";
    pub const NEW_ORDER_SINGLE: &str = "D";
    pub const ORDER_CANCEL_REQUEST: &str = "F";
    pub const MARKET_DATA_REQUEST: &str = "V";
    pub const MARKET_DATA_SNAPSHOT: &str = "W";
    pub const MARKET_DATA_INCREMENTAL: &str = "X";
    pub const MARKET_DATA_REQUEST_REJECT: &str = "Y";
    pub const BUSINESS_MESSAGE_REJECT: &str = "j";
    pub const SECURITY_LIST_REQUEST: &str = "x";
    pub const SECURITY_LIST: &str = "y";
    pub const ORDER_MASS_STATUS_REQUEST: &str = "AF";
    pub const USER_REQUEST: &str = "BE";
    pub const USER_RESPONSE: &str = "BF";

    /// Administrative messages handled by the session layer.
    ///
    /// A session Reject (3) is not in this list: it answers one of our
    /// requests, so it is routed like an application message.
    pub fn is_session(msg_type: &str) -> bool {
        matches!(msg_type, HEARTBEAT | TEST_REQUEST | RESEND_REQUEST | SEQUENCE_RESET | LOGOUT | LOGON)
    }

    /// Rejects that end a wait for any response type.
    pub fn is_reject(msg_type: &str) -> bool {
        matches!(msg_type, BUSINESS_MESSAGE_REJECT | ORDER_CANCEL_REJECT | REJECT)
    }
}

/// ExecType (150) values
pub mod exec_type {
    pub const NEW: &str = "0";
    pub const PARTIAL_FILL: &str = "1";
    pub const FILL: &str = "2";
    pub const CANCELED: &str = "4";
    pub const REPLACED: &str = "5";
    pub const PENDING_CANCEL: &str = "6";
    pub const REJECTED: &str = "8";
    pub const PENDING_NEW: &str = "A";
    pub const ORDER_STATUS: &str = "I";
}

/// OrdStatus (39) values
pub mod ord_status {
    pub const NEW: &str = "0";
    pub const PARTIALLY_FILLED: &str = "1";
    pub const FILLED: &str = "2";
    pub const CANCELED: &str = "4";
    pub const REJECTED: &str = "8";
}

/// MDEntryType (269) values
pub mod md_entry_type {
    pub const BID: &str = "0";
    pub const OFFER: &str = "1";
    pub const TRADE: &str = "2";
}

/// SubscriptionRequestType (263) values
pub mod subscription {
    pub const SNAPSHOT: &str = "0";
    pub const SNAPSHOT_AND_UPDATES: &str = "1";
    pub const UNSUBSCRIBE: &str = "2";
}

/// UserRequestType (924) / UserStatus (926) values
pub mod user {
    pub const REQUEST_CHANGE_PASSWORD: &str = "3";
    pub const STATUS_PASSWORD_CHANGED: &str = "5";
}
