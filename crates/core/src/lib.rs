//! # keeper-core
//!
//! Primitives shared by the keeper exchange bindings:
//!
//! 1. **Single-threaded async with monoio** - one runtime thread per set of sessions
//! 2. **Fixed-point amounts** - 18-decimal `Wad`s for prices and quantities
//! 3. **FIX time formats** - `UTCTimestamp` formatting and parsing
//! 4. **Request ids** - collision-free ClOrdIDs and correlation ids
//! 5. **Unified logging** - tracing, optionally through ftlog

pub mod id_gen;
pub mod logging;
pub mod runtime;
pub mod timing;
pub mod wad;

pub use id_gen::{generate_id, ClientOrderId, RequestId};
pub use logging::init_logging;
pub use runtime::KeeperRuntime;
pub use timing::{nanos, PerfTimer, Timestamp};
pub use wad::{Wad, WadError};

pub mod prelude {
    pub use crate::id_gen::{generate_id, generate_id_with_prefix, ClientOrderId, RequestId};
    pub use crate::logging::init_logging;
    pub use crate::runtime::{run_keeper, KeeperRuntime, RuntimeConfig};
    pub use crate::timing::{fix_utc_timestamp, nanos, parse_fix_timestamp, PerfTimer, Timestamp};
    pub use crate::wad::{Wad, WadError};

    pub use chrono::{DateTime, Utc};
    pub use monoio;
    pub use serde::{Deserialize, Serialize};
}
