//! Daily usage counters.
//!
//! Two interchangeable backends share the [`CounterStore`] contract:
//!
//! - **remote** - Upstash Redis REST, atomic `INCR` with a TTL
//! - **local** - process-wide map, used only while the remote is unavailable
//!
//! ## Key pattern
//!
//! ```text
//! tr:count:{visitor_id}:{YYYY-MM-DD}   -> count for that UTC day
//! ```

mod local;
mod remote;

pub use local::Local;
pub use remote::Remote;
use serde::Serialize;

use crate::prelude::*;

/// Which backend answered a counter request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  Remote,
  Local,
}

/// The store could not answer. Triggers the local fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("counter store unavailable")]
pub struct Unavailable;

#[async_trait]
pub trait CounterStore: Send + Sync {
  async fn get(&self, key: &str) -> Result<u64, Unavailable>;

  /// Atomically increments `key`, arranging for it to expire after `ttl`.
  async fn increment(&self, key: &str, ttl: Duration)
  -> Result<u64, Unavailable>;
}

const KEY_PREFIX: &str = "tr:count";

pub fn day_key(visitor: &str, day: NaiveDate) -> String {
  format!("{KEY_PREFIX}:{visitor}:{}", day.format("%Y-%m-%d"))
}

/// The UTC day a counter key belongs to.
pub fn day_of(key: &str) -> Option<NaiveDate> {
  let (_, day) = key.strip_prefix(KEY_PREFIX)?.rsplit_once(':')?;
  NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
