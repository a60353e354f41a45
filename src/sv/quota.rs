use serde::Serialize;

use crate::{
  prelude::*,
  store::{Backend, CounterStore, Local, Unavailable, day_key},
};

/// Remote counters outlive the day they count, covering clock skew at midnight.
pub const RETENTION: Duration = Duration::from_secs(48 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
  pub used: u64,
  pub remaining: u64,
  pub limit: u64,
  #[serde(rename = "storage")]
  pub backend: Backend,
}

impl Usage {
  fn new(used: u64, limit: u64, backend: Backend) -> Self {
    Self { used, remaining: limit.saturating_sub(used), limit, backend }
  }
}

/// Free-tier daily allowance. Prefers the shared store, falls back to the
/// process-local one while it is unavailable.
pub struct Quota<'a> {
  remote: &'a dyn CounterStore,
  local: &'a Local,
  limit: u64,
}

impl<'a> Quota<'a> {
  pub fn new(
    remote: &'a dyn CounterStore,
    local: &'a Local,
    limit: u64,
  ) -> Self {
    Self { remote, local, limit }
  }

  pub fn is_exhausted(&self, used: u64) -> bool {
    used >= self.limit
  }

  pub async fn status(&self, visitor: &str) -> Usage {
    self.status_on(visitor, Utc::now().date_naive()).await
  }

  pub async fn status_on(&self, visitor: &str, day: NaiveDate) -> Usage {
    let key = day_key(visitor, day);

    match self.remote.get(&key).await {
      Ok(used) => Usage::new(used, self.limit, Backend::Remote),
      Err(Unavailable) => {
        Usage::new(self.local.count(&key), self.limit, Backend::Local)
      }
    }
  }

  pub async fn consume(&self, visitor: &str) -> Usage {
    self.consume_on(visitor, Utc::now().date_naive()).await
  }

  pub async fn consume_on(&self, visitor: &str, day: NaiveDate) -> Usage {
    let key = day_key(visitor, day);

    match self.remote.increment(&key, RETENTION).await {
      Ok(used) => Usage::new(used, self.limit, Backend::Remote),
      Err(Unavailable) => {
        debug!("Counting {key} locally");
        Usage::new(self.local.bump(&key), self.limit, Backend::Local)
      }
    }
  }
}
