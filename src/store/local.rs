use super::{CounterStore, Unavailable, day_of};
use crate::prelude::*;

/// In-process fallback counters. Lives as long as the process does.
#[derive(Debug, Default)]
pub struct Local {
  counts: DashMap<String, u64>,
}

impl Local {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn count(&self, key: &str) -> u64 {
    self.counts.get(key).map(|count| *count).unwrap_or(0)
  }

  /// Read-increment-write under the entry's shard lock.
  pub fn bump(&self, key: &str) -> u64 {
    let mut count = self.counts.entry(key.to_string()).or_insert(0);
    *count += 1;
    *count
  }

  /// Drops counters for days before `oldest`. Returns how many were removed.
  pub fn retain_since(&self, oldest: NaiveDate) -> usize {
    let before = self.len();
    self.counts.retain(|key, _| day_of(key).is_none_or(|day| day >= oldest));
    before.saturating_sub(self.len())
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }
}

#[async_trait]
impl CounterStore for Local {
  async fn get(&self, key: &str) -> Result<u64, Unavailable> {
    Ok(self.count(key))
  }

  async fn increment(
    &self,
    key: &str,
    _ttl: Duration,
  ) -> Result<u64, Unavailable> {
    Ok(self.bump(key))
  }
}
