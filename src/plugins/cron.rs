use crate::{plugins::Plugin, prelude::*, state::AppState};

const SWEEP_EVERY: Duration = Duration::from_secs(60 * 60);

/// Periodically drops local fallback counters for past days.
pub struct Housekeeping;

#[async_trait]
impl Plugin for Housekeeping {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(SWEEP_EVERY);
    loop {
      interval.tick().await;
      app.gc_counters();
    }
  }
}
