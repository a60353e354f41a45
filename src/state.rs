use crate::{
  config::Config,
  generator::{Acknowledge, Generator},
  prelude::*,
  store::{CounterStore, Local, Remote},
  sv,
};

pub struct Services<'a> {
  pub identity: sv::Identity<'a>,
  pub entitlement: sv::Entitlement<'a>,
  pub license: sv::License<'a>,
  pub quota: sv::Quota<'a>,
}

pub struct AppState {
  pub config: Config,
  pub remote: Box<dyn CounterStore>,
  /// Fallback counters, shared by every request for the process lifetime.
  pub local: Local,
  pub generator: Box<dyn Generator>,
}

impl AppState {
  pub fn new(config: Config) -> anyhow::Result<Self> {
    let remote = Remote::new(config.counter.clone(), config.counter_timeout)?;
    Ok(Self::with_parts(config, Box::new(remote), Box::new(Acknowledge)))
  }

  pub fn with_parts(
    config: Config,
    remote: Box<dyn CounterStore>,
    generator: Box<dyn Generator>,
  ) -> Self {
    Self { config, remote, local: Local::new(), generator }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      identity: sv::Identity::new(&self.config),
      entitlement: sv::Entitlement::new(&self.config),
      license: sv::License::new(&self.config),
      quota: sv::Quota::new(
        self.remote.as_ref(),
        &self.local,
        self.config.daily_limit,
      ),
    }
  }

  /// Forgets local counters older than yesterday (UTC).
  pub fn gc_counters(&self) {
    let today = Utc::now().date_naive();
    let oldest = today.pred_opt().unwrap_or(today);

    let removed = self.local.retain_since(oldest);
    if removed > 0 {
      debug!("Dropped {removed} stale local counters");
    }
  }
}
