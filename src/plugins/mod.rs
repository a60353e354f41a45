pub mod cron;
pub mod server;

use tokio::task::JoinError;

use crate::{prelude::*, state::AppState};

const RESTART_DELAY: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

/// Runs each registered plugin on its own task and restarts it when it exits.
#[derive(Default)]
pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub fn run(self, app: Arc<AppState>) {
    for plugin in self.plugins {
      tokio::spawn(supervise(plugin, app.clone()));
    }
  }
}

async fn supervise(plugin: Arc<dyn Plugin>, app: Arc<AppState>) {
  let name = plugin.name();
  info!("Plugin `{name}` registered");

  loop {
    let task = tokio::spawn({
      let plugin = plugin.clone();
      let app = app.clone();
      async move { plugin.start(app).await }
    });

    if !report_exit(name, task.await) {
      break;
    }

    time::sleep(RESTART_DELAY).await;
    info!("Restarting plugin `{name}`");
  }
}

/// Logs how a plugin ended. Returns whether it should be restarted.
fn report_exit(
  name: &str,
  exit: Result<anyhow::Result<()>, JoinError>,
) -> bool {
  match exit {
    Ok(Ok(())) => warn!("Plugin `{name}` returned unexpectedly"),
    Ok(Err(err)) => error!("Plugin `{name}` failed: {err:#}"),
    Err(err) if err.is_cancelled() => {
      info!("Plugin `{name}` shut down");
      return false;
    }
    Err(_) => error!("Plugin `{name}` panicked"),
  }
  true
}
