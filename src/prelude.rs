pub use std::{collections::HashMap, sync::Arc, time::Duration};

pub use anyhow::Context;
pub use async_trait::async_trait;
pub use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
pub use dashmap::DashMap;
pub use tokio::time;
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Redemption, Result};
pub(crate) use crate::utils;
