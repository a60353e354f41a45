//! Boundary to the content generator that runs once the gate admits a request.

use crate::{prelude::*, sv::Tier};

#[async_trait]
pub trait Generator: Send + Sync {
  async fn generate(
    &self,
    tier: Tier,
    request: json::Value,
  ) -> anyhow::Result<json::Value>;
}

/// Reports the admitted tier and the requested generation type.
pub struct Acknowledge;

#[async_trait]
impl Generator for Acknowledge {
  async fn generate(
    &self,
    tier: Tier,
    request: json::Value,
  ) -> anyhow::Result<json::Value> {
    let kind = request.get("type").cloned().unwrap_or(json::Value::Null);
    Ok(json::json!({ "mode": tier, "type": kind }))
  }
}
