use reqwest::Client;

use super::{CounterStore, Unavailable};
use crate::{config::Counter, prelude::*};

/// Counters held in Upstash Redis, reached over its REST API.
///
/// Every failure (missing configuration, transport error, timeout, non-2xx
/// status, unexpected body) is reported as [`Unavailable`].
pub struct Remote {
  endpoint: Option<Counter>,
  client: Client,
}

impl Remote {
  pub fn new(
    endpoint: Option<Counter>,
    timeout: Duration,
  ) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .context("Failed to build counter store client")?;
    Ok(Self { endpoint, client })
  }

  async fn call(&self, path: &str) -> Result<json::Value, Unavailable> {
    let endpoint = self.endpoint.as_ref().ok_or(Unavailable)?;
    let url = format!("{}{path}", endpoint.url);

    let res = self
      .client
      .post(&url)
      .bearer_auth(endpoint.token.expose())
      .send()
      .await
      .map_err(|err| {
        warn!("Counter store request failed: {err}");
        Unavailable
      })?;

    if !res.status().is_success() {
      warn!("Counter store answered {} for {path}", res.status());
      return Err(Unavailable);
    }

    res.json().await.map_err(|err| {
      warn!("Counter store sent an unreadable body: {err}");
      Unavailable
    })
  }
}

/// Upstash returns `INCR` results as numbers and `GET` results as strings.
fn count_of(value: &json::Value) -> Option<u64> {
  match value {
    json::Value::Number(n) => n.as_u64(),
    json::Value::String(s) => s.parse().ok(),
    _ => None,
  }
}

#[async_trait]
impl CounterStore for Remote {
  async fn get(&self, key: &str) -> Result<u64, Unavailable> {
    let path = format!("/get/{}", utils::encode_component(key));
    let reply = self.call(&path).await?;

    match reply.get("result") {
      // never incremented (or already expired)
      Some(json::Value::Null) => Ok(0),
      Some(value) => count_of(value).ok_or(Unavailable),
      None => Err(Unavailable),
    }
  }

  async fn increment(
    &self,
    key: &str,
    ttl: Duration,
  ) -> Result<u64, Unavailable> {
    let segment = utils::encode_component(key);

    let reply = self.call(&format!("/incr/{segment}")).await?;
    let count =
      reply.get("result").and_then(count_of).ok_or(Unavailable)?;

    if self
      .call(&format!("/expire/{segment}/{}", ttl.as_secs()))
      .await
      .is_err()
    {
      warn!("Failed to set expiry on counter {key}");
    }

    Ok(count)
  }
}
