use std::{collections::HashSet, env, fmt};

use crate::{
  cookie::{Attributes, SameSite},
  prelude::*,
  sv::license,
};

pub const FREE_LIMIT_PER_DAY: u64 = 3;

/// Process-wide secret value. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(***)")
  }
}

/// Upstash-compatible REST endpoint for the shared counters.
#[derive(Debug, Clone)]
pub struct Counter {
  pub url: String,
  pub token: Secret,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub secret: Option<Secret>,
  pub license_keys: HashSet<String>,
  pub counter: Option<Counter>,
  pub production: bool,
  pub same_site: SameSite,
  pub daily_limit: u64,
  pub counter_timeout: Duration,
  pub port: u16,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      secret: None,
      license_keys: HashSet::new(),
      counter: None,
      production: false,
      same_site: SameSite::Lax,
      daily_limit: FREE_LIMIT_PER_DAY,
      counter_timeout: Duration::from_secs(2),
      port: 3000,
    }
  }
}

impl Config {
  pub fn from_env() -> Self {
    Self::from_lookup(|name| env::var(name).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let var = |name: &str| {
      lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    };
    let defaults = Self::default();

    let counter = match (
      var("UPSTASH_REDIS_REST_URL"),
      var("UPSTASH_REDIS_REST_TOKEN"),
    ) {
      (Some(url), Some(token)) => Some(Counter {
        url: url.trim_end_matches('/').to_string(),
        token: Secret::new(token),
      }),
      _ => None,
    };

    let production = var("APP_ENV")
      .or_else(|| var("NODE_ENV"))
      .is_some_and(|env| env.eq_ignore_ascii_case("production"));

    Self {
      secret: var("COOKIE_SECRET").map(Secret::new),
      license_keys: parse_license_keys(
        &var("LICENSE_KEYS").unwrap_or_default(),
      ),
      counter,
      production,
      same_site: parse_or(
        "COOKIE_SAME_SITE",
        var("COOKIE_SAME_SITE"),
        defaults.same_site,
        |v| v.parse().ok(),
      ),
      daily_limit: parse_or(
        "FREE_LIMIT_PER_DAY",
        var("FREE_LIMIT_PER_DAY"),
        defaults.daily_limit,
        |v| v.parse().ok(),
      ),
      counter_timeout: parse_or(
        "COUNTER_TIMEOUT",
        var("COUNTER_TIMEOUT"),
        defaults.counter_timeout,
        |v| humantime::parse_duration(v).ok(),
      ),
      port: parse_or("PORT", var("PORT"), defaults.port, |v| v.parse().ok()),
    }
  }

  /// Attributes shared by every cookie the service sets.
  pub fn cookie_attributes(&self) -> Attributes {
    Attributes::session(self.production, self.same_site)
  }

  /// Logs every missing piece of configuration once at startup.
  pub fn report(&self) {
    if self.secret.is_none() {
      warn!("COOKIE_SECRET not set, pro entitlement is disabled");
    }
    if self.license_keys.is_empty() {
      warn!("LICENSE_KEYS not set, license redemption will fail");
    }
    if self.counter.is_none() {
      warn!(
        "Upstash counter store not configured, quota counts are process-local"
      );
    }
    info!(
      production = self.production,
      daily_limit = self.daily_limit,
      "Configuration loaded"
    );
  }
}

pub fn parse_license_keys(raw: &str) -> HashSet<String> {
  raw
    .split(',')
    .map(license::normalize)
    .filter(|key| !key.is_empty())
    .collect()
}

fn parse_or<T>(
  name: &str,
  raw: Option<String>,
  default: T,
  parse: impl FnOnce(&str) -> Option<T>,
) -> T {
  let Some(raw) = raw else {
    return default;
  };
  parse(&raw).unwrap_or_else(|| {
    warn!("Invalid {name} value `{raw}`, using default");
    default
  })
}
