//! Signed, expiring proof of pro access.
//!
//! Token layout: `1.<expires_at_millis>.<signature>`, where the signature is
//! the hex HMAC-SHA256 of `1.<expires_at_millis>`.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
  config::{Config, Secret},
  cookie::{self, Attributes, Jar, SetCookies},
  prelude::*,
};

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE: &str = "tr_pro";
pub const TTL_DAYS: i64 = 30;
const ACTIVE: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  Free,
  Pro,
}

fn sign(secret: &Secret, payload: &str) -> String {
  let mut mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
    .expect("HMAC accepts keys of any length");
  mac.update(payload.as_bytes());
  hex::encode(mac.finalize().into_bytes())
}

/// Builds the token value for the given expiry.
pub fn token(secret: &Secret, expires_at: DateTime<Utc>) -> String {
  let payload = format!("{ACTIVE}.{}", expires_at.timestamp_millis());
  let signature = sign(secret, &payload);
  format!("{payload}.{signature}")
}

/// Checks structure, flag, expiry and signature. Equal to `now` is still valid.
fn check(secret: &Secret, token: &str, now: DateTime<Utc>) -> bool {
  let mut fields = token.split('.');
  let (Some(flag), Some(expires), Some(signature), None) =
    (fields.next(), fields.next(), fields.next(), fields.next())
  else {
    return false;
  };

  if flag != ACTIVE || expires.is_empty() || signature.is_empty() {
    return false;
  }

  let Ok(expires_at) = expires.parse::<i64>() else {
    return false;
  };
  if expires_at < now.timestamp_millis() {
    return false;
  }

  let expected = sign(secret, &format!("{flag}.{expires}"));
  // slices of unequal length compare unequal without panicking
  expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

pub struct Entitlement<'a> {
  config: &'a Config,
}

impl<'a> Entitlement<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  pub fn mint(&self, out: &mut SetCookies) -> Result<DateTime<Utc>> {
    self.mint_at(Utc::now(), out)
  }

  pub fn mint_at(
    &self,
    now: DateTime<Utc>,
    out: &mut SetCookies,
  ) -> Result<DateTime<Utc>> {
    let secret =
      self.config.secret.as_ref().ok_or(Error::Config("COOKIE_SECRET"))?;

    let expires_at = now + TimeDelta::days(TTL_DAYS);
    let attrs = Attributes {
      expires: Some(expires_at),
      ..self.config.cookie_attributes()
    };
    out.push(cookie::serialize(COOKIE, &token(secret, expires_at), &attrs));

    info!("Minted pro entitlement until {expires_at}");
    Ok(expires_at)
  }

  /// Never fails: anything inconclusive is "not entitled".
  pub fn verify(&self, jar: &Jar) -> bool {
    self.verify_at(jar, Utc::now())
  }

  pub fn verify_at(&self, jar: &Jar, now: DateTime<Utc>) -> bool {
    let Some(token) = jar.get(COOKIE) else {
      return false;
    };
    let Some(secret) = &self.config.secret else {
      return false;
    };

    let valid = check(secret, token, now);
    if !valid {
      debug!("Rejected entitlement cookie");
    }
    valid
  }

  pub fn tier(&self, jar: &Jar) -> Tier {
    if self.verify(jar) { Tier::Pro } else { Tier::Free }
  }

  /// Tells the client to drop the entitlement cookie.
  pub fn revoke(&self, out: &mut SetCookies) {
    let attrs = Attributes {
      expires: Some(DateTime::<Utc>::UNIX_EPOCH),
      ..self.config.cookie_attributes()
    };
    out.push(cookie::serialize(COOKIE, "", &attrs));
  }
}
