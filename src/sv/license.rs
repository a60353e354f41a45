use crate::{
  config::Config,
  cookie::SetCookies,
  prelude::*,
  sv::Entitlement,
};

/// Two-letter product code every key starts with.
pub const PRODUCT_CODE: &str = "TR";
const GROUP_LEN: usize = 4;

pub fn normalize(raw: &str) -> String {
  raw.trim().to_uppercase()
}

/// `TR-XXXX-XXXX-XXXX` with `X` in `A-Z0-9`. Expects a normalized key.
pub fn is_valid_format(key: &str) -> bool {
  let mut groups = key.split('-');
  if groups.next() != Some(PRODUCT_CODE) {
    return false;
  }

  let group_ok = |group: Option<&str>| {
    group.is_some_and(|g| {
      g.len() == GROUP_LEN
        && g.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    })
  };

  (0..3).all(|_| group_ok(groups.next())) && groups.next().is_none()
}

pub struct License<'a> {
  config: &'a Config,
}

impl<'a> License<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  /// Checks `raw` against the allow-list and mints an entitlement into `out`.
  /// Keys are never consumed.
  pub fn redeem(&self, raw: &str, out: &mut SetCookies) -> Result<()> {
    let key = normalize(raw);

    if !is_valid_format(&key) {
      return Err(Redemption::InvalidFormat.into());
    }
    if self.config.license_keys.is_empty() {
      return Err(Redemption::ServerMisconfigured.into());
    }
    if !self.config.license_keys.contains(&key) {
      warn!("Rejected unknown license key");
      return Err(Redemption::NotRecognized.into());
    }

    Entitlement::new(self.config).mint(out)?;
    info!("License key redeemed");
    Ok(())
  }
}
