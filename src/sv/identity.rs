use uuid::Uuid;

use crate::{
  config::Config,
  cookie::{self, Attributes, Jar, SetCookies},
  prelude::*,
};

pub const COOKIE: &str = "tr_id";
/// Shorter values are treated as tampered and replaced.
pub const MIN_LEN: usize = 8;
const MAX_AGE: i64 = 60 * 60 * 24 * 365;

pub struct Identity<'a> {
  config: &'a Config,
}

impl<'a> Identity<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  /// Returns the visitor id, issuing a fresh one when the request has none.
  pub fn ensure(&self, jar: &Jar, out: &mut SetCookies) -> String {
    if let Some(id) = jar.get(COOKIE)
      && id.chars().count() >= MIN_LEN
    {
      return id.to_string();
    }

    let id = Uuid::new_v4().to_string();
    let attrs = Attributes {
      max_age: Some(MAX_AGE),
      ..self.config.cookie_attributes()
    };
    out.push(cookie::serialize(COOKIE, &id, &attrs));
    debug!("Issued visitor id {id}");

    id
  }
}
