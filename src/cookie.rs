//! Cookie header parsing and `Set-Cookie` serialization.

use std::{convert::Infallible, fmt, str::FromStr};

use axum::{
  extract::FromRequestParts,
  http::{HeaderValue, header, request::Parts},
  response::{IntoResponseParts, ResponseParts},
};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
  Strict,
  Lax,
  None,
}

impl FromStr for SameSite {
  type Err = String;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    match raw.to_ascii_lowercase().as_str() {
      "strict" => Ok(SameSite::Strict),
      "lax" => Ok(SameSite::Lax),
      "none" => Ok(SameSite::None),
      _ => Err(format!("unknown SameSite policy `{raw}`")),
    }
  }
}

impl fmt::Display for SameSite {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SameSite::Strict => "Strict",
      SameSite::Lax => "Lax",
      SameSite::None => "None",
    })
  }
}

#[derive(Debug, Clone, Default)]
pub struct Attributes {
  pub http_only: bool,
  pub secure: bool,
  pub same_site: Option<SameSite>,
  pub path: Option<&'static str>,
  pub max_age: Option<i64>,
  pub expires: Option<DateTime<Utc>>,
}

impl Attributes {
  /// `HttpOnly; SameSite=<policy>; Path=/`, plus `Secure` when asked to.
  /// Browsers drop `SameSite=None` cookies that are not `Secure`.
  pub fn session(secure: bool, same_site: SameSite) -> Self {
    Self {
      http_only: true,
      secure: secure || same_site == SameSite::None,
      same_site: Some(same_site),
      path: Some("/"),
      ..Default::default()
    }
  }
}

/// Splits a `Cookie` header into name/value pairs. Never fails: segments with
/// an empty name or a value that does not decode to UTF-8 are dropped.
pub fn parse(header: &str) -> HashMap<String, String> {
  let mut out = HashMap::new();

  for part in header.split(';') {
    let part = part.trim();
    let (name, value) = part.split_once('=').unwrap_or((part, ""));
    if name.is_empty() {
      continue;
    }
    if let Some(value) = utils::decode_component(value) {
      out.insert(name.to_string(), value);
    }
  }

  out
}

pub fn serialize(name: &str, value: &str, attrs: &Attributes) -> String {
  let mut parts = vec![format!("{name}={}", utils::encode_component(value))];

  if attrs.http_only {
    parts.push("HttpOnly".into());
  }
  if attrs.secure {
    parts.push("Secure".into());
  }
  if let Some(same_site) = attrs.same_site {
    parts.push(format!("SameSite={same_site}"));
  }
  if let Some(path) = attrs.path {
    parts.push(format!("Path={path}"));
  }
  if let Some(max_age) = attrs.max_age {
    parts.push(format!("Max-Age={max_age}"));
  }
  if let Some(expires) = attrs.expires {
    parts.push(format!("Expires={}", utils::http_date(expires)));
  }

  parts.join("; ")
}

/// Cookies sent with the request.
#[derive(Debug, Clone, Default)]
pub struct Jar(HashMap<String, String>);

impl Jar {
  pub fn from_header(header: &str) -> Self {
    Self(parse(header))
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }
}

impl<S: Send + Sync> FromRequestParts<S> for Jar {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get_all(header::COOKIE)
      .iter()
      .filter_map(|value| value.to_str().ok())
      .collect::<Vec<_>>()
      .join("; ");

    Ok(Self::from_header(&header))
  }
}

/// `Set-Cookie` values to attach to the response, one header each.
#[derive(Debug, Default)]
pub struct SetCookies(Vec<String>);

impl SetCookies {
  pub fn push(&mut self, cookie: String) {
    self.0.push(cookie);
  }

  #[cfg(test)]
  pub fn as_slice(&self) -> &[String] {
    &self.0
  }
}

impl IntoResponseParts for SetCookies {
  type Error = Infallible;

  fn into_response_parts(
    self,
    mut res: ResponseParts,
  ) -> Result<ResponseParts, Self::Error> {
    for cookie in self.0 {
      match HeaderValue::from_str(&cookie) {
        Ok(value) => {
          res.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => error!("Dropping unrepresentable cookie: {err}"),
      }
    }
    Ok(res)
  }
}
