use percent_encoding::{
  AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode,
};

use crate::prelude::*;

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'!')
  .remove(b'~')
  .remove(b'*')
  .remove(b'\'')
  .remove(b'(')
  .remove(b')');

pub fn encode_component(value: &str) -> String {
  utf8_percent_encode(value, COMPONENT).to_string()
}

/// Returns `None` when the decoded bytes are not valid UTF-8.
pub fn decode_component(value: &str) -> Option<String> {
  percent_decode_str(value).decode_utf8().ok().map(|v| v.into_owned())
}

/// IMF-fixdate, as used by the cookie `Expires` attribute.
pub fn http_date(date: DateTime<Utc>) -> String {
  date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
