use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;

use crate::{
  cookie::{Jar, SetCookies},
  prelude::*,
  state::AppState,
  sv::{Tier, Usage},
};

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StatusRes {
  Pro {
    remaining: Option<u64>,
    limit: Option<u64>,
    storage: &'static str,
  },
  Free(Usage),
}

impl StatusRes {
  fn pro() -> Self {
    Self::Pro { remaining: None, limit: None, storage: "n/a" }
  }
}

pub async fn status(
  State(app): State<Arc<AppState>>,
  jar: Jar,
) -> (SetCookies, Json<StatusRes>) {
  let sv = app.sv();
  let mut cookies = SetCookies::default();

  let visitor = sv.identity.ensure(&jar, &mut cookies);
  if sv.entitlement.verify(&jar) {
    return (cookies, Json(StatusRes::pro()));
  }

  let usage = sv.quota.status(&visitor).await;
  (cookies, Json(StatusRes::Free(usage)))
}

/// Request bodies are read leniently: a missing or unparsable body is `{}`.
fn json_body(bytes: &[u8]) -> json::Value {
  json::from_slice(bytes)
    .unwrap_or_else(|_| json::Value::Object(Default::default()))
}

/// `licenseKey` as a string; null, missing or structured values become `""`.
fn license_key(body: &json::Value) -> String {
  match body.get("licenseKey") {
    Some(json::Value::String(key)) => key.clone(),
    Some(value @ (json::Value::Number(_) | json::Value::Bool(_))) => {
      value.to_string()
    }
    _ => String::new(),
  }
}

/// Admits the request (consuming free quota when needed) before handing it to
/// the generator.
pub async fn generate(
  State(app): State<Arc<AppState>>,
  jar: Jar,
  body: Bytes,
) -> Result<(SetCookies, Json<json::Value>), (SetCookies, Error)> {
  let body = json_body(&body);
  let sv = app.sv();
  let mut cookies = SetCookies::default();

  let visitor = sv.identity.ensure(&jar, &mut cookies);
  let tier = sv.entitlement.tier(&jar);

  if tier == Tier::Free {
    let usage = sv.quota.status(&visitor).await;
    if sv.quota.is_exhausted(usage.used) {
      let err = Error::LimitReached { used: usage.used, limit: usage.limit };
      return Err((cookies, err));
    }

    let usage = sv.quota.consume(&visitor).await;
    debug!(
      used = usage.used,
      limit = usage.limit,
      storage = ?usage.backend,
      "Free generation admitted"
    );
  }

  match app.generator.generate(tier, body).await {
    Ok(output) => Ok((cookies, Json(output))),
    Err(err) => Err((cookies, Error::Internal(err))),
  }
}

#[derive(Debug, Serialize)]
pub struct OkRes {
  pub ok: bool,
}

pub async fn verify_license(
  State(app): State<Arc<AppState>>,
  body: Bytes,
) -> Result<(SetCookies, Json<OkRes>)> {
  let key = license_key(&json_body(&body));
  let mut cookies = SetCookies::default();
  app.sv().license.redeem(&key, &mut cookies)?;
  Ok((cookies, Json(OkRes { ok: true })))
}

pub async fn clear_license(
  State(app): State<Arc<AppState>>,
) -> (SetCookies, Json<OkRes>) {
  let mut cookies = SetCookies::default();
  app.sv().entitlement.revoke(&mut cookies);
  (cookies, Json(OkRes { ok: true }))
}

#[cfg(test)]
mod tests {
  use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    config::{Config, Secret, parse_license_keys},
    generator::{Acknowledge, Generator},
    plugins::server::routes,
    store::{Local, Remote},
  };

  const KEY: &str = "TR-ABCD-1234-ZZZZ";

  fn config() -> Config {
    Config {
      secret: Some(Secret::new("test-secret")),
      license_keys: parse_license_keys(KEY),
      ..Config::default()
    }
  }

  fn app_router(config: Config) -> Router {
    let remote = Remote::new(None, Duration::from_secs(1)).unwrap();
    let app =
      AppState::with_parts(config, Box::new(remote), Box::new(Acknowledge));
    routes().with_state(Arc::new(app))
  }

  async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<json::Value>,
  ) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
      req = req.header(header::COOKIE, cookie);
    }
    let body = match body {
      Some(body) => {
        req = req.header(header::CONTENT_TYPE, "application/json");
        Body::from(body.to_string())
      }
      None => Body::empty(),
    };

    router.clone().oneshot(req.body(body).unwrap()).await.unwrap()
  }

  async fn send_raw(
    router: &Router,
    uri: &str,
    content_type: Option<&str>,
    body: &'static str,
  ) -> Response {
    let mut req = Request::builder().method("POST").uri(uri);
    if let Some(content_type) = content_type {
      req = req.header(header::CONTENT_TYPE, content_type);
    }

    let req = req.body(Body::from(body)).unwrap();
    router.clone().oneshot(req).await.unwrap()
  }

  fn set_cookies(res: &Response) -> Vec<String> {
    res
      .headers()
      .get_all(header::SET_COOKIE)
      .iter()
      .map(|v| v.to_str().unwrap().to_string())
      .collect()
  }

  /// `name=value` part of the first `Set-Cookie` for `name`.
  fn cookie_pair(res: &Response, name: &str) -> Option<String> {
    set_cookies(res)
      .into_iter()
      .find(|c| c.starts_with(&format!("{name}=")))
      .map(|c| c.split(';').next().unwrap().to_string())
  }

  async fn body(res: Response) -> json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn test_health() {
    let res = send(&app_router(config()), "GET", "/health", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_first_visit_issues_identity_once() {
    let router = app_router(config());

    let res = send(&router, "GET", "/api/status", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let id = cookie_pair(&res, "tr_id").expect("identity cookie");
    assert_eq!(
      body(res).await,
      json::json!({
        "mode": "free",
        "used": 0,
        "remaining": 3,
        "limit": 3,
        "storage": "local",
      })
    );

    let res = send(&router, "GET", "/api/status", Some(&id), None).await;
    assert!(set_cookies(&res).is_empty());
  }

  #[tokio::test]
  async fn test_free_quota_is_enforced() {
    let router = app_router(config());
    let id = "tr_id=visitor-0001";
    let req = json::json!({ "type": "incident" });

    for remaining in [2, 1, 0] {
      let body_req = Some(req.clone());
      let res =
        send(&router, "POST", "/api/generate", Some(id), body_req).await;
      assert_eq!(res.status(), StatusCode::OK);
      assert_eq!(
        body(res).await,
        json::json!({ "mode": "free", "type": "incident" })
      );

      let res = send(&router, "GET", "/api/status", Some(id), None).await;
      assert_eq!(body(res).await["remaining"], remaining);
    }

    let res = send(&router, "POST", "/api/generate", Some(id), Some(req)).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(
      body(res).await,
      json::json!({
        "error": "Free limit reached",
        "code": "FREE_LIMIT_REACHED",
      })
    );

    let res = send(&router, "GET", "/api/status", Some(id), None).await;
    assert_eq!(body(res).await["used"], 3);
  }

  #[tokio::test]
  async fn test_exhausted_visitor_still_gets_identity_cookie() {
    let mut config = config();
    config.daily_limit = 0;
    let router = app_router(config);

    let res = send(
      &router,
      "POST",
      "/api/generate",
      None,
      Some(json::json!({ "type": "service" })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(cookie_pair(&res, "tr_id").is_some());
  }

  #[tokio::test]
  async fn test_redeemed_license_unlocks_pro() {
    let router = app_router(config());
    let id = "tr_id=visitor-0002";

    let res = send(
      &router,
      "POST",
      "/api/verify-license",
      None,
      Some(json::json!({ "licenseKey": " tr-abcd-1234-zzzz " })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let pro = cookie_pair(&res, "tr_pro").expect("entitlement cookie");
    assert_eq!(body(res).await, json::json!({ "ok": true }));

    let cookie = format!("{id}; {pro}");
    for _ in 0..5 {
      let res = send(
        &router,
        "POST",
        "/api/generate",
        Some(&cookie),
        Some(json::json!({ "type": "checklist" })),
      )
      .await;
      assert_eq!(res.status(), StatusCode::OK);
      assert_eq!(body(res).await["mode"], "pro");
    }

    let res = send(&router, "GET", "/api/status", Some(&cookie), None).await;
    assert_eq!(
      body(res).await,
      json::json!({
        "mode": "pro", "remaining": null, "limit": null, "storage": "n/a"
      })
    );

    // pro generations never touch the free counters
    let res = send(&router, "GET", "/api/status", Some(id), None).await;
    assert_eq!(body(res).await["used"], 0);
  }

  #[tokio::test]
  async fn test_tampered_entitlement_is_free() {
    let router = app_router(config());
    let cookie = "tr_id=visitor-0003; tr_pro=1.99999999999999.deadbeef";

    let res = send(&router, "GET", "/api/status", Some(cookie), None).await;
    assert_eq!(body(res).await["mode"], "free");
  }

  #[tokio::test]
  async fn test_redemption_rejections() {
    let router = app_router(config());
    let cases = [
      (
        "TR-AB-1234-ZZZZ",
        StatusCode::BAD_REQUEST,
        "Invalid license key format.",
      ),
      (
        "TR-ABCD-1234-ZZZY",
        StatusCode::UNAUTHORIZED,
        "License key not recognized.",
      ),
    ];

    for (key, status, message) in cases {
      let res = send(
        &router,
        "POST",
        "/api/verify-license",
        None,
        Some(json::json!({ "licenseKey": key })),
      )
      .await;
      assert_eq!(res.status(), status);
      assert!(set_cookies(&res).is_empty());
      assert_eq!(body(res).await, json::json!({ "error": message }));
    }
  }

  #[tokio::test]
  async fn test_redemption_without_configuration() {
    let router = app_router(Config::default());
    let res = send(
      &router,
      "POST",
      "/api/verify-license",
      None,
      Some(json::json!({ "licenseKey": KEY })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      body(res).await,
      json::json!({ "error": "Server is not configured with LICENSE_KEYS." })
    );

    let router = app_router(Config { secret: None, ..config() });
    let res = send(
      &router,
      "POST",
      "/api/verify-license",
      None,
      Some(json::json!({ "licenseKey": KEY })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(res).await["details"], "COOKIE_SECRET is not set.");
  }

  #[tokio::test]
  async fn test_missing_license_key_is_invalid_format() {
    let router = app_router(config());
    let empty = Some(json::json!({}));
    let res = send(&router, "POST", "/api/verify-license", None, empty).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_odd_license_bodies_are_invalid_format() {
    let router = app_router(config());
    let json = Some("application/json");
    let cases = [
      (json, r#"{"licenseKey":null}"#),
      (json, r#"{"licenseKey":123}"#),
      (None, ""),
      (Some("text/plain"), "not json"),
      (json, "not json"),
    ];

    for (content_type, raw) in cases {
      let res =
        send_raw(&router, "/api/verify-license", content_type, raw).await;

      assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{raw:?}");
      assert_eq!(
        body(res).await,
        json::json!({ "error": "Invalid license key format." })
      );
    }
  }

  #[tokio::test]
  async fn test_generate_without_body_still_issues_identity() {
    let router = app_router(config());

    let res = send_raw(&router, "/api/generate", None, "").await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(cookie_pair(&res, "tr_id").is_some());
    assert_eq!(body(res).await["mode"], "free");
  }

  #[test]
  fn test_license_key_is_read_leniently() {
    let key = |raw: &str| license_key(&json_body(raw.as_bytes()));

    assert_eq!(key(r#"{"licenseKey":" tr-abcd "}"#), " tr-abcd ");
    assert_eq!(key(r#"{"licenseKey":123}"#), "123");
    assert_eq!(key(r#"{"licenseKey":null}"#), "");
    assert_eq!(key(r#"{"licenseKey":["TR"]}"#), "");
    assert_eq!(key("[1, 2]"), "");
    assert_eq!(key(""), "");
  }

  #[tokio::test]
  async fn test_clear_license() {
    let router = app_router(config());

    let res = send(&router, "POST", "/api/clear-license", None, None).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
      set_cookies(&res),
      ["tr_pro=; HttpOnly; SameSite=Lax; Path=/; \
        Expires=Thu, 01 Jan 1970 00:00:00 GMT"]
    );
  }

  #[tokio::test]
  async fn test_shared_store_is_preferred() {
    let app = AppState::with_parts(
      config(),
      Box::new(Local::new()),
      Box::new(Acknowledge),
    );
    let router = routes().with_state(Arc::new(app));

    let id = Some("tr_id=visitor-0004");
    let res = send(&router, "GET", "/api/status", id, None).await;
    assert_eq!(body(res).await["storage"], "remote");
  }

  struct Broken;

  #[async_trait]
  impl Generator for Broken {
    async fn generate(
      &self,
      _tier: Tier,
      _request: json::Value,
    ) -> anyhow::Result<json::Value> {
      anyhow::bail!("upstream timed out")
    }
  }

  #[tokio::test]
  async fn test_generator_failure_is_server_error() {
    let remote = Remote::new(None, Duration::from_secs(1)).unwrap();
    let app =
      AppState::with_parts(config(), Box::new(remote), Box::new(Broken));
    let router = routes().with_state(Arc::new(app));

    let res = send(
      &router,
      "POST",
      "/api/generate",
      Some("tr_id=visitor-0005"),
      Some(json::json!({ "type": "incident" })),
    )
    .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      body(res).await,
      json::json!({ "error": "Server error", "details": "upstream timed out" })
    );
  }
}
