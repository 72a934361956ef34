use crate::session::Session;
use crate::{Error, Result, GENERIC_ERROR_MESSAGE};
use log::{debug, warn};
use reqwest::header;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub const DEFAULT_HOST: &str = "https://entrevista-front-end.onrender.com";
pub const DEFAULT_CLIENT_ID: &str = "01";
pub const DEFAULT_CLIENT_SECRET: &str = "string";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address every request is made against
    pub host: String,
    /// OAuth client credentials sent along with the password grant
    pub client_id: String,
    pub client_secret: String,
    /// No timeout unless one is asked for; a hung request just stays pending
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        ClientConfig {
            host: host.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::blocking::Client,
    host: String,
    client_id: String,
    client_secret: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<Session>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(APP_USER_AGENT);
        // the blocking client defaults to a 30 second timeout; only keep one if configured
        builder = builder.timeout(config.timeout);
        let http_client = builder.build()?;

        Ok(ApiClient {
            http_client,
            host: config.host.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            session,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.session.credential()? {
            let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| {
                    Error::Storage(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "stored credential is not a valid header value",
                    ))
                })?;
            auth_value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth_value);
        };
        Ok(headers)
    }

    /// Password grant against `/token/`. Returns the access token; storing it is the session's
    /// job.
    pub fn request_token(&self, username: &str, password: &str) -> Result<String> {
        debug!("POST /token/ username={}", username);
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let res = self.http_client.post(self.url("/token/")).form(&form[..]).send()?;
        let body = match self.handle_response(res) {
            Ok(body) => body,
            Err(Error::AuthorizationExpired) => {
                return Err(Error::Authentication("invalid credentials".to_string()))
            }
            Err(Error::Remote { status, message }) if status == 400 || status == 403 => {
                return Err(Error::Authentication(message))
            }
            Err(err) => return Err(err),
        };
        match body["access_token"].as_str() {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(Error::Authentication(
                "missing access_token in login response".to_string(),
            )),
        }
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        debug!("GET {}", path);
        let res = self
            .http_client
            .get(self.url(path))
            .headers(self.auth_headers()?)
            .send()?;
        self.handle_response(res)
    }

    pub fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value> {
        debug!("POST {}", path);
        let res = self
            .http_client
            .post(self.url(path))
            .headers(self.auth_headers()?)
            .json(body)
            .send()?;
        self.handle_response(res)
    }

    pub fn put(&self, path: &str) -> Result<Value> {
        debug!("PUT {}", path);
        let res = self
            .http_client
            .put(self.url(path))
            .headers(self.auth_headers()?)
            .send()?;
        self.handle_response(res)
    }

    /// Every response passes through here. A 401 is reported to the session before the error
    /// goes back to the caller, so callers never need their own handling for it.
    fn handle_response(&self, res: reqwest::blocking::Response) -> Result<Value> {
        let status = res.status();
        // the status alone decides; the body of a 401 is never read
        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
            return Err(Error::AuthorizationExpired);
        }
        let text = res.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|val| error_message(&val))
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            warn!("API error {}: {}", status, message);
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}

/// Pulls a human-readable message out of an error body: `message`, else a string `detail`, else
/// the first `msg` of a `detail` list.
pub fn error_message(body: &Value) -> Option<String> {
    if let Some(msg) = body["message"].as_str() {
        return Some(msg.to_string());
    }
    match &body["detail"] {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item["msg"].as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

#[test]
fn test_error_message() {
    use serde_json::json;
    assert_eq!(
        error_message(&json!({"message": "nope"})),
        Some("nope".to_string())
    );
    assert_eq!(
        error_message(&json!({"detail": "Usuário já existe"})),
        Some("Usuário já existe".to_string())
    );
    assert_eq!(
        error_message(&json!({"detail": [{"loc": ["body", "email"], "msg": "field required"}]})),
        Some("field required".to_string())
    );
    assert_eq!(error_message(&json!({"other": 1})), None);
    assert_eq!(error_message(&json!([1, 2])), None);
}

#[test]
fn test_client_config() {
    let config = ClientConfig::new("http://localhost:8000/");
    assert_eq!(config.client_id, "01");
    assert_eq!(config.client_secret, "string");
    assert_eq!(config.timeout, None);
    assert_eq!(ClientConfig::default().host, DEFAULT_HOST);
}
