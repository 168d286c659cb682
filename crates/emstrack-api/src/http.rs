// REST API HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, auth injection and
// status/body handling. Endpoint paths are relative (`ambulance/`,
// `call/42/`) and resolved against the API root.

use std::future::Future;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Read-only view of the REST API consumed by the domain layer.
///
/// `get` resolves `path` against the API root and returns the decoded JSON
/// body: an array for collection endpoints, an object for single records.
pub trait HttpApi: Send + Sync + 'static {
    fn get(&self, path: &str) -> impl Future<Output = Result<serde_json::Value, Error>> + Send;
}

/// How requests to the REST API authenticate.
#[derive(Debug, Clone, Default)]
pub enum ApiAuth {
    /// No `Authorization` header; rely on the cookie jar (session login).
    #[default]
    None,
    /// `Authorization: Token <token>`.
    Token(SecretString),
    /// HTTP basic auth with the same credentials used for the broker.
    Basic {
        username: String,
        password: SecretString,
    },
}

/// HTTP client for the dispatch server's REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: ApiAuth,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://dispatch.example.org/en/api/`.
    /// A missing trailing slash is added so relative paths join underneath it.
    pub fn new(base_url: Url, auth: ApiAuth, transport: &TransportConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let ApiAuth::Token(ref token) = auth {
            let mut value = HeaderValue::from_str(&format!("Token {}", token.expose_secret()))
                .map_err(|_| Error::Authentication {
                    message: "API token contains characters not allowed in a header".into(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url, auth))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: ApiAuth) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            auth,
        }
    }

    /// Convenience constructor used by tests and tooling: parse `base_url`
    /// and use the given client without auth.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let url = Url::parse(base_url)?;
        Ok(Self::with_client(http, url, ApiAuth::None))
    }

    /// The API root all paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative endpoint path against the API root.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send a GET request and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let mut request = self.http.get(url);
        if let ApiAuth::Basic {
            ref username,
            ref password,
        } = self.auth
        {
            request = request.basic_auth(username, Some(password.expose_secret()));
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }
}

impl HttpApi for ApiClient {
    async fn get(&self, path: &str) -> Result<serde_json::Value, Error> {
        self.get_json(path).await
    }
}

/// Map the response status to an error, or decode the body on success.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "invalid or missing credentials".into(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: error_message(&body, status),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// Pull the human-readable message out of an error body.
///
/// The server answers errors with `{"detail": "..."}`; anything else falls
/// back to the canonical reason phrase.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned())
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
