//! H-Bank HTTP client

pub mod auth;
pub mod config;
pub mod error;

use crate::cookies::CookieJar;
pub use error::ClientError;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("hbank-client/", env!("CARGO_PKG_VERSION"));

/// Whether a status is handed to application code instead of being turned
/// into an error
///
/// 401 and 403 are ordinary outcomes for the session layer (no valid
/// refresh token, revoked session) and must not surface as transport
/// failures.
pub fn accepts_status(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// H-Bank API client
///
/// Clones share the underlying connection pool and cookie jar.
#[derive(Clone)]
pub struct HbankClient {
    client: Client,
    base_url: String,
    login_endpoint: Url,
    cookies: Arc<CookieJar>,
}

impl std::fmt::Debug for HbankClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HbankClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HbankClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> HbankClientBuilder {
        HbankClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cookie jar shared with every clone of this client
    pub fn cookies(&self) -> &Arc<CookieJar> {
        &self.cookies
    }

    /// Create a request builder; cookies are attached by the jar
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request, rejecting statuses outside [`accepts_status`]
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if accepts_status(status) {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Send a request and decode its JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Builder for HbankClient
#[derive(Default)]
pub struct HbankClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    cookies: Option<Arc<CookieJar>>,
    cookie_file: Option<PathBuf>,
}

impl HbankClientBuilder {
    /// Set the base URL, e.g. `https://hbank.julianh.de/api`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use an existing cookie jar instead of a fresh one
    ///
    /// The jar must be bound to the host of the base URL.
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    /// Back the client's fresh cookie jar with a JSON file
    ///
    /// The file is not read here; see [`CookieJar::reload`].
    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HbankClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let login_endpoint = Url::parse(&format!("{base_url}/auth/login"))
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;

        let host = login_endpoint
            .host_str()
            .ok_or_else(|| ClientError::Configuration(format!("base_url {base_url:?} has no host")))?;
        let cookies = match (self.cookies, self.cookie_file) {
            (Some(_), Some(_)) => {
                return Err(ClientError::Configuration(
                    "cookie_jar and cookie_file are mutually exclusive".into(),
                ));
            }
            (Some(jar), None) if !jar.host().eq_ignore_ascii_case(host) => {
                return Err(ClientError::Configuration(format!(
                    "cookie jar belongs to {}, not {host}",
                    jar.host()
                )));
            }
            (Some(jar), None) => jar,
            (None, Some(path)) => Arc::new(CookieJar::for_host(host).with_backing_file(path)),
            (None, None) => Arc::new(CookieJar::for_host(host)),
        };

        let mut client_builder = ClientBuilder::new()
            .cookie_provider(cookies.clone())
            .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(HbankClient {
            client,
            base_url,
            login_endpoint,
            cookies,
        })
    }
}
