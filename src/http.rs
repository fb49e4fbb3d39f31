//! HTTP Client Integration
//!
//! Provides HTTP client capabilities using reqwest for API communication
//! Supports async requests, JSON serialization/deserialization, and comprehensive error handling

use reqwest::{Client, Method, Request, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    pub default_headers: HashMap<String, String>,
    pub proxy_url: Option<String>,
    pub accept_invalid_certs: bool,
    pub cookie_store: bool,
    pub gzip: bool,
    pub brotli: bool,
    pub deflate: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = HashMap::new();
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());
        default_headers.insert("Accept".to_string(), "application/json".to_string());

        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_redirects: 10,
            user_agent: "argus-monitor/0.1.0".to_string(),
            default_headers,
            proxy_url: None,
            accept_invalid_certs: false,
            cookie_store: true,
            gzip: true,
            brotli: true,
            deflate: true,
        }
    }
}

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("URL parsing error: {0}")]
    UrlParseError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Client configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// HTTP authentication methods
#[derive(Debug, Clone)]
pub enum Authentication {
    None,
    Bearer(String),
    Basic(String, String),
}

/// HTTP request builder
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    query_params: HashMap<String, String>,
    body: Option<String>,
    authentication: Authentication,
    timeout: Option<Duration>,
}

impl HttpRequestBuilder {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
            authentication: Authentication::None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        let json_body = serde_json::to_string(body)
            .map_err(|e| HttpError::SerializationError(e.to_string()))?;
        self.body = Some(json_body);
        self.headers.insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn auth(mut self, authentication: Authentication) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self, client: &HttpClient) -> Result<Request, HttpError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| HttpError::UrlParseError(e.to_string()))?;

        // Add query parameters
        for (key, value) in &self.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        let mut request = client.inner.request(self.method, url);

        // Add headers
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        // Add authentication headers
        match &self.authentication {
            Authentication::None => {}
            Authentication::Bearer(token) => {
                request = request.bearer_auth(token);
            }
            Authentication::Basic(user, pass) => {
                request = request.basic_auth(user, Some(pass));
            }
        }

        // Add body
        if let Some(body) = self.body {
            request = request.body(body);
        }

        // Add timeout
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        request.build().map_err(|e| HttpError::RequestError(e.to_string()))
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    inner: Response,
}

impl HttpResponse {
    pub fn new(response: Response) -> Self {
        Self { inner: response }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &reqwest::header::HeaderMap {
        self.inner.headers()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    pub fn is_client_error(&self) -> bool {
        self.inner.status().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.inner.status().is_server_error()
    }

    pub async fn text(self) -> Result<String, HttpError> {
        self.inner
            .text()
            .await
            .map_err(|e| HttpError::ResponseError(e.to_string()))
    }

    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> Result<T, HttpError> {
        self.inner
            .json::<T>()
            .await
            .map_err(|e| HttpError::DeserializationError(e.to_string()))
    }

    pub async fn bytes(self) -> Result<bytes::Bytes, HttpError> {
        self.inner
            .bytes()
            .await
            .map_err(|e| HttpError::ResponseError(e.to_string()))
    }
}

/// Main HTTP client
pub struct HttpClient {
    inner: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .cookie_store(config.cookie_store)
            .gzip(config.gzip)
            .brotli(config.brotli)
            .deflate(config.deflate);

        // Add proxy if configured
        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::ConfigurationError(e.to_string()))?;
            client_builder = client_builder.proxy(proxy);
        }

        // Configure TLS
        if config.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| HttpError::ConfigurationError(e.to_string()))?;

        Ok(Self { inner: client, config })
    }

    /// Create a GET request builder
    pub fn get(&self, url: &str) -> HttpRequestBuilder {
        HttpRequestBuilder::new(Method::GET, url)
    }

    /// Create a POST request builder
    pub fn post(&self, url: &str) -> HttpRequestBuilder {
        HttpRequestBuilder::new(Method::POST, url)
    }

    /// Execute a request
    pub async fn execute(&self, request: Request) -> Result<HttpResponse, HttpError> {
        let response = self.inner
            .execute(request)
            .await
            .map_err(|e| HttpError::NetworkError(e.to_string()))?;

        Ok(HttpResponse::new(response))
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

/// Re-export commonly used reqwest types
pub use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
    StatusCode,
    Url,
};
