use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL for path '{path}': {message}")]
    InvalidUrl { path: String, message: String },

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    pub timeout_seconds: Option<u64>,
    pub proxy: Option<String>,
    pub header: Option<(String, String)>,
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

/// GETs endpoint paths relative to a fixed base URL.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self, ClientBuildError> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        let client = build_client(options)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    pub fn resolve(&self, path: &str) -> Result<reqwest::Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(path)?;
        let url_text = url.to_string();
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(TransportError::Connection {
                    url: url_text,
                    message: e.to_string(),
                })
            }
            Err(e) => {
                return Err(TransportError::Request {
                    url: url_text,
                    source: e,
                })
            }
        };
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| TransportError::Body {
            url: url_text,
            source: e,
        })?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn build_client(options: &ClientOptions) -> Result<reqwest::Client, ClientBuildError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!(
            "databrowse/",
            env!("CARGO_PKG_VERSION")
        )),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    if let Some((name, value)) = options.header.as_ref() {
        let key = reqwest::header::HeaderName::from_str(name.trim()).map_err(|_| {
            ClientBuildError::InvalidHeader {
                name: name.to_string(),
            }
        })?;
        let value = reqwest::header::HeaderValue::from_str(value.trim()).map_err(|_| {
            ClientBuildError::InvalidHeader {
                name: name.to_string(),
            }
        })?;
        headers.insert(key, value);
    }

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(secs) = options.timeout_seconds.filter(|s| *s > 0) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| ClientBuildError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientBuildError::HttpClientBuild { source: e })
}
