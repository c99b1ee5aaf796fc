//! HTTP client for the IncidentIQ REST API
//!
//! One `reqwest::Client` is shared by every worker. Authentication and the
//! headers the API expects are installed as defaults, and each request carries
//! the configured timeout.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::domain::FetchError;

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: crate::infrastructure::config::defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: format!("iiq-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Authenticated client bound to one IncidentIQ instance
#[derive(Clone)]
pub struct IiqClient {
    client: Client,
    base_url: Url,
}

/// Resolves the configured instance into a base URL; bare hosts get `https://`
pub fn base_url(instance: &str) -> Result<Url> {
    let instance = instance.trim().trim_end_matches('/');
    let raw = if instance.contains("://") {
        format!("{instance}/")
    } else {
        format!("https://{instance}/")
    };
    Url::parse(&raw).with_context(|| format!("invalid IncidentIQ instance '{instance}'"))
}

impl IiqClient {
    pub fn new(instance: &str, token: &str, config: &HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", token.trim())).context("token is not a valid header value")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(HeaderName::from_static("client"), HeaderValue::from_static("WebBrowser"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url(instance)?,
        })
    }

    /// Builds an absolute URL from an API path and a raw query string
    pub fn url(&self, path: &str, query: &str) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        Ok(url)
    }

    /// Sends one request and decodes the JSON body of a successful response
    pub async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, FetchError> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::Status {
            status: status.as_u16(),
        }
    } else {
        FetchError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("district.incidentiq.com", "https://district.incidentiq.com/")]
    #[case("district.incidentiq.com/", "https://district.incidentiq.com/")]
    #[case("http://localhost:8080", "http://localhost:8080/")]
    fn resolves_instance_urls(#[case] instance: &str, #[case] expected: &str) {
        assert_eq!(base_url(instance).unwrap().as_str(), expected);
    }

    #[test]
    fn keeps_odata_query_parameters_verbatim() {
        let client = IiqClient::new("district.incidentiq.com", "token", &HttpClientConfig::default()).unwrap();
        let url = client
            .url("/api/v1.0/teams/all", "$p=2&$s=500&$d=Descending")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://district.incidentiq.com/api/v1.0/teams/all?$p=2&$s=500&$d=Descending"
        );
    }

    #[test]
    fn rejects_tokens_that_cannot_be_headers() {
        assert!(IiqClient::new("district.incidentiq.com", "bad\ntoken", &HttpClientConfig::default()).is_err());
    }
}
