use anyhow::{Context, Result, bail};
use reqwest::Method;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;

use crate::config::ClientConfig;
use crate::error::{ApiErrorResponse, format_api_error};
use crate::resource::Document;
use crate::util::{append_query, auth_query, truncate_for_log, urljoin};

/// The network round trips the resource client is built on.
///
/// Paths are relative to the API base, e.g. `forecast` or
/// `forecast/5af06df94e17277501000010`. Each method is exactly one request.
pub trait Transport {
    fn create_resource(&self, endpoint: &str, body: &Document) -> Result<Document>;
    fn get_resource(&self, url: &str) -> Result<Document>;
    fn update_resource(&self, url: &str, body: &Document) -> Result<Document>;
    fn delete_resource(&self, url: &str) -> Result<Document>;
    fn list_resources(&self, endpoint: &str, query: &str) -> Result<Document>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn create_resource(&self, endpoint: &str, body: &Document) -> Result<Document> {
        (**self).create_resource(endpoint, body)
    }

    fn get_resource(&self, url: &str) -> Result<Document> {
        (**self).get_resource(url)
    }

    fn update_resource(&self, url: &str, body: &Document) -> Result<Document> {
        (**self).update_resource(url, body)
    }

    fn delete_resource(&self, url: &str) -> Result<Document> {
        (**self).delete_resource(url)
    }

    fn list_resources(&self, endpoint: &str, query: &str) -> Result<Document> {
        (**self).list_resources(endpoint, query)
    }
}

/// [`Transport`] over blocking HTTP, authenticating through the query string.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    auth: String,
    http: HttpClient,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("bigml-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("bigml-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(config.timeout);

        if !config.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            base_url: config.url.clone(),
            auth: auth_query(&config.username, &config.api_key),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_json(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<&Document>,
    ) -> Result<Document> {
        // `url` never carries credentials; it is the one that gets logged.
        let url = append_query(&urljoin(&self.base_url, path), query);
        let authed = append_query(&append_query(&urljoin(&self.base_url, path), &self.auth), query);
        tracing::debug!(%method, %url, "sending request");

        let mut req = self.http.request(method.clone(), &authed);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .map_err(|e| e.without_url())
            .with_context(|| format!("could not connect ({} {})", method, url))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| e.without_url())
            .with_context(|| format!("failed to read response body ({} {})", method, url))?;
        if !status.is_success() {
            tracing::error!(%status, %url, body = %truncate_for_log(&text), "API error");
            if let Ok(err_json) = serde_json::from_str::<ApiErrorResponse>(&text) {
                return Err(format_api_error(status, &url, &err_json));
            }

            bail!(
                "API request failed: HTTP {} for url ({})\n{}",
                status,
                url,
                truncate_for_log(&text)
            );
        }

        if text.trim().is_empty() {
            return Ok(Document::new());
        }

        serde_json::from_str::<Document>(&text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))
    }
}

impl Transport for HttpTransport {
    fn create_resource(&self, endpoint: &str, body: &Document) -> Result<Document> {
        self.api_json(Method::POST, endpoint, "", Some(body))
    }

    fn get_resource(&self, url: &str) -> Result<Document> {
        self.api_json(Method::GET, url, "", None)
    }

    fn update_resource(&self, url: &str, body: &Document) -> Result<Document> {
        self.api_json(Method::PUT, url, "", Some(body))
    }

    fn delete_resource(&self, url: &str) -> Result<Document> {
        self.api_json(Method::DELETE, url, "", None)
    }

    fn list_resources(&self, endpoint: &str, query: &str) -> Result<Document> {
        self.api_json(Method::GET, endpoint, query, None)
    }
}
