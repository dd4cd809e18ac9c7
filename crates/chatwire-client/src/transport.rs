//! HTTP transport for the chat backend.
//!
//! [`Transport`] turns a logical [`Endpoint`] into an HTTP call. Ordinary calls
//! are issued and decoded here; streaming calls are only *built* into a
//! [`RequestDescriptor`] and handed to the streaming layer unsent.
//!
//! No retries happen at this layer.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// A logical endpoint: method, path relative to the base address, query,
/// headers and an optional JSON body.
///
/// The body type parameter defaults to `()` for endpoints without a body.
#[derive(Debug, Clone)]
pub struct Endpoint<B = ()> {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<B>,
}

impl Endpoint<()> {
    /// Create a body-less endpoint.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// `GET` endpoint.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` endpoint.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PATCH` endpoint.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE` endpoint.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }
}

impl<B> Endpoint<B> {
    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a request header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body. Encoding is deferred to [`Transport::build`].
    #[must_use]
    pub fn json<C>(self, body: C) -> Endpoint<C> {
        Endpoint {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: Some(body),
        }
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path relative to the base address.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query parameters, in insertion order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// A fully resolved, not-yet-sent HTTP request.
///
/// Immutable once built. Produced by [`Transport::build`] and consumed by the
/// streaming layer, which may add its own headers at send time.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The absolute request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The encoded request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Turn the descriptor into a request builder on `client`.
    pub(crate) fn to_request(&self, client: &Client) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// HTTP transport bound to a base address.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
}

impl Transport {
    /// Create a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the base address is not an absolute http(s) URL,
    /// or `Config` if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;

        Self::with_client(client, &config.base_url)
    }

    /// Create a transport with a custom reqwest client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the base address is not an absolute http(s) URL.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Get the base address. Always ends with `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the request for `endpoint` without sending it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the path cannot be resolved, or `Encode` if the
    /// body cannot be serialized. Never performs network I/O.
    pub fn build<B: Serialize>(&self, endpoint: &Endpoint<B>) -> Result<RequestDescriptor> {
        let mut url = self
            .base_url
            .join(endpoint.path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", endpoint.path)))?;

        if !endpoint.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&endpoint.query);
        }

        let mut headers = endpoint.headers.clone();
        let body = match &endpoint.body {
            Some(body) => {
                let encoded = serde_json::to_vec(body).map_err(ClientError::Encode)?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(encoded)
            }
            None => None,
        };

        Ok(RequestDescriptor {
            method: endpoint.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Issue `endpoint` and decode the JSON response body as `T`.
    ///
    /// # Errors
    ///
    /// `InvalidUrl`/`Encode` from building, `Network` for transport failures,
    /// `HttpStatus` for non-2xx responses, `Decode` if the body is not a `T`.
    pub async fn execute<T, B>(&self, endpoint: &Endpoint<B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let descriptor = self.build(endpoint)?;
        let bytes = self.send(&descriptor).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(url = %descriptor.url, error = %e, "Failed to decode response");
            ClientError::Decode(e)
        })
    }

    /// Issue `endpoint` and discard the response body.
    ///
    /// # Errors
    ///
    /// Same classification as [`Transport::execute`], minus `Decode`.
    pub async fn execute_void<B: Serialize>(&self, endpoint: &Endpoint<B>) -> Result<()> {
        let descriptor = self.build(endpoint)?;
        self.send(&descriptor).await?;
        Ok(())
    }

    async fn send(&self, descriptor: &RequestDescriptor) -> Result<Vec<u8>> {
        tracing::debug!(method = %descriptor.method, url = %descriptor.url, "Sending request");

        let response = descriptor
            .to_request(&self.client)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.ok().filter(|body| !body.is_empty());
            tracing::debug!(url = %descriptor.url, status = %status, "Request failed");
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(ClientError::Network)?;
        Ok(bytes.to_vec())
    }
}

/// Parse a base address and make sure relative paths append to it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl(format!(
            "{raw}: base address must be an http(s) URL"
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
