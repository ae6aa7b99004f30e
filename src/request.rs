use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};
use serde_json::{Map, Value};

use crate::{
    dispatch::dispatch,
    payload::encode,
    transport::{OutgoingRequest, Transport},
    Payload, ReqwestTransport, RequestError, ResponseCapture, Result, RetryPolicy, TlsConfig,
};

/// Request settings plus the holder for the most recent response.
///
/// The verb methods ([`get`](Self::get), [`post`](Self::post),
/// [`put`](Self::put), [`delete`](Self::delete)) take `&mut self` and store
/// their result in the holder, so one config serves one call at a time. For
/// concurrent calls use [`send`](Self::send), which returns the response
/// directly, or give each call its own config.
pub struct RequestConfig<T: Transport = ReqwestTransport> {
    /// TLS settings for the next dispatch; `None` uses platform defaults.
    pub tls: Option<Arc<TlsConfig>>,
    /// Extra tries after a failed first attempt.
    pub retry: usize,
    /// Pause before each retry.
    pub retry_delay: Duration,
    /// Per-attempt timeout; `None` leaves it to the transport.
    pub timeout: Option<Duration>,
    /// Headers attached to every request.
    pub headers: HeaderMap,
    transport: T,
    response: Option<ResponseCapture>,
}

impl<T: Transport + fmt::Debug> fmt::Debug for RequestConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("tls", &self.tls)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("transport", &self.transport)
            .field("response", &self.response.as_ref().map(ResponseCapture::status))
            .finish()
    }
}

impl RequestConfig {
    /// Creates a config on the default `reqwest` transport: no headers,
    /// 10 retries, 10 s between retries, platform TLS.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a config from environment variables, falling back to the
    /// defaults of [`RequestConfig::new`].
    ///
    /// Reads:
    /// - `REQUESTS_RETRY` — number of retries
    /// - `REQUESTS_RETRY_DELAY_MS` — delay between retries in milliseconds
    /// - `REQUESTS_TIMEOUT_MS` — per-attempt timeout in milliseconds
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        if let Some(retry) = env_number::<usize>("REQUESTS_RETRY")? {
            config.retry = retry;
        }
        if let Some(delay_ms) = env_number::<u64>("REQUESTS_RETRY_DELAY_MS")? {
            config.retry_delay = Duration::from_millis(delay_ms);
        }
        if let Some(timeout_ms) = env_number::<u64>("REQUESTS_TIMEOUT_MS")? {
            config.timeout = Some(Duration::from_millis(timeout_ms));
        }
        Ok(config)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> RequestConfig<T> {
    /// Creates a config with the default settings on a custom transport.
    pub fn with_transport(transport: T) -> Self {
        let policy = RetryPolicy::default();
        Self {
            tls: None,
            retry: policy.attempts,
            retry_delay: policy.delay,
            timeout: None,
            headers: HeaderMap::new(),
            transport,
            response: None,
        }
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(Arc::new(tls));
        self
    }

    pub fn with_retry(mut self, retry: usize) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Sets a header, replacing any existing value under the same
    /// case-insensitive name.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| RequestError::InvalidHeader(format!("{name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| RequestError::InvalidHeader(format!("{name}: {err}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry, self.retry_delay)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Response of the last successful verb call.
    ///
    /// A failed call leaves the previous response in place.
    pub fn response(&self) -> Option<&ResponseCapture> {
        self.response.as_ref()
    }

    /// Parses the held response body as a top-level JSON object.
    pub fn decode_json(&self) -> Result<Map<String, Value>> {
        self.response
            .as_ref()
            .ok_or(RequestError::NoResponse)?
            .decode_json()
    }

    /// Sends a GET request without a body.
    pub async fn get(&mut self, url: &str) -> Result<()> {
        self.call(Method::GET, url, Payload::Empty).await
    }

    pub async fn post(&mut self, url: &str, body: impl Into<Payload>) -> Result<()> {
        self.call(Method::POST, url, body.into()).await
    }

    pub async fn put(&mut self, url: &str, body: impl Into<Payload>) -> Result<()> {
        self.call(Method::PUT, url, body.into()).await
    }

    pub async fn delete(&mut self, url: &str, body: impl Into<Payload>) -> Result<()> {
        self.call(Method::DELETE, url, body.into()).await
    }

    /// Encodes `body`, dispatches it under the retry policy and returns the
    /// response without touching the holder.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<ResponseCapture> {
        let request = self.build_request(method, url, body.into())?;
        dispatch(&self.transport, &request, &self.retry_policy()).await
    }

    async fn call(&mut self, method: Method, url: &str, body: Payload) -> Result<()> {
        let response = self.send(method, url, body).await?;
        self.response = Some(response);
        Ok(())
    }

    fn build_request(&self, method: Method, url: &str, body: Payload) -> Result<OutgoingRequest> {
        let encoded = encode(body)?;
        let mut headers = self.headers.clone();
        if let Some(content_type) = encoded.content_type {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        Ok(OutgoingRequest {
            method,
            url: url.to_owned(),
            headers,
            body: encoded.bytes,
            timeout: self.timeout,
            tls: self.tls.clone(),
        })
    }
}

fn env_number<N: FromStr>(key: &str) -> Result<Option<N>>
where
    N::Err: fmt::Display,
{
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<N>()
        .map(Some)
        .map_err(|err| RequestError::Config(format!("{key}='{trimmed}': {err}")))
}
