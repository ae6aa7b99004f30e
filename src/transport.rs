use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode};

use crate::TransportError;

/// One outgoing exchange as handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Encoded body; cloning only bumps a reference count.
    pub body: Bytes,
    /// Per-attempt timeout, enforced by the transport.
    pub timeout: Option<Duration>,
    pub tls: Option<Arc<TlsConfig>>,
}

/// Status line and headers of an exchange, with the body not yet read.
#[derive(Debug)]
pub struct TransportResponse<B> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: B,
}

/// Unread response body bound to the underlying connection.
///
/// `collect` consumes the body, so the connection is released when the
/// returned future completes, whether reading succeeded or not.
pub trait ResponseBody: Send {
    fn collect(self) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// Performs a single request/response exchange.
pub trait Transport: Send + Sync {
    type Body: ResponseBody;

    fn exchange(
        &self,
        request: &OutgoingRequest,
    ) -> impl Future<Output = Result<TransportResponse<Self::Body>, TransportError>> + Send;
}

/// Minimum protocol version accepted during the TLS handshake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl From<TlsVersion> for reqwest::tls::Version {
    fn from(value: TlsVersion) -> Self {
        match value {
            TlsVersion::Tls12 => Self::TLS_1_2,
            TlsVersion::Tls13 => Self::TLS_1_3,
        }
    }
}

/// TLS settings applied by the transport.
///
/// The dispatcher never looks inside; it only forwards the shared handle.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Additional PEM-encoded root certificates.
    pub root_certificates: Vec<Vec<u8>>,
    /// PEM bundle holding a client certificate chain and private key.
    pub identity_pem: Option<Vec<u8>>,
    pub accept_invalid_certs: bool,
    pub min_version: Option<TlsVersion>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("root_certificates", &self.root_certificates.len())
            .field(
                "identity_pem",
                &self.identity_pem.as_ref().map(|_| "<redacted>"),
            )
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("min_version", &self.min_version)
            .finish()
    }
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates.push(pem.into());
        self
    }

    pub fn with_identity(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.identity_pem = Some(pem.into());
        self
    }

    pub fn with_min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Disables certificate verification. Only meant for test servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder();
        for pem in &self.root_certificates {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|err| TransportError::Tls(format!("invalid root certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(pem) = &self.identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|err| TransportError::Tls(format!("invalid client identity: {err}")))?;
            builder = builder.identity(identity);
        }
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(version) = self.min_version {
            builder = builder.min_tls_version(version.into());
        }
        builder
            .build()
            .map_err(|err| TransportError::Tls(err.to_string()))
    }
}

/// Default [`Transport`] backed by `reqwest`.
///
/// Requests without TLS settings share one pooled client. The client built for
/// the most recent [`TlsConfig`] is kept and reused while the same shared
/// config is passed in.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    tls_client: Mutex<Option<(Arc<TlsConfig>, reqwest::Client)>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured `reqwest` client for requests without TLS settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            tls_client: Mutex::new(None),
        }
    }

    fn client_for(&self, tls: Option<&Arc<TlsConfig>>) -> Result<reqwest::Client, TransportError> {
        let Some(tls) = tls else {
            return Ok(self.http.clone());
        };

        let mut cached = match self.tls_client.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((config, client)) = cached.as_ref() {
            if Arc::ptr_eq(config, tls) {
                return Ok(client.clone());
            }
        }

        let client = tls.build_client()?;
        *cached = Some((Arc::clone(tls), client.clone()));
        Ok(client)
    }
}

impl Transport for ReqwestTransport {
    type Body = ReqwestBody;

    fn exchange(
        &self,
        request: &OutgoingRequest,
    ) -> impl Future<Output = Result<TransportResponse<ReqwestBody>, TransportError>> + Send {
        let prepared = self.client_for(request.tls.as_ref()).map(|client| {
            let mut builder = client
                .request(request.method.clone(), &request.url)
                .headers(request.headers.clone());
            if !request.body.is_empty() {
                builder = builder.body(request.body.clone());
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            builder
        });

        async move {
            let response = prepared?.send().await?;
            Ok(TransportResponse {
                status: response.status(),
                headers: response.headers().clone(),
                body: ReqwestBody(response),
            })
        }
    }
}

/// Unread body of a `reqwest` response.
#[derive(Debug)]
pub struct ReqwestBody(reqwest::Response);

impl ResponseBody for ReqwestBody {
    fn collect(self) -> impl Future<Output = Result<Bytes, TransportError>> + Send {
        async move { self.0.bytes().await.map_err(TransportError::from) }
    }
}
