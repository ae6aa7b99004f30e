//! `retry-requests` is a small async HTTP request helper.
//!
//! A [`RequestConfig`] holds headers, TLS settings and a retry policy. Its
//! verb methods encode a [`Payload`], dispatch the request with bounded
//! fixed-delay retries and keep the result as a [`ResponseCapture`]:
//! - [`RequestConfig::get`]
//! - [`RequestConfig::post`]
//! - [`RequestConfig::put`]
//! - [`RequestConfig::delete`]
//!
//! [`RequestConfig::send`] returns the response directly instead.

mod dispatch;
mod error;
mod payload;
mod request;
mod response;
mod transport;

pub use dispatch::{dispatch, RetryError, RetryPolicy, Retryable};
pub use error::{EncodingError, RequestError, TransportError};
pub use payload::{encode, EncodedBody, Payload};
pub use request::RequestConfig;
pub use response::ResponseCapture;
pub use transport::{
    OutgoingRequest, ReqwestBody, ReqwestTransport, ResponseBody, TlsConfig, TlsVersion,
    Transport, TransportResponse,
};

pub use reqwest::{header, Method, StatusCode};

pub type Result<T> = std::result::Result<T, RequestError>;
