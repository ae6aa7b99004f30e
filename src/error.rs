use crate::Retryable;

/// Failure to turn a [`Payload`](crate::Payload) into request body bytes.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The payload could not be serialized to JSON.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
    /// The payload shape has no body encoding (numbers, booleans, null, arrays).
    #[error("unsupported payload: {kind}")]
    UnsupportedPayload {
        /// Short name of the rejected JSON shape.
        kind: &'static str,
    },
    /// Reading a [`Payload::Reader`](crate::Payload::Reader) source failed.
    #[error("payload read error: {0}")]
    Read(#[source] std::io::Error),
}

/// Failure of a single exchange reported by a [`Transport`](crate::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect error: {0}")]
    Connect(String),
    /// The per-attempt timeout elapsed.
    #[error("timeout: {0}")]
    Timeout(String),
    /// TLS configuration could not be applied.
    #[error("tls error: {0}")]
    Tls(String),
    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The request failed while in flight.
    #[error("request error: {0}")]
    Request(String),
    /// Streaming the response body failed.
    #[error("body error: {0}")]
    Body(String),
    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl Retryable for TransportError {
    /// TLS setup and request-building failures repeat on every attempt.
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Tls(_) | Self::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            Self::InvalidRequest(message)
        } else if err.is_timeout() {
            Self::Timeout(message)
        } else if err.is_connect() {
            Self::Connect(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else if err.is_request() {
            Self::Request(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The payload was rejected before any network attempt.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// Every permitted attempt failed; carries the last transport error.
    #[error("dispatch failed after {attempts} attempt(s): {source}")]
    Dispatch {
        /// Number of transport invocations performed.
        attempts: usize,
        /// Error of the final attempt.
        #[source]
        source: TransportError,
    },
    /// The exchange succeeded but reading the response body failed.
    #[error("response read error: {0}")]
    Read(#[source] TransportError),
    /// The captured body is not the expected JSON shape.
    #[error("deserialization error: {0}")]
    Deserialize(#[source] serde_json::Error),
    /// A configured header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// No response has been captured yet.
    #[error("no response captured")]
    NoResponse,
    /// Environment configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use crate::{RequestError, Retryable, TransportError};

    #[test]
    fn tls_and_builder_failures_are_not_retryable() {
        assert!(!TransportError::Tls("bad pem".to_owned()).is_retryable());
        assert!(!TransportError::InvalidRequest("bad url".to_owned()).is_retryable());
        assert!(TransportError::Connect("refused".to_owned()).is_retryable());
        assert!(TransportError::Timeout("slow".to_owned()).is_retryable());
    }

    #[test]
    fn dispatch_error_mentions_attempts_and_cause() {
        let err = RequestError::Dispatch {
            attempts: 3,
            source: TransportError::Connect("refused".to_owned()),
        };
        let message = err.to_string();
        assert!(message.contains("3 attempt(s)"));
        assert!(message.contains("refused"));
    }
}
