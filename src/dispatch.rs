use std::{error::Error as StdError, fmt, future::Future, time::Duration};

use tokio::time::sleep;

use crate::{
    transport::{OutgoingRequest, ResponseBody, Transport, TransportResponse},
    RequestError, ResponseCapture, Result,
};

/// Bounded fixed-delay retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Extra tries after the first failed attempt. `0` disables retrying.
    pub attempts: usize,
    /// Pause before every retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Marks which failures are worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Final failure of [`RetryPolicy::run`].
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of times the operation was invoked.
    pub attempts: usize,
    /// Error of the last invocation.
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.source
        )
    }
}

impl<E: StdError + 'static> StdError for RetryError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl RetryPolicy {
    /// Invokes `op` until it succeeds, fails with a non-retryable error, or
    /// `attempts` retries have been spent.
    ///
    /// The remaining count is decremented before each `delay` sleep, so `op`
    /// runs at most `attempts + 1` times.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Retryable,
    {
        let mut remaining = self.attempts;
        let mut performed = 0usize;
        loop {
            performed += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if remaining == 0 || !err.is_retryable() {
                return Err(RetryError {
                    attempts: performed,
                    source: err,
                });
            }

            remaining -= 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = performed,
                remaining,
                "retrying after {} ms",
                self.delay.as_millis()
            );

            sleep(self.delay).await;
        }
    }
}

/// Runs one logical call: up to `policy.attempts + 1` exchanges, then reads
/// the body of the first successful one.
///
/// Any HTTP status counts as success. Only transport failures are retried,
/// and a body read failure is returned as [`RequestError::Read`] right away.
pub async fn dispatch<T: Transport>(
    transport: &T,
    request: &OutgoingRequest,
    policy: &RetryPolicy,
) -> Result<ResponseCapture> {
    let response = policy
        .run(|| transport.exchange(request))
        .await
        .map_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                attempts = err.attempts,
                "giving up: {}",
                err.source
            );
            RequestError::Dispatch {
                attempts: err.attempts,
                source: err.source,
            }
        })?;
    capture(response).await
}

async fn capture<B: ResponseBody>(response: TransportResponse<B>) -> Result<ResponseCapture> {
    let TransportResponse {
        status,
        headers,
        body,
    } = response;
    let body = body.collect().await.map_err(RequestError::Read)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(status = status.as_u16(), bytes = body.len(), "captured response");

    Ok(ResponseCapture::new(status, headers, body))
}
