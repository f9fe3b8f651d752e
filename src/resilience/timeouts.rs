//! Timeout enforcement.
//!
//! Each attempt gets its own deadline of the full configured duration,
//! started when the attempt starts. Nothing carries over from a previous
//! attempt. The deadline covers the wait for response headers and, once a
//! response is accepted, the streaming of its body to the client.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use futures_util::stream::{self, StreamExt};
use tokio::time::{self, Instant};

use crate::resilience::retries::AttemptError;

/// Run one attempt under a fresh deadline.
pub async fn with_attempt_timeout<F, T>(deadline: Duration, attempt: F) -> Result<T, AttemptError>
where
    F: Future<Output = Result<T, AttemptError>>,
{
    match time::timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(AttemptError::Timeout(deadline)),
    }
}

/// Stream `body` until `until`; past that the body fails with a timeout error.
///
/// `held` is kept alive until the stream ends or the body is dropped.
pub fn with_body_deadline<H>(body: Body, until: Instant, budget: Duration, held: H) -> Body
where
    H: Send + 'static,
{
    let sleep = Box::pin(time::sleep_until(until));
    let state = (body.into_data_stream(), sleep, Some(held));

    let chunks = stream::unfold(state, move |(mut data, mut sleep, held)| async move {
        held.as_ref()?;
        tokio::select! {
            chunk = data.next() => match chunk {
                Some(chunk) => Some((chunk, (data, sleep, held))),
                None => None,
            },
            _ = &mut sleep => {
                let timeout = axum::Error::new(AttemptError::Timeout(budget));
                Some((Err(timeout), (data, sleep, None)))
            }
        }
    });

    Body::from_stream(chunks)
}
