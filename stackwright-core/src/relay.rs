//! Pull-based relay from a streamed completion to a byte consumer.
//!
//! The relay holds no buffer of its own. Each poll pulls at most one
//! fragment from upstream and hands it straight to the consumer, so a slow
//! consumer slows the upstream read. Dropping the relay drops the upstream
//! response and cancels the call.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::{Stream, StreamExt};

use crate::error::GenerateError;
use crate::llm::{FragmentStream, GenerationOptions, Prompt, TextGenerator};

/// Lifecycle of one relayed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Requesting,
    Relaying,
    /// Upstream finished cleanly.
    Closed,
    /// The request or the stream failed.
    Failed,
}

/// A single streamed call, relayed fragment by fragment as UTF-8 bytes.
///
/// Consumers see `Ok(bytes)` per fragment, then either end-of-stream (clean
/// close) or one `Err(GenerateError::StreamAborted)` followed by
/// end-of-stream.
pub struct FragmentRelay {
    state: RelayState,
    upstream: Option<FragmentStream>,
    relayed: usize,
}

impl FragmentRelay {
    pub fn new() -> Self {
        Self {
            state: RelayState::Idle,
            upstream: None,
            relayed: 0,
        }
    }

    /// Relay an already-open fragment stream.
    pub fn from_stream(upstream: FragmentStream) -> Self {
        Self {
            state: RelayState::Relaying,
            upstream: Some(upstream),
            relayed: 0,
        }
    }

    /// Issue the streamed request.
    ///
    /// On failure the relay moves to [`RelayState::Failed`] and the error is
    /// returned here; nothing will be yielded from the stream.
    pub async fn start(
        &mut self,
        generator: &dyn TextGenerator,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<(), GenerateError> {
        if self.state != RelayState::Idle {
            return Err(GenerateError::StreamAborted(
                "relay was already started".to_string(),
            ));
        }
        self.state = RelayState::Requesting;
        match generator.generate_stream(prompt, options).await {
            Ok(upstream) => {
                self.upstream = Some(upstream);
                self.state = RelayState::Relaying;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Streamed request failed");
                self.state = RelayState::Failed;
                Err(e.into())
            }
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Number of fragments handed to the consumer so far.
    pub fn relayed(&self) -> usize {
        self.relayed
    }
}

impl Default for FragmentRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FragmentRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentRelay")
            .field("state", &self.state)
            .field("relayed", &self.relayed)
            .finish()
    }
}

impl Stream for FragmentRelay {
    type Item = Result<Vec<u8>, GenerateError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != RelayState::Relaying {
            return Poll::Ready(None);
        }
        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(upstream.poll_next_unpin(cx)) {
            Some(Ok(fragment)) => {
                this.relayed += 1;
                Poll::Ready(Some(Ok(fragment.into_bytes())))
            }
            Some(Err(e)) => {
                tracing::warn!(relayed = this.relayed, error = %e, "Stream aborted");
                this.state = RelayState::Failed;
                this.upstream = None;
                Poll::Ready(Some(Err(GenerateError::StreamAborted(e.to_string()))))
            }
            None => {
                tracing::debug!(relayed = this.relayed, "Stream closed");
                this.state = RelayState::Closed;
                this.upstream = None;
                Poll::Ready(None)
            }
        }
    }
}
