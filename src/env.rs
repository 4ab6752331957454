//! Per-call environment handed to every driver operation.
//!
//! An [`Env`] carries the logging session the call belongs to and the
//! caller's cancellation signal. Nothing in this crate cancels or times out
//! a call on its own: the token is passed through untouched and honored by
//! the [`Invoker`](crate::invoker::Invoker) doing the actual exchange.
use tokio_util::sync::CancellationToken;
use tracing::Span;

#[derive(Debug, Clone)]
pub struct Env {
    span: Span,
    cancel: CancellationToken,
}

impl Env {
    pub fn new(span: Span, cancel: CancellationToken) -> Self {
        Self { span, cancel }
    }

    /// An environment attached to the current span that is never cancelled.
    pub fn background() -> Self {
        Self::new(Span::current(), CancellationToken::new())
    }

    /// Opens a named logging session nested under this environment.
    ///
    /// The child shares the cancellation token of its parent.
    pub fn session(&self, name: &'static str) -> Self {
        let span = tracing::info_span!(parent: &self.span, "session", session = name);
        Self {
            span,
            cancel: self.cancel.clone(),
        }
    }

    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::background()
    }
}
