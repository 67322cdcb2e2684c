//! Explicit cancellation for long-running compilations.
//!
//! Tokens are passed as ordinary parameters into every potentially blocking
//! step, never carried in thread-local state. Cancellation is not an error
//! condition: it unwinds without producing a bytecode result or a diagnostic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// The operation was cancelled through its [`CancellationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the operation was cancelled")]
pub struct Cancelled;

/// Owner side of a cancellation flag.
#[derive(Debug, Default)]
pub struct CancellationSource {
    flag: Arc<AtomicBool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Observer side of a cancellation flag; cheap to clone and share across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    /// A token that can never be cancelled.
    pub const fn none() -> Self {
        CancellationToken { flag: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Bails out with [`Cancelled`] if the token has been triggered.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_its_source() {
        let source = CancellationSource::new();
        let token = source.token();

        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        source.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn none_token_never_cancels() {
        let token = CancellationToken::none();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn clones_share_the_flag() {
        let source = CancellationSource::new();
        let token = source.token();
        let clone = token.clone();

        source.cancel();
        assert!(clone.is_cancelled());
    }
}
