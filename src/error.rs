use std::{io, sync::Arc};

/// Everything that can go wrong between `go` and `wait`.
///
/// Errors are `Clone` because a finished promise hands the same outcome to
/// every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// `go` or `wait` was called before `on` attached the callbacks.
    #[error("promise has no callbacks; call `on` before `go` or `wait`")]
    NotConfigured,
    /// The wrapped function panicked inside the worker.
    #[error("promised function panicked: {0}")]
    Callee(String),
    /// `on_success` or `on_failure` panicked inside the worker.
    #[error("promise callback panicked: {0}")]
    Callback(String),
    #[error("failed to spawn promise worker")]
    Spawn(#[source] Arc<io::Error>),
    /// The worker exited without publishing an outcome.
    #[error("promise worker exited without a result")]
    WorkerLost,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Spawn(Arc::new(err))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::NotConfigured, Error::NotConfigured) => true,
            (Error::Callee(a), Error::Callee(b)) => a == b,
            (Error::Callback(a), Error::Callback(b)) => a == b,
            (Error::Spawn(a), Error::Spawn(b)) => a.kind() == b.kind(),
            (Error::WorkerLost, Error::WorkerLost) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn spawn_error_keeps_source() {
        let err: Error = io::Error::new(io::ErrorKind::OutOfMemory, "no threads left").into();
        assert!(matches!(err, Error::Spawn(_)));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("no threads left"));
    }

    #[test]
    fn cloned_errors_compare_equal() {
        let err = Error::Callee("boom".into());
        assert_eq!(err.clone(), err);
        assert_ne!(err, Error::Callback("boom".into()));
    }
}
