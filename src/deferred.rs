//! Single-resolution futures that carry process answers back to callers.
//!
//! [`deferred()`] returns a [`Resolver`] kept by the engine and a
//! [`Deferred`] handed to the caller. Resolving consumes the resolver, so a
//! request can be answered at most once. A resolver dropped without an answer
//! makes the caller see [`EngineError::Closed`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{CloseReason, EngineError};

/// Create a connected resolver/future pair.
pub fn deferred<T>() -> (Resolver<T>, Deferred<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Deferred { rx })
}

/// Sending half of a deferred answer.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T, EngineError>>,
}

impl<T> Resolver<T> {
    /// Complete the future with a value.
    ///
    /// If the caller has dropped its [`Deferred`], the value is dropped here.
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    /// Complete the future with an error.
    pub fn reject(self, err: EngineError) {
        let _ = self.tx.send(Err(err));
    }

    /// Whether the caller is gone.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Future for an answer that arrives later.
#[derive(Debug)]
#[must_use = "a Deferred does nothing unless awaited"]
pub struct Deferred<T> {
    rx: oneshot::Receiver<Result<T, EngineError>>,
}

impl<T> Deferred<T> {
    /// A future that is already complete.
    pub fn resolved(value: T) -> Self {
        let (resolver, deferred) = deferred();
        resolver.resolve(value);
        deferred
    }

    /// A future that has already failed.
    pub fn rejected(err: EngineError) -> Self {
        let (resolver, deferred) = deferred();
        resolver.reject(err);
        deferred
    }

    /// Take the answer if it has arrived, without waiting.
    pub fn try_take(&mut self) -> Option<Result<T, EngineError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(EngineError::Closed(CloseReason::Dropped)))
            }
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(EngineError::Closed(CloseReason::Dropped)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_resolve_delivers_value() {
        let (resolver, deferred) = deferred::<u32>();
        tokio::spawn(async move { resolver.resolve(7) });
        let value = timeout(TEST_TIMEOUT, deferred)
            .await
            .expect("Test timed out")
            .expect("Deferred rejected");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let (resolver, deferred) = deferred::<u32>();
        resolver.reject(EngineError::Query("boom".to_string()));
        let err = deferred.await.unwrap_err();
        assert!(matches!(err, EngineError::Query(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_dropped_resolver_reports_closed() {
        let (resolver, deferred) = deferred::<u32>();
        drop(resolver);
        let err = deferred.await.unwrap_err();
        assert!(matches!(err, EngineError::Closed(CloseReason::Dropped)));
    }

    #[test]
    fn test_try_take() {
        let (resolver, mut deferred) = deferred::<&str>();
        assert!(deferred.try_take().is_none());
        resolver.resolve("done");
        assert_eq!(deferred.try_take().unwrap().unwrap(), "done");
    }

    #[test]
    fn test_abandoned_when_receiver_dropped() {
        let (resolver, deferred) = deferred::<()>();
        assert!(!resolver.is_abandoned());
        drop(deferred);
        assert!(resolver.is_abandoned());
        // Resolving an abandoned future is harmless.
        resolver.resolve(());
    }

    #[tokio::test]
    async fn test_ready_constructors() {
        assert_eq!(Deferred::resolved(3).await.unwrap(), 3);
        let err = Deferred::<()>::rejected(EngineError::Io("x".into())).await;
        assert!(err.is_err());
    }
}
