//! One-shot request bridge
//!
//! A `Promise` carries a request payload from a caller to the event loop and
//! the outcome back. The caller keeps the matching [`Completion`] and awaits
//! it; the loop completes the promise exactly once.
//!
//! ```text
//!   caller                              event loop
//!   ──────                              ──────────
//!   let (promise, done) = Promise::new(v)
//!   queue.send(promise) ──────────────► recv() -> promise
//!   done.await  ◄────────────────────── promise.fulfill(result)
//! ```
//!
//! Fulfilling consumes the promise, so a second completion does not
//! compile. If the loop drops a promise without fulfilling it (the loop
//! exited), the caller resolves with [`Error::ServerClosed`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Request payload plus its single-use completion
#[derive(Debug)]
pub struct Promise<T, R = ()> {
    value: T,
    tx: oneshot::Sender<Result<R>>,
}

impl<T, R> Promise<T, R> {
    /// Create a promise and the completion the caller awaits
    pub fn new(value: T) -> (Self, Completion<R>) {
        let (tx, rx) = oneshot::channel();
        (Self { value, tx }, Completion { rx })
    }

    /// The request payload
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether the caller stopped waiting
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// Complete with `result`, returning the payload
    pub fn fulfill(self, result: Result<R>) -> T {
        // The caller may have given up; the outcome stands either way.
        let _ = self.tx.send(result);
        self.value
    }

    /// Complete successfully
    pub fn resolve(self, outcome: R) -> T {
        self.fulfill(Ok(outcome))
    }

    /// Complete with an error
    pub fn reject(self, err: Error) -> T {
        self.fulfill(Err(err))
    }
}

/// Caller side of a promise
#[derive(Debug)]
pub struct Completion<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Future for Completion<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::ServerClosed)))
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[tokio::test]
    async fn test_resolve() {
        let (promise, done) = Promise::<&str, u32>::new("request");
        assert_eq!(*promise.value(), "request");

        let value = promise.resolve(42);
        assert_eq!(value, "request");
        assert_eq!(done.await, Ok(42));
    }

    #[tokio::test]
    async fn test_reject() {
        let (promise, done) = Promise::<u64>::new(9);
        promise.reject(Error::NotFound(9));
        assert_eq!(done.await, Err(Error::NotFound(9)));
    }

    #[tokio::test]
    async fn test_dropped_promise_closes() {
        let (promise, done) = Promise::<u64>::new(1);
        drop(promise);
        assert_eq!(done.await, Err(Error::ServerClosed));
    }

    #[test]
    fn test_pending_until_fulfilled() {
        let (promise, done) = Promise::<()>::new(());
        let mut done = task::spawn(done);

        assert_pending!(done.poll());
        promise.resolve(());
        assert!(done.is_woken());
        assert_ready_eq!(done.poll(), Ok(()));
    }

    #[test]
    fn test_abandoned() {
        let (promise, done) = Promise::<()>::new(());
        assert!(!promise.is_abandoned());
        drop(done);
        assert!(promise.is_abandoned());
    }
}
