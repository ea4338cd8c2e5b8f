//! Memoized service initialization.
//!
//! An [`InitPromise`] wraps one invocation of a service's `init` and hands
//! the same outcome to every caller. Concurrent callers are deduplicated:
//! one of them drives the init future while the others wait for the result.

use std::future::{IntoFuture, poll_fn};
use std::sync::Arc;
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Notify, OnceCell};
use tracing::trace;

/// Outcome of a service initialization.
pub type InitOutcome = std::result::Result<Value, InitFailure>;

/// A service's `init` returned an error.
///
/// The failure is cached alongside the promise, so every awaiter receives
/// the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Service {service} failed to initialize: {message}")]
pub struct InitFailure {
    pub service: String,
    pub message: String,
}

impl InitFailure {
    pub fn new(service: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            service: service.into(),
            message: format!("{error:#}"),
        }
    }
}

struct InitState {
    /// Init future not yet claimed by a driver.
    pending: Mutex<Option<BoxFuture<'static, InitOutcome>>>,
    outcome: OnceCell<InitOutcome>,
    notify: Notify,
}

impl InitState {
    fn new(future: BoxFuture<'static, InitOutcome>) -> Self {
        Self {
            pending: Mutex::new(Some(future)),
            outcome: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn settle(&self, outcome: InitOutcome) {
        let _ = self.outcome.set(outcome);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> InitOutcome {
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome.clone();
            }

            let notified = self.notify.notified();
            if let Some(outcome) = self.outcome.get() {
                return outcome.clone();
            }

            let claimed = self.pending.lock().take();
            if let Some(future) = claimed {
                return self.drive(future).await;
            }

            notified.await;
        }
    }

    async fn drive(&self, future: BoxFuture<'static, InitOutcome>) -> InitOutcome {
        let mut driver = Driver {
            state: self,
            future: Some(future),
        };

        let outcome = poll_fn(|cx| match driver.future.as_mut() {
            Some(future) => future.poll_unpin(cx),
            None => Poll::Pending,
        })
        .await;
        driver.future = None;

        self.settle(outcome.clone());
        outcome
    }
}

/// Returns an unfinished init future to the pending slot when its driver
/// is dropped, so a waiting caller can take over.
struct Driver<'a> {
    state: &'a InitState,
    future: Option<BoxFuture<'static, InitOutcome>>,
}

impl Drop for Driver<'_> {
    fn drop(&mut self) {
        if let Some(future) = self.future.take() {
            trace!("Init driver dropped before completion, handing off");
            *self.state.pending.lock() = Some(future);
            self.state.notify.notify_waiters();
        }
    }
}

/// Cached, shareable handle on a single init invocation.
///
/// Await it (or call [`InitPromise::wait`]) to observe the outcome. When
/// created inside a tokio runtime the init starts immediately on a spawned
/// task; otherwise the first awaiter runs it.
#[derive(Clone)]
pub struct InitPromise {
    state: Arc<InitState>,
}

impl InitPromise {
    pub(crate) fn start(future: BoxFuture<'static, InitOutcome>) -> Self {
        let promise = Self {
            state: Arc::new(InitState::new(future)),
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let state = promise.state.clone();
            runtime.spawn(async move {
                let _ = state.wait().await;
            });
        }

        promise
    }

    /// Wait for the init to settle.
    pub async fn wait(&self) -> InitOutcome {
        self.state.wait().await
    }

    /// The outcome, if the init has settled.
    pub fn outcome(&self) -> Option<InitOutcome> {
        self.state.outcome.get().cloned()
    }

    pub fn is_settled(&self) -> bool {
        self.state.outcome.initialized()
    }

    /// Whether both handles refer to the same init invocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl IntoFuture for InitPromise {
    type Output = InitOutcome;
    type IntoFuture = BoxFuture<'static, InitOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.state.wait().await }.boxed()
    }
}

impl std::fmt::Debug for InitPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitPromise")
            .field("outcome", &self.state.outcome.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_init(
        calls: Arc<AtomicUsize>,
        outcome: InitOutcome,
    ) -> BoxFuture<'static, InitOutcome> {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            outcome
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let promise = InitPromise::start(counting_init(calls.clone(), Ok(json!("done"))));

        let waiters = (0..8).map(|_| promise.clone().into_future());
        let outcomes = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(|o| o == &Ok(json!("done"))));
        assert!(promise.is_settled());
    }

    #[tokio::test]
    async fn test_failure_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = InitFailure {
            service: "$broken".to_string(),
            message: "boom".to_string(),
        };
        let promise = InitPromise::start(counting_init(calls.clone(), Err(failure.clone())));

        assert_eq!(promise.wait().await, Err(failure.clone()));
        assert_eq!(promise.wait().await, Err(failure.clone()));
        assert_eq!(promise.outcome(), Some(Err(failure)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_awaiter_drives_without_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let promise = InitPromise::start(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(1))
            }
            .boxed(),
        );

        assert!(!promise.is_settled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let outcome = futures::executor::block_on(promise.wait());
        assert_eq!(outcome, Ok(json!(1)));
        assert_eq!(futures::executor::block_on(promise.wait()), Ok(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_driver_hands_off() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = Arc::new(InitState::new(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.await;
                Ok(json!("late"))
            }
            .boxed(),
        ));

        // First driver gives up before the init completes.
        let first = tokio::time::timeout(Duration::from_millis(5), state.wait()).await;
        assert!(first.is_err());

        let _ = release_tx.send(());
        assert_eq!(state.wait().await, Ok(json!("late")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_message() {
        let failure = InitFailure::new("$svc", &anyhow::anyhow!("backend down"));
        assert_eq!(
            failure.to_string(),
            "Service $svc failed to initialize: backend down"
        );
    }
}
