use std::{
    any::Any,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    task::Waker,
    thread::JoinHandle,
};

use crate::{completion::Completion, Error, WorkerConfig};

pub(crate) type Call<T> = Box<dyn FnOnce() -> T + Send>;
type Callback<T, R> = Box<dyn FnOnce(T) -> R + Send>;

/// Lifecycle of a [`Promise`]. No transition leaves `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed; `on` may still (re)configure it.
    Created,
    /// The worker has been started.
    Running,
    /// The worker has published an outcome.
    Done,
}

struct Handlers<T, R> {
    expected: T,
    on_success: Callback<T, R>,
    on_failure: Callback<T, R>,
}

pub(crate) struct Inner<T, R> {
    state: State,
    call: Option<Call<T>>,
    handlers: Option<Handlers<T, R>>,
    pub(crate) outcome: Option<Result<R, Error>>,
    pub(crate) wakers: Vec<Waker>,
}

pub(crate) struct Shared<T, R> {
    inner: Mutex<Inner<T, R>>,
    done: Condvar,
}

impl<T, R> Shared<T, R> {
    // The lock only guards plain fields written in one step, so a poisoned
    // guard is still consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<T, R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, outcome: Result<R, Error>) {
        let wakers = {
            let mut inner = self.lock();
            if inner.outcome.is_some() {
                return;
            }
            inner.outcome = Some(outcome);
            inner.state = State::Done;
            std::mem::take(&mut inner.wakers)
        };
        self.done.notify_all();
        for waker in wakers {
            waker.wake()
        }
    }
}

/// Publishes `WorkerLost` if a started worker unwinds before it stored an
/// outcome. Stays disarmed when the thread never ran.
struct Publisher<T, R> {
    shared: Arc<Shared<T, R>>,
    armed: bool,
}

impl<T, R> Drop for Publisher<T, R> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.publish(Err(Error::WorkerLost));
        }
    }
}

/// A deferred call of a wrapped function, plus the two callbacks its result
/// is dispatched to.
///
/// The wrapped function runs exactly once, on a dedicated worker thread
/// started by [`go`](Self::go) (or implicitly by [`wait`](Self::wait)). Its
/// result is compared against the value given to [`on`](Self::on): equal
/// results go to `on_success`, everything else to `on_failure`. The
/// callback's return value is what `wait` yields.
///
/// # Examples
///
/// ```
/// use promise_on::promise;
///
/// let add_one = promise(|n: i32| n + 1);
/// let result = add_one
///     .call(12)
///     .on(13, |n| format!("got {n}"), |n| format!("wanted 13, got {n}"))
///     .go()?
///     .wait()?;
/// assert_eq!(result, "got 13");
/// # Ok::<(), promise_on::Error>(())
/// ```
pub struct Promise<T, R> {
    shared: Arc<Shared<T, R>>,
    config: WorkerConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T, R> Promise<T, R>
where
    T: PartialEq + Send + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(call: Call<T>, config: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: State::Created,
                    call: Some(call),
                    handlers: None,
                    outcome: None,
                    wakers: vec![],
                }),
                done: Condvar::new(),
            }),
            config,
            worker: Mutex::new(None),
        }
    }

    /// Declares the expected result and the callbacks for either outcome.
    ///
    /// Nothing runs here. Calling `on` again before the promise starts
    /// replaces the previous expectation and callbacks. Once the promise has
    /// started the call is ignored.
    pub fn on<S, F>(&mut self, expected: T, on_success: S, on_failure: F) -> &mut Self
    where
        S: FnOnce(T) -> R + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        {
            let mut inner = self.shared.lock();
            if inner.state == State::Created {
                inner.handlers = Some(Handlers {
                    expected,
                    on_success: Box::new(on_success),
                    on_failure: Box::new(on_failure),
                });
            } else {
                tracing::warn!(
                    worker = self.config.worker_name(),
                    state = ?inner.state,
                    "ignoring `on` for a promise that already started"
                );
            }
        }
        self
    }

    /// Starts the worker if it has not been started yet, without blocking.
    ///
    /// Returns [`Error::NotConfigured`] when `on` has not been called. Calls
    /// on a running or finished promise do nothing, except that a promise
    /// whose worker could not be spawned keeps returning [`Error::Spawn`].
    pub fn go(&self) -> Result<&Self, Error> {
        let (call, handlers) = {
            let mut inner = self.shared.lock();
            if let Some(Err(err @ Error::Spawn(_))) = &inner.outcome {
                return Err(err.clone());
            }
            if inner.state != State::Created {
                tracing::trace!(
                    worker = self.config.worker_name(),
                    state = ?inner.state,
                    "promise already started"
                );
                return Ok(self);
            }
            if inner.handlers.is_none() {
                return Err(Error::NotConfigured);
            }
            let Some(job) = inner.call.take().zip(inner.handlers.take()) else {
                return Err(Error::WorkerLost);
            };
            inner.state = State::Running;
            job
        };

        let publisher = Publisher {
            shared: Arc::clone(&self.shared),
            armed: false,
        };
        let name = self.config.worker_name().to_owned();
        let spawned = self.config.spawn(move || {
            let mut publisher = publisher;
            publisher.armed = true;
            tracing::debug!(worker = %name, "promise worker started");
            let outcome = run(call, handlers, &name);
            tracing::debug!(worker = %name, ok = outcome.is_ok(), "promise worker finished");
            publisher.shared.publish(outcome);
        });

        match spawned {
            Ok(handle) => {
                *self.worker_slot() = Some(handle);
                Ok(self)
            }
            Err(err) => {
                let err = Error::from(err);
                tracing::warn!(
                    worker = self.config.worker_name(),
                    error = %err,
                    "could not start promise worker"
                );
                self.shared.publish(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Blocks until the worker is done and returns the callback's result.
    ///
    /// Starts the promise first if needed. Every call returns the same
    /// outcome, including a panic of the wrapped function or a callback.
    pub fn wait(&self) -> Result<R, Error>
    where
        R: Clone,
    {
        self.go()?;
        let outcome = {
            let inner = self
                .shared
                .done
                .wait_while(self.shared.lock(), |inner| inner.outcome.is_none())
                .unwrap_or_else(PoisonError::into_inner);
            inner.outcome.clone()
        };
        self.join_worker();
        outcome.unwrap_or(Err(Error::WorkerLost))
    }

    /// Starts the promise and returns a future resolving to the same outcome
    /// as [`wait`](Self::wait).
    pub fn completion(&self) -> Result<Completion<T, R>, Error> {
        self.go()?;
        Ok(Completion::new(Arc::clone(&self.shared)))
    }
}

impl<T, R> Promise<T, R> {
    pub fn state(&self) -> State {
        self.shared.lock().state
    }

    pub fn is_done(&self) -> bool {
        self.state() == State::Done
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_worker(&self) {
        if let Some(handle) = self.worker_slot().take() {
            if handle.join().is_err() {
                tracing::warn!(
                    worker = self.config.worker_name(),
                    "promise worker panicked after publishing"
                );
            }
        }
    }
}

/// Dropping a running promise detaches its worker. The worker still runs to
/// completion and its outcome is discarded with the last `Arc` to it.
impl<T, R> Drop for Promise<T, R> {
    fn drop(&mut self) {
        if self.worker_slot().is_some() && self.state() == State::Running {
            tracing::trace!(worker = self.config.worker_name(), "detaching running promise worker");
        }
    }
}

impl<T, R> fmt::Debug for Promise<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn run<T, R>(call: Call<T>, handlers: Handlers<T, R>, worker: &str) -> Result<R, Error>
where
    T: PartialEq,
{
    let raw = catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        let message = panic_message(payload);
        tracing::warn!(%worker, %message, "promised function panicked");
        Error::Callee(message)
    })?;

    let Handlers {
        expected,
        on_success,
        on_failure,
    } = handlers;
    let matched = raw == expected;
    tracing::debug!(%worker, matched, "dispatching promise result");
    let callback = if matched { on_success } else { on_failure };

    catch_unwind(AssertUnwindSafe(move || callback(raw))).map_err(|payload| {
        let message = panic_message(payload);
        tracing::warn!(%worker, %message, "promise callback panicked");
        Error::Callback(message)
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc,
    };

    fn promise_of<T, R>(call: impl FnOnce() -> T + Send + 'static) -> Promise<T, R>
    where
        T: PartialEq + Send + 'static,
        R: Send + 'static,
    {
        Promise::new(Box::new(call), WorkerConfig::default())
    }

    #[test]
    fn starts_in_created() {
        let promise = promise_of::<i32, i32>(|| 1);
        assert_eq!(promise.state(), State::Created);
        assert!(!promise.is_done());
    }

    #[test_log::test]
    fn go_without_on_is_a_usage_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let promise = promise_of::<i32, i32>(move || counter.fetch_add(1, Ordering::SeqCst) as i32);
        assert_eq!(promise.go().err(), Some(Error::NotConfigured));
        assert_eq!(promise.wait(), Err(Error::NotConfigured));
        assert_eq!(promise.state(), State::Created);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test_log::test]
    fn repeated_on_keeps_the_last_configuration() {
        let mut promise = promise_of(|| 3);
        promise.on(3, |_| "first success", |_| "first failure");
        promise.on(4, |_| "second success", |_| "second failure");
        assert_eq!(promise.wait(), Ok("second failure"));
    }

    #[test_log::test]
    fn on_after_start_is_ignored() {
        let (release, gate) = mpsc::channel::<()>();
        let mut promise = promise_of(move || {
            gate.recv().ok();
            1
        });
        promise.on(1, |n| n * 10, |n| n);
        promise.go().unwrap();
        promise.on(2, |_| -1, |_| -2);
        release.send(()).unwrap();
        assert_eq!(promise.wait(), Ok(10));
    }

    #[test_log::test]
    fn callee_panic_reaches_every_waiter() {
        let mut promise = promise_of::<i32, i32>(|| panic!("callee exploded"));
        promise.on(1, |n| n, |n| n);
        let expected = Err(Error::Callee("callee exploded".into()));
        assert_eq!(promise.wait(), expected);
        assert_eq!(promise.wait(), expected);
        assert_eq!(promise.state(), State::Done);
    }

    #[test_log::test]
    fn callback_panic_is_not_swallowed() {
        let mut promise = promise_of(|| 2);
        promise.on(2, |_: i32| -> i32 { panic!("success callback exploded") }, |n| n);
        assert_eq!(
            promise.wait(),
            Err(Error::Callback("success callback exploded".into()))
        );
    }

    #[test]
    fn formatted_panic_message_is_kept() {
        let mut promise = promise_of::<i32, i32>(|| panic!("bad value {}", 7));
        promise.on(0, |n| n, |n| n);
        assert_eq!(promise.wait(), Err(Error::Callee("bad value 7".into())));
    }

    #[test]
    fn worker_thread_uses_configured_name() {
        let mut promise: Promise<Option<String>, bool> = Promise::new(
            Box::new(|| std::thread::current().name().map(str::to_owned)),
            WorkerConfig::default().name("configured"),
        );
        promise.on(Some("configured".to_owned()), |_| true, |_| false);
        assert_eq!(promise.wait(), Ok(true));
    }

    #[test]
    fn promise_is_send_and_sync() {
        fn assert_send_sync<P: Send + Sync>() {}
        assert_send_sync::<Promise<String, Vec<u8>>>();
    }
}
