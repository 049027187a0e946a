use std::fmt;
use std::sync::Arc;

use crate::{Promise, WorkerConfig};

/// A function turned into a promise factory by [`promise`](crate::promise).
///
/// Arguments are bound when the factory is called, not when it is built.
/// Functions of several arguments take a tuple.
///
/// # Examples
///
/// ```
/// use promise_on::promise;
///
/// let add_one = promise(|n: i32| n + 1);
///
/// // Deferred, dispatched on a worker thread.
/// assert_eq!(add_one.call(5).on(6, |n| n + 1, |_| 0).wait(), Ok(7));
///
/// // Bypassed, runs right here.
/// assert_eq!(add_one.call_now(5), 6);
/// ```
pub struct Deferred<F> {
    func: Arc<F>,
    config: WorkerConfig,
}

/// What [`Deferred::invoke`] produced.
#[derive(Debug)]
pub enum Called<T, R> {
    /// A new promise in the `Created` state.
    Promise(Promise<T, R>),
    /// The raw result of a bypassed call.
    Value(T),
}

impl<T, R> Called<T, R> {
    pub fn into_promise(self) -> Option<Promise<T, R>> {
        match self {
            Called::Promise(promise) => Some(promise),
            Called::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Called::Promise(_) => None,
            Called::Value(value) => Some(value),
        }
    }
}

impl<F> Deferred<F> {
    pub(crate) fn new(func: F, config: WorkerConfig) -> Self {
        Self {
            func: Arc::new(func),
            config,
        }
    }

    /// Names the worker threads of every promise made from here on.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            config: self.config.name(name),
            ..self
        }
    }

    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            config: self.config.stack_size(stack_size),
            ..self
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Captures `args` in a new promise. Nothing runs until the promise is
    /// started.
    pub fn call<A, T, R>(&self, args: A) -> Promise<T, R>
    where
        F: Fn(A) -> T + Send + Sync + 'static,
        A: Send + 'static,
        T: PartialEq + Send + 'static,
        R: Send + 'static,
    {
        let func = Arc::clone(&self.func);
        Promise::new(Box::new(move || func(args)), self.config.clone())
    }

    /// Calls the wrapped function synchronously and returns its raw result.
    /// No promise or worker is created.
    pub fn call_now<A, T>(&self, args: A) -> T
    where
        F: Fn(A) -> T,
    {
        tracing::trace!(worker = self.config.worker_name(), "bypassing promise");
        (self.func)(args)
    }

    /// Either [`call`](Self::call) or [`call_now`](Self::call_now), chosen by
    /// the `no_promise` flag at the call site.
    pub fn invoke<A, T, R>(&self, args: A, no_promise: bool) -> Called<T, R>
    where
        F: Fn(A) -> T + Send + Sync + 'static,
        A: Send + 'static,
        T: PartialEq + Send + 'static,
        R: Send + 'static,
    {
        if no_promise {
            Called::Value(self.call_now(args))
        } else {
            Called::Promise(self.call(args))
        }
    }

    /// The wrapped function as a plain callable, usable as an `on` callback.
    pub fn direct<A, T>(&self) -> impl Fn(A) -> T + Send + Sync + 'static
    where
        F: Fn(A) -> T + Send + Sync + 'static,
        A: 'static,
        T: 'static,
    {
        let func = Arc::clone(&self.func);
        move |args| func(args)
    }
}

impl<F> Clone for Deferred<F> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            config: self.config.clone(),
        }
    }
}

impl<F> fmt::Debug for Deferred<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
