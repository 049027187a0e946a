//! Promises that run a function on a background thread and hand its result
//! to one of two callbacks, depending on whether it equals an expected value.
//!
//! [`promise`] turns a function into a [`Deferred`] factory. Calling the
//! factory captures the arguments in a [`Promise`]; [`Promise::on`] declares
//! the expected value and the callbacks, [`Promise::go`] starts the worker
//! and [`Promise::wait`] blocks for the callback's result.
//!
//! ```
//! use promise_on::promise;
//!
//! fn add_one(n: i32) -> i32 {
//!     n + 1
//! }
//!
//! let deferred = promise(add_one);
//!
//! // 5 + 1 == 6, so the success callback (add_one again) sees 6.
//! assert_eq!(deferred.call(5).on(6, add_one, |n| -n).wait(), Ok(7));
//!
//! // 1 + 1 != 6, so the failure callback runs instead.
//! assert_eq!(deferred.call(1).on(6, add_one, |n| -n).wait(), Ok(-2));
//!
//! // No promise at all.
//! assert_eq!(deferred.call_now(5), 6);
//! ```

pub mod completion;
pub mod config;
pub mod deferred;
pub mod error;
mod promise;

pub use completion::Completion;
pub use config::WorkerConfig;
pub use deferred::{Called, Deferred};
pub use error::Error;
pub use promise::{Promise, State};

/// Turns `func` into a promise factory with default worker options.
pub fn promise<F>(func: F) -> Deferred<F> {
    Deferred::new(func, WorkerConfig::default())
}

/// Like [`promise`], with explicit worker options.
pub fn promise_with<F>(func: F, config: WorkerConfig) -> Deferred<F> {
    Deferred::new(func, config)
}
