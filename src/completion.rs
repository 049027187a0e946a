//! A [`Completion`] lets a started promise be awaited from any executor.
//! Any number of completions may wait on the same promise.
//!
use crate::{promise::Shared, Error};
use std::fmt;
use std::sync::Arc;
use std::{future::Future, task::Poll};

/// Resolves to the outcome of the promise it was created from.
///
/// # Examples
///
/// ```
/// use promise_on::promise;
/// use futures::executor::block_on;
///
/// let square = promise(|n: u64| n * n);
/// let mut pending = square.call(4);
/// pending.on(16, |n| n + 1, |n| n);
/// let completion = pending.completion()?;
/// let other = completion.clone();
///
/// assert_eq!(block_on(completion), Ok(17));
/// assert_eq!(block_on(other), Ok(17));
/// assert_eq!(pending.wait(), Ok(17));
/// # Ok::<(), promise_on::Error>(())
/// ```
pub struct Completion<T, R> {
    shared: Arc<Shared<T, R>>,
}

impl<T, R> Completion<T, R> {
    pub(crate) fn new(shared: Arc<Shared<T, R>>) -> Self {
        Self { shared }
    }
}

impl<T, R> Clone for Completion<T, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, R> fmt::Debug for Completion<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("ready", &self.shared.lock().outcome.is_some())
            .finish()
    }
}

impl<T, R: Clone> Future for Completion<T, R> {
    type Output = Result<R, Error>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let mut inner = self.shared.lock();
        match inner.outcome {
            Some(ref outcome) => Poll::Ready(outcome.clone()),
            None => {
                // Every pending completion keeps its own waker.
                if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{promise, Error, Promise};
    use futures::executor::block_on;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn completion_resolves_after_release() {
        let gated = promise(|gate: mpsc::Receiver<u8>| gate.recv().unwrap_or(0));
        let (release, gate) = mpsc::channel();
        let mut pending = gated.call(gate);
        pending.on(9, |n| n * 2, |n| n);
        let completion = pending.completion().unwrap();
        let second = completion.clone();

        let task1 = thread::spawn(move || block_on(completion));
        let task2 = thread::spawn(move || block_on(second));
        release.send(9).unwrap();
        assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok(18));
        assert_eq!(task2.join().expect("The task2 thread has panicked"), Ok(18));
    }

    #[test]
    fn completion_requires_on() {
        let idle = promise(|n: i32| n);
        let pending: Promise<i32, i32> = idle.call(1);
        assert_eq!(pending.completion().err(), Some(Error::NotConfigured));
    }

    #[test]
    fn completion_reports_callee_panic() {
        let broken = promise(|_: ()| -> i32 { panic!("no value") });
        let mut pending = broken.call(());
        pending.on(0, |n| n, |n| n);
        let completion = pending.completion().unwrap();
        assert_eq!(block_on(completion), Err(Error::Callee("no value".into())));
    }
}
