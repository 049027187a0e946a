use std::{io, thread};

const DEFAULT_NAME: &str = "promise";

/// Options applied to every worker thread a [`Deferred`](crate::Deferred)
/// starts.
///
/// ```
/// use promise_on::{promise_with, WorkerConfig};
///
/// let config = WorkerConfig::default().name("doubler").stack_size(256 * 1024);
/// let double = promise_with(|n: u32| n * 2, config);
/// let result = double.call(21).on(42, |n| n, |_| 0).wait();
/// assert_eq!(result, Ok(42));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerConfig {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl WorkerConfig {
    /// Sets the OS thread name of the worker.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the stack size of the worker, in bytes.
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Name used for the worker thread and on log events.
    pub fn worker_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    pub(crate) fn spawn<F>(&self, body: F) -> io::Result<thread::JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new().name(self.worker_name().to_owned());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(body)
    }
}
