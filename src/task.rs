// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Task manager for running (bulk) API calls.
//!
//! Every task is named and its duration is logged. Asynchronous tasks are spawned on the tokio
//! runtime, at most `max_concurrency` of them run at the same time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::join_all;
use log::{debug, warn};
use pin_project::pin_project;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DEFAULT_MAX_CONCURRENCY;
use crate::{Error, ErrorKind};

/// Runs named tasks and logs their duration.
#[derive(Debug, Clone)]
pub struct TaskManager {
    name: String,
    max_concurrency: usize,
    semaphore: Arc<Semaphore>,
}

/// A spawned named task.
///
/// Resolves to the result of the task. A task that panicked resolves to `OperationFailed`.
#[pin_project]
#[derive(Debug)]
pub struct Task<T> {
    name: String,
    #[pin]
    handle: JoinHandle<Result<T, Error>>,
}

/// A failed task.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Name of the task.
    pub name: String,
    /// The error.
    pub error: Error,
}

/// Results of waiting for several tasks.
#[derive(Debug, Clone)]
pub struct TaskResults<T> {
    /// Results of the successful tasks in the submission order.
    pub successes: Vec<T>,
    /// Failed tasks in the submission order.
    pub failures: Vec<TaskFailure>,
}

impl Default for TaskManager {
    fn default() -> TaskManager {
        TaskManager::new("oscloud", DEFAULT_MAX_CONCURRENCY)
    }
}

impl TaskManager {
    /// Create a task manager with a concurrency limit (at least one).
    pub fn new<S: Into<String>>(name: S, max_concurrency: usize) -> TaskManager {
        let max_concurrency = max_concurrency.max(1);
        TaskManager {
            name: name.into(),
            max_concurrency,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// Name of the manager.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of asynchronous tasks running at once.
    #[inline]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run a future to completion.
    pub async fn submit_task<F, T>(&self, name: &str, task: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let started = Instant::now();
        let result = task.await;
        log_finished(&self.name, name, started, result.is_ok());
        result
    }

    /// Run a synchronous function.
    pub fn submit_function<F, T>(&self, name: &str, function: F) -> T
    where
        F: FnOnce() -> T,
    {
        let started = Instant::now();
        let result = function();
        debug!(
            "{}: function {} finished in {:?}",
            self.name,
            name,
            started.elapsed()
        );
        result
    }

    /// Spawn a future, waiting for a free worker first.
    pub fn submit_async<S, F, T>(&self, name: S, task: F) -> Task<T>
    where
        S: Into<String>,
        F: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        let semaphore = Arc::clone(&self.semaphore);
        let manager = self.name.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| {
                Error::new(
                    ErrorKind::OperationFailed,
                    format!("Task manager {} is shut down", manager),
                )
            })?;
            let started = Instant::now();
            let result = task.await;
            log_finished(&manager, &task_name, started, result.is_ok());
            result
        });
        Task { name, handle }
    }
}

fn log_finished(manager: &str, name: &str, started: Instant, success: bool) {
    if success {
        debug!("{}: task {} finished in {:?}", manager, name, started.elapsed());
    } else {
        warn!("{}: task {} failed after {:?}", manager, name, started.elapsed());
    }
}

impl<T> Task<T> {
    /// Name of the task.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let name = this.name;
        this.handle.poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(err) => Err(Error::new(
                ErrorKind::OperationFailed,
                format!("Task {} did not complete: {}", name, err),
            )),
        })
    }
}

/// Wait for all tasks to finish.
///
/// With `raise_on_error` the first failure (in the submission order) is returned as an error,
/// but only after all tasks have finished.
pub async fn wait_for_futures<T>(
    tasks: Vec<Task<T>>,
    raise_on_error: bool,
) -> Result<TaskResults<T>, Error> {
    let names: Vec<String> = tasks.iter().map(|task| task.name().to_string()).collect();
    let mut results = TaskResults {
        successes: Vec::with_capacity(tasks.len()),
        failures: Vec::new(),
    };

    for (name, result) in names.into_iter().zip(join_all(tasks).await) {
        match result {
            Ok(value) => results.successes.push(value),
            Err(error) => results.failures.push(TaskFailure { name, error }),
        }
    }

    if raise_on_error {
        if let Some(failure) = results.failures.into_iter().next() {
            return Err(failure.error);
        }
        results.failures = Vec::new();
    }

    Ok(results)
}

#[cfg(test)]
pub mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{wait_for_futures, TaskManager};
    use crate::{Error, ErrorKind};

    #[tokio::test]
    async fn test_submit_task_and_function() {
        let manager = TaskManager::new("test", 2);
        let value = manager.submit_task("answer", async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(manager.submit_function("sum", || 2 + 2), 4);
        assert_eq!(TaskManager::new("test", 0).max_concurrency(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        let manager = TaskManager::new("test", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                manager.submit_async(format!("task {}", i), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    let _ = running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Error>(i)
                })
            })
            .collect();

        let results = wait_for_futures(tasks, true).await.unwrap();
        assert_eq!(results.successes, vec![0, 1, 2, 3, 4, 5]);
        assert!(results.failures.is_empty());
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_collected() {
        let manager = TaskManager::default();
        let tasks = vec![
            manager.submit_async("ok", async { Ok(1) }),
            manager.submit_async("bad", async {
                Err(Error::new(ErrorKind::Conflict, "boom"))
            }),
            manager.submit_async("ok2", async { Ok(2) }),
        ];
        let results = wait_for_futures(tasks, false).await.unwrap();
        assert_eq!(results.successes, vec![1, 2]);
        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].name, "bad");
        assert_eq!(results.failures[0].error.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_raise_on_error() {
        let manager = TaskManager::default();
        let tasks = vec![
            manager.submit_async("bad", async {
                Err::<u8, _>(Error::new(ErrorKind::InvalidInput, "nope"))
            }),
            manager.submit_async("ok", async { Ok(1) }),
        ];
        let err = wait_for_futures(tasks, true).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_panicking_task() {
        let manager = TaskManager::default();
        let task = manager.submit_async("panic", async {
            if true {
                panic!("boom");
            }
            Ok::<u8, Error>(0)
        });
        assert_eq!(task.name(), "panic");
        let err = task.await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }
}
