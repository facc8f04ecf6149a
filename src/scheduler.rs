//! Cancellable periodic and one-shot tasks on the tokio runtime.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::logging::log_task;

struct Task {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns every task it starts; dropping the scheduler cancels them all.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` now and then every `period`. A run that overlaps the next
    /// tick delays it rather than bunching ticks up.
    pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        log_task("task_start", name, Some(period.as_millis()));
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        self.tasks.push(Task { name, handle });
    }

    pub fn after<F, Fut>(&mut self, name: &'static str, delay: Duration, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        log_task("task_start", name, None);
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            task().await;
        });
        self.tasks.push(Task { name, handle });
    }

    /// Cancels every task registered under `name`. Returns how many were live.
    pub fn cancel(&mut self, name: &str) -> usize {
        let mut cancelled = 0;
        self.tasks.retain(|t| {
            if t.name != name {
                return true;
            }
            if !t.handle.is_finished() {
                cancelled += 1;
            }
            t.handle.abort();
            false
        });
        if cancelled > 0 {
            log_task("task_cancel", name, None);
        }
        cancelled
    }

    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|t| !t.handle.is_finished()).count()
    }

    pub fn shutdown(&mut self) {
        for t in self.tasks.drain(..) {
            t.handle.abort();
            log_task("task_cancel", t.name, None);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.handle.abort();
        }
    }
}
