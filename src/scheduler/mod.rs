//! Job scheduler
//!
//! Bounded-concurrency, bounded-queue task scheduler fronting the
//! CPU-intensive diarization pipeline. Admission is FIFO; at most
//! `max_concurrent` tasks run at any instant and at most `max_queue_size`
//! tasks wait. Submissions beyond queue capacity fail fast with `QueueFull`.
//!
//! Each task carries a cancellation token and a single-shot completion
//! handle. Exactly one of complete / fail / cancel / expire resolves the
//! handle:
//! - cancellation while queued removes the task without executing it,
//! - cancellation while running signals the work's token and reports
//!   `Cancelled` once the work unwinds,
//! - wall time (queued + running) beyond `task_timeout` reports `Timeout`,
//! - a background reaper fails stale queued tasks with `Expired`.
//!
//! The scheduler is a process-wide singleton; configuration is captured on
//! first construction and ignored afterwards.

use crate::error::{Error, Result};
use crate::events::{EventBus, JobEvent};
use chrono::Utc;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

/// Scheduler configuration
///
/// Captured when the global scheduler is first constructed; later changes
/// have no effect on the running instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum simultaneously running tasks
    pub max_concurrent: usize,

    /// Maximum tasks waiting for admission
    pub max_queue_size: usize,

    /// Maximum wall time a task may spend queued plus running
    pub task_timeout: Duration,

    /// Interval between reaper scans of the queue
    pub reap_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_queue_size: 10,
            task_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(60),
        }
    }
}

/// Point-in-time scheduler counters for the health endpoint
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStatus {
    pub active: usize,
    pub pending: usize,
    pub max_concurrent: usize,
    pub max_queue_size: usize,
}

/// How a runner resolved its task, for event emission
enum TaskOutcome {
    Completed,
    Failed(&'static str),
}

type RunFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;

/// Type-erased slot holding the work and its completion handle.
///
/// Consumed exactly once, either by running the work or by failing it
/// without execution.
trait TaskSlot: Send {
    fn run(self: Box<Self>, remaining: Duration, cancel: tokio_util::sync::CancellationToken)
        -> RunFuture;
    fn fail(self: Box<Self>, err: Error);
}

struct TypedSlot<T, F> {
    work: F,
    done: oneshot::Sender<Result<T>>,
}

impl<T, F> TaskSlot for TypedSlot<T, F>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    fn run(
        self: Box<Self>,
        remaining: Duration,
        cancel: tokio_util::sync::CancellationToken,
    ) -> RunFuture {
        Box::pin(async move {
            let mut handle = tokio::spawn(self.work);

            let outcome = tokio::select! {
                res = &mut handle => flatten_join(res),
                _ = cancel.cancelled() => {
                    // Signal already observed by the work's own suspension
                    // points; wait for it to unwind so its cleanup runs.
                    match handle.await {
                        Ok(_) => Err(Error::Cancelled),
                        Err(e) => Err(join_error(e)),
                    }
                }
                _ = tokio::time::sleep(remaining) => {
                    cancel.cancel();
                    match handle.await {
                        Ok(_) => Err(Error::Timeout),
                        Err(e) if e.is_panic() => Err(join_error(e)),
                        Err(_) => Err(Error::Timeout),
                    }
                }
            };

            let event = match &outcome {
                Ok(_) => TaskOutcome::Completed,
                Err(e) => TaskOutcome::Failed(e.kind()),
            };
            let _ = self.done.send(outcome);
            event
        })
    }

    fn fail(self: Box<Self>, err: Error) {
        let _ = self.done.send(Err(err));
    }
}

/// Map a join result back into the task's result, converting panics into
/// task failures so the scheduler itself never dies.
fn flatten_join<T>(res: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    match res {
        Ok(r) => r,
        Err(e) => Err(join_error(e)),
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    if e.is_panic() {
        Error::Internal(format!("task panicked: {}", e))
    } else {
        Error::Cancelled
    }
}

struct QueuedTask {
    id: String,
    cancel: tokio_util::sync::CancellationToken,
    enqueued_at: Instant,
    slot: Box<dyn TaskSlot>,
}

struct SchedulerInner {
    queue: VecDeque<QueuedTask>,
    active: usize,
}

/// Bounded-concurrency bounded-queue job scheduler
pub struct Scheduler {
    config: SchedulerConfig,
    inner: Mutex<SchedulerInner>,
    events: EventBus,
}

impl Scheduler {
    /// Create a scheduler and start its background reaper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: SchedulerConfig) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            config: config.clone(),
            inner: Mutex::new(SchedulerInner {
                queue: VecDeque::new(),
                active: 0,
            }),
            events: EventBus::default(),
        });

        let reaper = Arc::clone(&scheduler);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.reap_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                reaper.reap_stale();
            }
        });

        info!(
            max_concurrent = config.max_concurrent,
            max_queue_size = config.max_queue_size,
            task_timeout_s = config.task_timeout.as_secs(),
            "Scheduler started"
        );

        scheduler
    }

    /// Submit work and wait for its result.
    ///
    /// Fails fast with `QueueFull` at queue capacity and with `Cancelled`
    /// when the token is already cancelled; the work is never executed in
    /// either case.
    pub async fn enqueue<T, F>(
        self: &Arc<Self>,
        id: impl Into<String>,
        cancel: tokio_util::sync::CancellationToken,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let id = id.into();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (tx, mut rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.queue.len() >= self.config.max_queue_size {
                warn!(task_id = %id, pending = inner.queue.len(), "Queue full, rejecting task");
                self.events.emit(JobEvent::Failed {
                    id,
                    error_kind: Error::QueueFull.kind().to_string(),
                    timestamp: Utc::now(),
                });
                return Err(Error::QueueFull);
            }

            let position = inner.queue.len();
            inner.queue.push_back(QueuedTask {
                id: id.clone(),
                cancel: cancel.clone(),
                enqueued_at: Instant::now(),
                slot: Box::new(TypedSlot { work, done: tx }),
            });
            debug!(task_id = %id, position, "Task queued");
            self.events.emit(JobEvent::Queued {
                id: id.clone(),
                position,
                timestamp: Utc::now(),
            });
        }

        self.dispatch();

        // Wait for completion, watching the cancel token so a still-queued
        // task is removed promptly instead of at admission time.
        tokio::select! {
            res = &mut rx => res.unwrap_or(Err(Error::Internal("scheduler dropped task".into()))),
            _ = cancel.cancelled() => {
                self.remove_queued(&id);
                // Either the removal above or the running task's own cancel
                // observation resolves the completion handle.
                rx.await.unwrap_or(Err(Error::Cancelled))
            }
        }
    }

    /// Side-effect-free counters for monitoring.
    pub fn status(&self) -> SchedulerStatus {
        let inner = self.inner.lock().unwrap();
        SchedulerStatus {
            active: inner.active,
            pending: inner.queue.len(),
            max_concurrent: self.config.max_concurrent,
            max_queue_size: self.config.max_queue_size,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Admit queued tasks while capacity allows.
    fn dispatch(self: &Arc<Self>) {
        loop {
            let task = {
                let mut inner = self.inner.lock().unwrap();
                if inner.active >= self.config.max_concurrent {
                    return;
                }
                match inner.queue.pop_front() {
                    Some(task) => {
                        inner.active += 1;
                        task
                    }
                    None => return,
                }
            };

            // Token fired between queueing and admission: fail without
            // executing.
            if task.cancel.is_cancelled() {
                debug!(task_id = %task.id, "Dropping cancelled task at admission");
                task.slot.fail(Error::Cancelled);
                self.events.emit(JobEvent::Removed {
                    id: task.id,
                    timestamp: Utc::now(),
                });
                let mut inner = self.inner.lock().unwrap();
                inner.active -= 1;
                continue;
            }

            let (active, pending) = {
                let inner = self.inner.lock().unwrap();
                (inner.active, inner.queue.len())
            };
            debug!(task_id = %task.id, active, pending, "Task started");
            self.events.emit(JobEvent::Started {
                id: task.id.clone(),
                active,
                pending,
                timestamp: Utc::now(),
            });

            let this = Arc::clone(self);
            tokio::spawn(async move {
                // The timeout budget covers queued plus running time.
                let remaining = this
                    .config
                    .task_timeout
                    .saturating_sub(task.enqueued_at.elapsed());
                let outcome = task.slot.run(remaining, task.cancel).await;

                {
                    let mut inner = this.inner.lock().unwrap();
                    inner.active -= 1;
                }

                match outcome {
                    TaskOutcome::Completed => {
                        debug!(task_id = %task.id, "Task completed");
                        this.events.emit(JobEvent::Completed {
                            id: task.id,
                            timestamp: Utc::now(),
                        });
                    }
                    TaskOutcome::Failed(kind) => {
                        debug!(task_id = %task.id, error_kind = kind, "Task failed");
                        this.events.emit(JobEvent::Failed {
                            id: task.id,
                            error_kind: kind.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }

                this.dispatch();
            });
        }
    }

    /// Remove a still-queued task after its token fired. No-op if the task
    /// already started running.
    fn remove_queued(&self, id: &str) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let pos = inner.queue.iter().position(|t| t.id == id);
            pos.map(|pos| inner.queue.remove(pos).unwrap())
        };
        if let Some(task) = removed {
            debug!(task_id = %task.id, "Removed cancelled task from queue");
            task.slot.fail(Error::Cancelled);
            self.events.emit(JobEvent::Removed {
                id: task.id,
                timestamp: Utc::now(),
            });
        }
    }

    /// Fail queued tasks whose combined wall time exceeded the task timeout.
    ///
    /// Running tasks are not touched; they enforce their own deadline.
    fn reap_stale(&self) {
        let stale = {
            let mut inner = self.inner.lock().unwrap();
            let mut stale = Vec::new();
            let mut idx = 0;
            while idx < inner.queue.len() {
                if inner.queue[idx].enqueued_at.elapsed() > self.config.task_timeout {
                    stale.push(inner.queue.remove(idx).unwrap());
                } else {
                    idx += 1;
                }
            }
            stale
        };

        for task in stale {
            warn!(task_id = %task.id, "Reaping stale queued task");
            task.slot.fail(Error::Expired);
            self.events.emit(JobEvent::Expired {
                id: task.id,
                timestamp: Utc::now(),
            });
        }
    }
}

static SCHEDULER: OnceLock<Arc<Scheduler>> = OnceLock::new();

/// Process-wide scheduler accessor.
///
/// The default configuration is applied on first call; subsequent calls
/// return the same instance regardless of configuration changes.
pub fn scheduler() -> &'static Arc<Scheduler> {
    SCHEDULER.get_or_init(|| Scheduler::start(SchedulerConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: 2,
            max_queue_size: 4,
            task_timeout: Duration::from_secs(5),
            reap_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_enqueue_returns_work_result() {
        let scheduler = Scheduler::start(test_config());
        let result = scheduler
            .enqueue("t1", CancellationToken::new(), async { Ok(41 + 1) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_never_runs_work() {
        let scheduler = Scheduler::start(test_config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = scheduler
            .enqueue("t2", cancel, async {
                panic!("work must not execute");
            })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_work_error_propagates() {
        let scheduler = Scheduler::start(test_config());
        let result: Result<()> = scheduler
            .enqueue("t3", CancellationToken::new(), async {
                Err(Error::EmptyAudio)
            })
            .await;
        assert!(matches!(result, Err(Error::EmptyAudio)));
    }

    #[tokio::test]
    async fn test_panic_becomes_task_failure() {
        let scheduler = Scheduler::start(test_config());
        let result: Result<()> = scheduler
            .enqueue("t4", CancellationToken::new(), async {
                panic!("boom");
            })
            .await;
        match result {
            Err(Error::Internal(msg)) => assert!(msg.contains("panicked")),
            other => panic!("expected Internal, got {:?}", other),
        }

        // Scheduler survives and accepts further work
        let ok = scheduler
            .enqueue("t5", CancellationToken::new(), async { Ok(1u32) })
            .await
            .unwrap();
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let scheduler = Scheduler::start(test_config());
        let status = scheduler.status();
        assert_eq!(status.active, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.max_concurrent, 2);
        assert_eq!(status.max_queue_size, 4);
    }
}
