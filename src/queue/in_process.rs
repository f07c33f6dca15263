//! In-process worker pool: a FIFO queue drained under a concurrency limit

use super::{JobBackend, Submission};
use crate::error::{Error, Result};
use crate::pipeline::JobRunner;
use crate::task::{Dispatch, TaskHandle, TaskState};
use crate::types::{Event, IngestJob, TaskId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// Interval between queue polling attempts when nothing can be dispatched
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A task waiting in the pool
#[derive(Clone, Debug)]
pub struct QueuedTask {
    /// Pool-assigned id
    pub id: TaskId,
    /// Shared state handle
    pub handle: TaskHandle,
    /// The job to run
    pub job: IngestJob,
}

struct PoolInner {
    runner: Arc<dyn JobRunner>,
    limit: Arc<Semaphore>,
    max_concurrent: usize,
    queue: Mutex<VecDeque<QueuedTask>>,
    tasks: Mutex<HashMap<TaskId, TaskHandle>>,
    next_id: AtomicU64,
    paused: AtomicBool,
    accepting: AtomicBool,
    event_tx: broadcast::Sender<Event>,
    shutdown: CancellationToken,
}

/// Bounded in-process worker pool.
///
/// At most `max_concurrent` tasks are `Executing` at any time; the rest wait
/// in submission order. Tasks are independent: a failing or panicking task
/// only finishes itself.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    dispatcher: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl WorkerPool {
    /// Create a pool and start its dispatcher. Must be called inside a runtime.
    pub fn new(runner: Arc<dyn JobRunner>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(PoolInner {
            runner,
            limit: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue: Mutex::new(VecDeque::new()),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            paused: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            event_tx,
            shutdown: CancellationToken::new(),
        });

        let dispatcher = tokio::spawn(Self::dispatch_loop(inner.clone()));

        Self {
            inner,
            dispatcher: Arc::new(Mutex::new(Some(dispatcher))),
        }
    }

    /// Queue a job and return its task
    pub async fn enqueue(&self, job: IngestJob) -> Result<QueuedTask> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let task = QueuedTask {
            id: TaskId(self.inner.next_id.fetch_add(1, Ordering::SeqCst)),
            handle: TaskHandle::new(),
            job,
        };

        self.inner
            .tasks
            .lock()
            .await
            .insert(task.id, task.handle.clone());
        self.inner.queue.lock().await.push_back(task.clone());

        tracing::debug!(task_id = %task.id, url = %task.job.url, "task queued");
        self.inner
            .event_tx
            .send(Event::TaskQueued {
                id: task.id,
                url: task.job.url.clone(),
            })
            .ok();

        Ok(task)
    }

    /// Cancel a task that has not been dispatched yet
    pub async fn cancel(&self, id: TaskId) -> bool {
        match self.inner.tasks.lock().await.get(&id) {
            Some(handle) => handle.cancel(),
            None => false,
        }
    }

    /// State of a task the pool still tracks
    pub async fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.inner.tasks.lock().await.get(&id).map(TaskHandle::state)
    }

    /// Number of tasks currently executing
    pub async fn executing_count(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .await
            .values()
            .filter(|h| h.state() == TaskState::Executing)
            .count()
    }

    /// Number of tasks waiting for dispatch
    pub async fn queued_count(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Hold back new dispatches; running tasks continue
    pub fn pause_dispatch(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Allow dispatching again
    pub fn resume_dispatch(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Subscribe to task lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.event_tx.subscribe()
    }

    /// Configured concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    async fn dispatch_loop(inner: Arc<PoolInner>) {
        loop {
            if inner.shutdown.is_cancelled() {
                break;
            }

            let next = inner.queue.lock().await.pop_front();
            let Some(task) = next else {
                tokio::select! {
                    _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => {}
                    _ = inner.shutdown.cancelled() => break,
                }
                continue;
            };

            // Cancelled tasks finish without waiting for a slot. A suspended
            // one stays queued until resumed so the cancel can take effect.
            if task.handle.is_cancelled() {
                match task.handle.try_start(|| false) {
                    Dispatch::NotReady => {
                        if !Self::requeue(&inner, task).await {
                            break;
                        }
                    }
                    other => Self::settle_without_running(&inner, &task, other).await,
                }
                continue;
            }

            let permit = tokio::select! {
                permit = inner.limit.clone().acquire_owned() => permit,
                _ = inner.shutdown.cancelled() => {
                    inner.queue.lock().await.push_front(task);
                    break;
                }
            };
            let Ok(permit) = permit else {
                inner.queue.lock().await.push_front(task);
                break;
            };

            let paused = &inner.paused;
            match task.handle.try_start(|| !paused.load(Ordering::SeqCst)) {
                Dispatch::Started => {
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::run_task(&inner, task).await;
                    });
                }
                Dispatch::NotReady => {
                    drop(permit);
                    if !Self::requeue(&inner, task).await {
                        break;
                    }
                }
                other => {
                    drop(permit);
                    Self::settle_without_running(&inner, &task, other).await;
                }
            }
        }

        tracing::debug!("worker pool dispatcher stopped");
    }

    /// Put a task that cannot start yet at the back of the queue and wait one
    /// poll interval. Returns false when the pool is shutting down.
    async fn requeue(inner: &PoolInner, task: QueuedTask) -> bool {
        inner.queue.lock().await.push_back(task);
        tokio::select! {
            _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => true,
            _ = inner.shutdown.cancelled() => false,
        }
    }

    async fn settle_without_running(inner: &PoolInner, task: &QueuedTask, dispatch: Dispatch) {
        if dispatch == Dispatch::Cancelled {
            tracing::info!(task_id = %task.id, url = %task.job.url, "task cancelled before dispatch");
            inner.event_tx.send(Event::TaskCancelled { id: task.id }).ok();
        }
        inner.tasks.lock().await.remove(&task.id);
    }

    async fn run_task(inner: &PoolInner, task: QueuedTask) {
        inner.event_tx.send(Event::TaskStarted { id: task.id }).ok();

        // The body runs in its own task so a panic is contained to it.
        let runner = inner.runner.clone();
        let job = task.job.clone();
        let outcome = tokio::spawn(async move { runner.run(&job).await }).await;

        task.handle.finish();

        let event = match outcome {
            Ok(Ok(record)) => Event::TaskCompleted {
                id: task.id,
                episode_id: record.id,
            },
            Ok(Err(e)) => Event::TaskFailed {
                id: task.id,
                kind: e.kind().to_string(),
                error: e.to_string(),
            },
            Err(join_error) => {
                tracing::error!(task_id = %task.id, url = %task.job.url, error = %join_error, "task panicked");
                Event::TaskFailed {
                    id: task.id,
                    kind: "panicked".to_string(),
                    error: join_error.to_string(),
                }
            }
        };

        inner.tasks.lock().await.remove(&task.id);
        inner.event_tx.send(event).ok();
    }
}

#[async_trait]
impl JobBackend for WorkerPool {
    async fn submit(&self, job: IngestJob) -> Result<Submission> {
        let task = self.enqueue(job).await?;
        Ok(Submission::Enqueued { task_id: task.id })
    }

    async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.shutdown.cancel();

        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            let _ = dispatcher.await;
        }

        let abandoned = self.inner.queue.lock().await.len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "shutting down with undispatched tasks");
        }

        let all_permits = u32::try_from(self.inner.max_concurrent).unwrap_or(u32::MAX);
        match tokio::time::timeout(timeout, self.inner.limit.acquire_many(all_permits)).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("timed out waiting for running tasks");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "in_process"
    }
}
