//! Single-thread executor that owns every call into a provider.
//!
//! Jobs run one at a time in submission order. Sync callers block on a reply
//! channel, async callers await a oneshot; neither blocks the worker beyond
//! its current job. The queue holds at most [`QUEUE_CAPACITY`] pending jobs:
//! sync submitters block while it is full, async submitters yield and retry.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{self, TrySendError},
        OnceLock,
    },
    thread::{self, ThreadId},
};

use tokio::sync::oneshot;
use tracing::{debug, error, Span};

use crate::error::StoreError;

type Job = Box<dyn FnOnce() + Send + 'static>;

const SHARED_WORKER_NAME: &str = "strongbox-store";

/// Pending jobs a worker queues before submitters wait.
pub const QUEUE_CAPACITY: usize = 256;

static SHARED: OnceLock<Worker> = OnceLock::new();

/// Handle to a store worker thread. Clones feed the same queue.
///
/// The thread exits once every handle is dropped; the process-wide worker
/// from [`Worker::shared`] lives as long as the process.
#[derive(Debug, Clone)]
pub struct Worker {
    jobs: mpsc::SyncSender<Job>,
    thread: ThreadId,
}

impl Worker {
    /// Start a dedicated worker thread.
    pub fn spawn(name: &str) -> Result<Self, StoreError> {
        let (jobs, queue) = mpsc::sync_channel::<Job>(QUEUE_CAPACITY);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || drain(queue))
            .map_err(|e| StoreError::WorkerUnavailable {
                reason: format!("failed to start worker thread: {e}"),
            })?;
        debug!(worker = name, "store worker started");
        Ok(Self {
            jobs,
            thread: handle.thread().id(),
        })
    }

    /// Process-wide worker, started on first use.
    pub fn shared() -> Result<Self, StoreError> {
        if let Some(worker) = SHARED.get() {
            return Ok(worker.clone());
        }
        // A racing initializer may win; the losing thread exits when its
        // handle is dropped here.
        let worker = Self::spawn(SHARED_WORKER_NAME)?;
        Ok(SHARED.get_or_init(|| worker).clone())
    }

    /// Whether the calling thread is this worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Run `job` on the worker and block until it finishes.
    ///
    /// Called from the worker itself, the job runs inline instead of
    /// queueing behind the caller.
    pub fn run<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }
        let (reply, result) = mpsc::sync_channel(1);
        let span = Span::current();
        self.submit(Box::new(move || {
            let _ = reply.send(span.in_scope(job));
        }))?;
        result.recv().map_err(|_| job_dropped())
    }

    /// Run `job` on the worker and await its completion.
    ///
    /// Dropping the returned future does not cancel a submitted job; its
    /// result is discarded.
    pub async fn run_async<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }
        let (reply, result) = oneshot::channel();
        let span = Span::current();
        let mut pending: Job = Box::new(move || {
            let _ = reply.send(span.in_scope(job));
        });
        // Never park a runtime thread on a full queue.
        loop {
            match self.jobs.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Full(job)) => {
                    pending = job;
                    tokio::task::yield_now().await;
                }
                Err(TrySendError::Disconnected(_)) => return Err(worker_stopped()),
            }
        }
        result.await.map_err(|_| job_dropped())
    }

    /// Queue `job`, blocking while the queue is full.
    pub(crate) fn submit(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.send(job).map_err(|_| worker_stopped())
    }
}

fn drain(queue: mpsc::Receiver<Job>) {
    while let Ok(job) = queue.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("store job panicked; worker keeps serving");
        }
    }
    debug!("store worker stopped");
}

fn worker_stopped() -> StoreError {
    StoreError::WorkerUnavailable {
        reason: "worker thread has stopped".to_string(),
    }
}

fn job_dropped() -> StoreError {
    StoreError::WorkerUnavailable {
        reason: "job did not complete".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn jobs_run_in_submission_order() {
        let worker = Worker::spawn("test-fifo").expect("spawn");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = Arc::clone(&seen);
            worker
                .submit(Box::new(move || seen.lock().unwrap().push(i)))
                .expect("submit");
        }
        let snapshot = {
            let seen = Arc::clone(&seen);
            worker
                .run(move || seen.lock().unwrap().clone())
                .expect("run")
        };
        assert_eq!(snapshot, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn jobs_never_overlap() {
        let worker = Worker::spawn("test-serial").expect("spawn");
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let worker = worker.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let active = Arc::clone(&active);
                        let peak = Arc::clone(&peak);
                        worker
                            .run(move || {
                                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(2));
                                active.fetch_sub(1, Ordering::SeqCst);
                            })
                            .expect("run");
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().expect("caller thread");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_run_executes_inline() {
        let worker = Worker::spawn("test-nested").expect("spawn");
        let inner = worker.clone();
        let value = worker
            .run(move || inner.run(|| 7).expect("inline run"))
            .expect("outer run");
        assert_eq!(value, 7);
    }

    #[test]
    fn panicking_job_is_contained() {
        let worker = Worker::spawn("test-panic").expect("spawn");
        let err = worker
            .run(|| -> u8 { panic!("boom") })
            .expect_err("panicked job has no result");
        assert!(matches!(err, StoreError::WorkerUnavailable { .. }));
        assert_eq!(worker.run(|| 1).expect("worker still alive"), 1);
    }

    #[test]
    fn shared_worker_is_reused() {
        let first = Worker::shared().expect("shared");
        let second = Worker::shared().expect("shared");
        assert_eq!(first.thread, second.thread);
        assert!(!first.is_current());
    }

    #[test]
    fn full_queue_holds_back_submitters() {
        let worker = Worker::spawn("test-bounded").expect("spawn");
        let (started_tx, started) = mpsc::channel();
        let (release, gate) = mpsc::channel::<()>();
        worker
            .submit(Box::new(move || {
                started_tx.send(()).expect("signal start");
                let _ = gate.recv();
            }))
            .expect("submit gate");
        started.recv().expect("gate job running");

        for _ in 0..QUEUE_CAPACITY {
            worker.submit(Box::new(|| {})).expect("fill queue");
        }

        let overflow = Arc::new(AtomicUsize::new(0));
        let submitter = {
            let worker = worker.clone();
            let overflow = Arc::clone(&overflow);
            thread::spawn(move || {
                worker.submit(Box::new(|| {})).expect("submit overflow");
                overflow.store(1, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(overflow.load(Ordering::SeqCst), 0, "queue accepted past capacity");

        release.send(()).expect("release gate");
        submitter.join().expect("submitter thread");
        assert_eq!(overflow.load(Ordering::SeqCst), 1);
        assert_eq!(worker.run(|| 3).expect("drained"), 3);
    }

    #[tokio::test]
    async fn async_submit_waits_for_room() {
        let worker = Worker::spawn("test-bounded-async").expect("spawn");
        let (started_tx, started) = mpsc::channel();
        let (release, gate) = mpsc::channel::<()>();
        worker
            .submit(Box::new(move || {
                started_tx.send(()).expect("signal start");
                let _ = gate.recv();
            }))
            .expect("submit gate");
        started.recv().expect("gate job running");
        for _ in 0..QUEUE_CAPACITY {
            worker.submit(Box::new(|| {})).expect("fill queue");
        }

        let waiting = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run_async(|| 9).await }
        });
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        release.send(()).expect("release gate");
        assert_eq!(waiting.await.expect("task").expect("run_async"), 9);
    }

    #[tokio::test]
    async fn async_run_returns_value() {
        let worker = Worker::spawn("test-async").expect("spawn");
        let on_worker = worker.clone();
        let ran_on_worker = worker
            .run_async(move || on_worker.is_current())
            .await
            .expect("run_async");
        assert!(ran_on_worker);
    }
}
