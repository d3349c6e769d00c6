//! Cooperative task scheduling: a FIFO event queue (`Queue`/`Task`/
//! `TaskId`), a `Strand` for serializing several logical operations onto
//! one ordered sub-FIFO, and `series`/`each` async combinators built on
//! top of plain `await`.
//!
//! A [`Task`] is a parameterless, run-once closure with a stable
//! [`TaskId`]. [`Queue`] holds them in FIFO order; [`Queue::run_n`] pops
//! and runs up to `n`, [`Queue::run`] drains it entirely. Suspension is
//! cooperative: a task runs to completion once scheduled, there is no
//! pre-emption. [`Queue::cancel_task`] removes a not-yet-run task; a
//! task already in progress can't be interrupted.
//!
//! [`Strand`] is itself a task that wraps its own internal queue: when
//! the outer queue runs it, it pops and runs one task off its internal
//! FIFO, then — if more remain and `auto_requeue` is set — re-enqueues
//! itself on the outer queue for another turn. This guarantees the
//! strand's own tasks run one at a time and in order, regardless of how
//! many other tasks or threads are also driving the outer queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Stable identifier for a task pushed onto a [`Queue`], usable with
/// [`Queue::cancel_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// A parameterless, run-once unit of work.
pub struct Task {
    f: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Wraps `f` as a task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    fn run(self) {
        (self.f)()
    }
}

struct Entry {
    id: TaskId,
    task: Task,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

struct QueueState {
    entries: VecDeque<Entry>,
}

/// A FIFO event queue of [`Task`]s, shareable across threads.
///
/// `Queue` is cheap to clone: clones share the same underlying FIFO, so
/// a task can hold its own queue handle (e.g. to re-enqueue itself, as
/// [`Strand`] does) without borrowing issues.
#[derive(Clone)]
pub struct Queue {
    state: Arc<Mutex<QueueState>>,
    next_id: Arc<AtomicU64>,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                entries: VecDeque::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn alloc_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Enqueues `f`, returning a [`TaskId`] that can be passed to
    /// [`Queue::cancel_task`] while the task is still pending.
    pub fn push<F>(&self, f: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_entry(Task::new(f), None)
    }

    fn push_entry(&self, task: Task, on_cancel: Option<Box<dyn FnOnce() + Send>>) -> TaskId {
        let id = self.alloc_id();
        #[expect(clippy::unwrap_used, reason = "poisoned queue mutex is unrecoverable")]
        self.state
            .lock()
            .unwrap()
            .entries
            .push_back(Entry { id, task, on_cancel });
        id
    }

    /// Enqueues `f` and returns a [`TaskHandle`] that can be joined for
    /// its return value, or that resolves to [`Error::Cancelled`] if the
    /// task is removed via [`Queue::cancel_task`] before it runs.
    pub fn push_cancellable<T, F>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::new(Shared {
            result: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        });
        let slot = shared.clone();
        let task = Task::new(move || {
            let value = f();
            #[expect(clippy::unwrap_used, reason = "poisoned result mutex is unrecoverable")]
            *slot.result.lock().unwrap() = Some(value);
        });
        let cancel_slot = shared.clone();
        let on_cancel: Box<dyn FnOnce() + Send> =
            Box::new(move || cancel_slot.cancelled.store(true, Ordering::Release));
        let id = self.push_entry(task, Some(on_cancel));
        TaskHandle { id, shared }
    }

    /// Removes a not-yet-run task from the queue. Returns `true` if a
    /// matching pending task was found and removed. A task already
    /// running (or already run) is unaffected — there is nothing to
    /// interrupt once a task has been popped off the queue.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        #[expect(clippy::unwrap_used, reason = "poisoned queue mutex is unrecoverable")]
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let entry = state.entries.remove(pos).expect("position just checked");
        drop(state);
        if let Some(on_cancel) = entry.on_cancel {
            on_cancel();
        }
        true
    }

    /// Pops and runs up to `n` pending tasks, returning the number
    /// actually run (fewer than `n` if the queue ran dry).
    pub fn run_n(&self, n: usize) -> usize {
        let mut ran = 0;
        while ran < n {
            #[expect(clippy::unwrap_used, reason = "poisoned queue mutex is unrecoverable")]
            let next = self.state.lock().unwrap().entries.pop_front();
            match next {
                Some(entry) => {
                    entry.task.run();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    /// Drains the queue until empty. A task that enqueues more work
    /// (such as a [`Strand`] re-enqueuing itself) is picked up by this
    /// same call, since emptiness is re-checked after every batch.
    pub fn run(&self) {
        loop {
            if self.run_n(usize::MAX) == 0 {
                break;
            }
        }
    }

    /// Number of pending (not yet run) tasks.
    pub fn len(&self) -> usize {
        #[expect(clippy::unwrap_used, reason = "poisoned queue mutex is unrecoverable")]
        self.state.lock().unwrap().entries.len()
    }

    /// Whether the queue has no pending tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Shared<T> {
    result: Mutex<Option<T>>,
    cancelled: AtomicBool,
}

/// A handle to a task pushed via [`Queue::push_cancellable`].
pub struct TaskHandle<T> {
    id: TaskId,
    shared: Arc<Shared<T>>,
}

impl<T> TaskHandle<T> {
    /// The id of the underlying task, usable with [`Queue::cancel_task`].
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks the calling thread, spinning with a short backoff, until
    /// the task has run or been cancelled.
    ///
    /// Returns the task's output, or [`Error::Cancelled`] if it was
    /// removed from the queue before running. Intended for use from a
    /// thread that is itself driving the queue (e.g. interleaving
    /// `run_n` calls with other work) rather than a pure spin-wait.
    pub fn join(self) -> Result<T> {
        loop {
            #[expect(clippy::unwrap_used, reason = "poisoned result mutex is unrecoverable")]
            if let Some(value) = self.shared.result.lock().unwrap().take() {
                return Ok(value);
            }
            if self.shared.cancelled.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            std::thread::yield_now();
        }
    }
}

struct StrandState {
    pending: Mutex<VecDeque<Task>>,
    auto_requeue: bool,
    scheduled: AtomicBool,
}

/// A task that wraps its own internal FIFO.
///
/// Pushing work onto a strand never runs it inline: the work is queued
/// internally, and the strand schedules itself onto an outer [`Queue`]
/// (once, no matter how many items are pushed before its turn comes).
/// When the outer queue runs the strand, it executes exactly one
/// internal task; if more remain and `auto_requeue` is set, it
/// re-enqueues itself for another turn. This gives FIFO ordering among
/// a strand's own tasks regardless of what else is interleaved on the
/// outer queue.
///
/// With `auto_requeue: false`, the strand runs one task per turn and
/// then waits for an explicit [`Strand::resume`] call — useful when the
/// caller wants to control the pace of fan-out rather than have the
/// strand drain itself as fast as the outer queue allows.
#[derive(Clone)]
pub struct Strand {
    inner: Arc<StrandState>,
}

impl Default for Strand {
    fn default() -> Self {
        Self::new()
    }
}

impl Strand {
    /// Creates a strand that re-enqueues itself automatically whenever
    /// work remains after a turn.
    pub fn new() -> Self {
        Self::with_auto_requeue(true)
    }

    /// Creates a strand with explicit control over auto-requeue.
    pub fn with_auto_requeue(auto_requeue: bool) -> Self {
        Self {
            inner: Arc::new(StrandState {
                pending: Mutex::new(VecDeque::new()),
                auto_requeue,
                scheduled: AtomicBool::new(false),
            }),
        }
    }

    /// Queues `f` behind this strand's other pending tasks, scheduling
    /// the strand onto `queue` if it isn't already scheduled.
    pub fn push<F>(&self, queue: &Queue, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        #[expect(clippy::unwrap_used, reason = "poisoned strand mutex is unrecoverable")]
        self.inner.pending.lock().unwrap().push_back(Task::new(f));
        self.schedule(queue);
    }

    fn schedule(&self, queue: &Queue) {
        if self.inner.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let strand = self.clone();
        let outer = queue.clone();
        queue.push(move || strand.step(&outer));
    }

    /// Runs one pending task and, if more remain and `auto_requeue` is
    /// set, re-enqueues this strand on `queue` for another turn.
    fn step(&self, queue: &Queue) {
        #[expect(clippy::unwrap_used, reason = "poisoned strand mutex is unrecoverable")]
        let next = self.inner.pending.lock().unwrap().pop_front();
        if let Some(task) = next {
            task.run();
        }
        self.inner.scheduled.store(false, Ordering::Release);
        if self.inner.auto_requeue && !self.is_empty() {
            self.schedule(queue);
        }
    }

    /// Re-schedules this strand after a manual-requeue turn. No-op if
    /// there is no pending work.
    pub fn resume(&self, queue: &Queue) {
        if !self.is_empty() {
            self.schedule(queue);
        }
    }

    /// Whether the strand has no queued work left.
    pub fn is_empty(&self) -> bool {
        #[expect(clippy::unwrap_used, reason = "poisoned strand mutex is unrecoverable")]
        self.inner.pending.lock().unwrap().is_empty()
    }
}

/// Runs `items` through `op` one at a time, in order, stopping at the
/// first error.
///
/// Unlike a callback-based `series` that holds a reference into a
/// shared container while each step runs (which invites a step
/// mutating the container out from under the iteration), this takes
/// ownership of `items` up front: each element is consumed by `op`
/// and no aliasing between "still to run" and "currently running"
/// state is possible.
pub async fn series<T, F, Fut>(items: Vec<T>, mut op: F) -> Result<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for item in items {
        op(item).await?;
    }
    Ok(())
}

/// Runs `items` through `op` one at a time, in order, collecting the
/// output of each step. Stops and returns the first error encountered.
pub async fn each<T, R, F, Fut>(items: Vec<T>, mut op: F) -> Result<Vec<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(op(item).await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn series_runs_in_order() {
        let log = ::tokio::sync::Mutex::new(Vec::new());
        let items = vec![1, 2, 3];
        series(items, |n| async {
            log.lock().await.push(n);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(*log.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn series_stops_on_error() {
        let items = vec![1, 2, 3];
        let result = series(items, |n| async move {
            if n == 2 {
                Err(crate::error::Error::domain("stop at 2"))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn each_collects_results() {
        let items = vec![1, 2, 3];
        let doubled = each(items, |n| async move { Ok(n * 2) }).await.unwrap();
        assert_eq!(doubled, vec![2, 4, 6]);
    }

    #[test]
    fn queue_runs_in_fifo_order() {
        let queue = Queue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let log = log.clone();
            queue.push(move || log.lock().unwrap().push(n));
        }
        queue.run();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn run_n_stops_after_n_tasks() {
        let queue = Queue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let log = log.clone();
            queue.push(move || log.lock().unwrap().push(n));
        }
        assert_eq!(queue.run_n(2), 2);
        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        assert_eq!(queue.run_n(10), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cancel_task_removes_pending_work() {
        let queue = Queue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.push({
            let log = log.clone();
            move || log.lock().unwrap().push(1)
        });
        let id = queue.push({
            let log = log.clone();
            move || log.lock().unwrap().push(2)
        });
        assert!(queue.cancel_task(id));
        assert!(!queue.cancel_task(id));
        queue.run();
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn cancelled_task_handle_reports_cancelled_error() {
        let queue = Queue::new();
        let handle = queue.push_cancellable(|| 42);
        assert!(queue.cancel_task(handle.id()));
        match handle.join() {
            Err(Error::Cancelled) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn uncancelled_task_handle_joins_to_value() {
        let queue = Queue::new();
        let handle = queue.push_cancellable(|| 7);
        queue.run();
        assert_eq!(handle.join().unwrap(), 7);
    }

    #[test]
    fn strand_runs_its_own_tasks_in_order() {
        let queue = Queue::new();
        let strand = Strand::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let log = log.clone();
            strand.push(&queue, move || log.lock().unwrap().push(n));
        }
        queue.run();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn strand_serializes_across_interleaved_outer_tasks() {
        let queue = Queue::new();
        let strand = Strand::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.push({
            let log = log.clone();
            move || log.lock().unwrap().push(-1)
        });
        for n in 0..3 {
            let log = log.clone();
            strand.push(&queue, move || log.lock().unwrap().push(n));
        }
        queue.run();

        let result = log.lock().unwrap();
        let strand_positions: Vec<usize> = result
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= 0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(result.iter().filter(|v| **v >= 0).collect::<Vec<_>>(), vec![&0, &1, &2]);
        assert!(strand_positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn manual_requeue_strand_waits_for_resume() {
        let queue = Queue::new();
        let strand = Strand::with_auto_requeue(false);
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            strand.push(&queue, move || log.lock().unwrap().push(n));
        }
        queue.run_n(10);
        assert_eq!(*log.lock().unwrap(), vec![0]);
        strand.resume(&queue);
        queue.run_n(10);
        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        strand.resume(&queue);
        queue.run_n(10);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }
}
