//! The deferred single-mutation task protocol used by the scheduler.
//!
//! A [`Task`] carries a reference to its target soundcard and describes
//! exactly one mutation. The [`TaskLauncher`] is a bounded MPSC queue
//! consumed by a single worker thread in FIFO order — the idiomatic
//! replacement for a task-launcher-as-object pattern driven by a
//! reference-counted handle per task.

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

/// One deferred mutation. `S` is the soundcard handle type (typically
/// `Arc<dyn Soundcard>` or a concrete adapter's `Arc<...>`).
pub enum Task<S> {
    Tic(Arc<S>),
    ClearBuffer(Arc<S>),
    SwitchBufferFlag(Arc<S>),
}

impl<S> Clone for Task<S> {
    fn clone(&self) -> Self {
        match self {
            Task::Tic(s) => Task::Tic(s.clone()),
            Task::ClearBuffer(s) => Task::ClearBuffer(s.clone()),
            Task::SwitchBufferFlag(s) => Task::SwitchBufferFlag(s.clone()),
        }
    }
}

/// A bounded multi-producer, single-consumer queue of [`Task`]s.
///
/// Tasks may not block on audio I/O; the queue depth is intentionally
/// finite so a stalled consumer applies backpressure rather than growing
/// without bound.
pub struct TaskLauncher<S> {
    tx: Sender<Task<S>>,
    rx: Receiver<Task<S>>,
}

impl<S> TaskLauncher<S> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> TaskSender<S> {
        TaskSender { tx: self.tx.clone() }
    }

    /// An independent consumer handle sharing this launcher's queue.
    /// Lets a dedicated task-worker thread drain the queue without
    /// borrowing the `TaskLauncher` itself.
    pub fn receiver(&self) -> Receiver<Task<S>> {
        self.rx.clone()
    }

    /// Appends a batch atomically with respect to the caller's view: all
    /// tasks are enqueued before this call returns, in order.
    pub fn add_task_all(&self, tasks: impl IntoIterator<Item = Task<S>>) {
        for task in tasks {
            if self.tx.send(task).is_err() {
                tracing::warn!("task launcher channel closed, dropping task");
                break;
            }
        }
    }

    /// Drains and executes every pending task with `handler`, blocking up
    /// to `timeout` for the first task. Intended to run on the dedicated
    /// task worker thread.
    pub fn run_once(&self, handler: impl Fn(Task<S>), timeout: std::time::Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                handler(task);
                while let Ok(task) = self.rx.try_recv() {
                    handler(task);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// A cloneable producer handle for a [`TaskLauncher`].
#[derive(Clone)]
pub struct TaskSender<S> {
    tx: Sender<Task<S>>,
}

impl<S> TaskSender<S> {
    pub fn add_task_all(&self, tasks: impl IntoIterator<Item = Task<S>>) {
        for task in tasks {
            match self.tx.try_send(task) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("task launcher queue full, dropping task");
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::warn!("task launcher channel closed, dropping task");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Dummy;

    #[test]
    fn tasks_execute_in_fifo_order() {
        let launcher: TaskLauncher<Dummy> = TaskLauncher::new(16);
        let target = Arc::new(Dummy);

        launcher.add_task_all([
            Task::Tic(target.clone()),
            Task::ClearBuffer(target.clone()),
            Task::SwitchBufferFlag(target.clone()),
        ]);

        let order = std::sync::Mutex::new(Vec::new());
        for _ in 0..3 {
            launcher.run_once(
                |task| {
                    let label = match task {
                        Task::Tic(_) => "tic",
                        Task::ClearBuffer(_) => "clear",
                        Task::SwitchBufferFlag(_) => "switch",
                    };
                    order.lock().unwrap().push(label);
                },
                std::time::Duration::from_millis(10),
            );
        }

        assert_eq!(*order.lock().unwrap(), vec!["tic", "clear", "switch"]);
    }

    #[test]
    fn sender_handles_disconnect_gracefully() {
        let launcher: TaskLauncher<Dummy> = TaskLauncher::new(1);
        let sender = launcher.sender();
        drop(launcher);

        let target = Arc::new(Dummy);
        sender.add_task_all([Task::Tic(target)]);
    }

    #[test]
    fn multiple_producers_all_land() {
        let launcher: TaskLauncher<Dummy> = TaskLauncher::new(64);
        let target = Arc::new(Dummy);
        let counter = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let sender = launcher.sender();
                let target = target.clone();
                scope.spawn(move || {
                    sender.add_task_all([Task::Tic(target.clone()), Task::ClearBuffer(target)]);
                });
            }
        });

        while launcher.run_once(|_| { counter.fetch_add(1, Ordering::SeqCst); }, std::time::Duration::from_millis(5)) {}

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
