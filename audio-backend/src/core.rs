//! Fields every adapter embeds by composition (the soundcard mutex, the
//! lock-free published-offset cell, the shutdown flag) plus the
//! dedicated task-worker thread that drains Tic/ClearBuffer/
//! SwitchBufferFlag off the queue independently of whichever thread is
//! producing blocks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::RecvTimeoutError;
use soundcard_core::{new_soundcard_cell, PublishedOffset, RingBufferLock, Soundcard, SoundcardCell, SoundcardShared, Task, TaskLauncher, TaskSender};

/// State shared by every adapter variant, independent of how it talks to
/// hardware. An adapter struct holds this plus whatever handshake state
/// its variant needs.
pub(crate) struct AdapterCore {
    pub(crate) cell: SoundcardCell,
    pub(crate) published: ArcSwap<PublishedOffset>,
    shutdown: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl AdapterCore {
    pub(crate) fn new(shared: SoundcardShared) -> Self {
        Self {
            cell: new_soundcard_cell(shared),
            published: ArcSwap::from_pointee(PublishedOffset::default()),
            shutdown: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Sets SHUTDOWN. Per the all-adapters contract this is the only
    /// cancellation mechanism: the next block releases resources and the
    /// task worker (and any clock thread) exits its loop.
    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Three consecutive per-block failures are treated as fatal.
    pub(crate) fn note_failure(&self) -> bool {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1 >= 3
    }

    pub(crate) fn note_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    pub(crate) fn get_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_current() }
    }

    pub(crate) fn get_next_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_next() }
    }

    pub(crate) fn get_prev_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_prev() }
    }
}

/// Lets the task-worker thread check the adapter's shutdown flag without
/// depending on the concrete adapter's other fields.
pub(crate) trait HasAdapterCore {
    fn adapter_core(&self) -> &AdapterCore;
}

/// Posts `Tic(S)`, `ClearBuffer(S)`, `SwitchBufferFlag(S)` in that exact
/// order, as every backend adapter's per-block handoff requires. Uses
/// the non-blocking producer path: a full queue drops the block's tasks
/// with a warning rather than stalling the caller.
pub(crate) fn post_block_tasks<S>(sender: &TaskSender<S>, handle: &Arc<S>) {
    sender.add_task_all([
        Task::Tic(handle.clone()),
        Task::ClearBuffer(handle.clone()),
        Task::SwitchBufferFlag(handle.clone()),
    ]);
}

fn apply_task<S: Soundcard>(task: Task<S>) {
    match task {
        Task::Tic(handle) => {
            handle.tic();
        }
        Task::ClearBuffer(handle) => {
            handle.get_next_buffer().bytes_mut().fill(0);
        }
        Task::SwitchBufferFlag(handle) => {
            handle.lock_shared().ring_buffer.switch_buffer_flag();
        }
    }
}

/// Spawns the task-worker role thread: the only thread that ever applies
/// queued mutations, so two scheduler tics can never race against each
/// other or against a buffer consumer. Exits once the adapter reports
/// SHUTDOWN and the queue runs dry, or once every sender (including the
/// adapter itself) has been dropped.
pub(crate) fn spawn_task_worker<S>(weak: Weak<S>, launcher: &TaskLauncher<S>) -> thread::JoinHandle<()>
where
    S: Soundcard + HasAdapterCore + 'static,
{
    let receiver = launcher.receiver();

    thread::spawn(move || loop {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => apply_task(task),
            Err(RecvTimeoutError::Timeout) => match weak.upgrade() {
                Some(adapter) if adapter.adapter_core().is_shutdown() => return,
                Some(_) => continue,
                None => return,
            },
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
