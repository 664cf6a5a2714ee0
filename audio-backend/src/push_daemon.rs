//! Variant A: a condition-variable handshake with a daemon-owned audio
//! callback, representing JACK-like servers that invoke a registered
//! process callback on their own real-time thread and expect it back
//! within the block period.
//!
//! `record`/`play` is the process callback's entry point. A background
//! handshake-service thread stands in for the daemon's own callback
//! loop, since there is no real JACK server in-process to drive it.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use soundcard_core::{
    Capability, DeviceId, PcmInfo, PublishedOffset, Result, RingBufferLock, SampleFormat, SoundcardCell,
    SoundcardError, SoundcardShared, SoundcardState, TaskLauncher,
};

use crate::core::{post_block_tasks, spawn_task_worker, AdapterCore, HasAdapterCore};

#[derive(Default)]
struct HandshakeState {
    callback_wait: bool,
    callback_done: bool,
    callback_finish_wait: bool,
    callback_finish_done: bool,
    pass_through: bool,
}

struct Handshake {
    state: Mutex<HandshakeState>,
    callback_cond: Condvar,
    callback_finish_cond: Condvar,
}

impl Handshake {
    fn new() -> Self {
        Self {
            state: Mutex::new(HandshakeState::default()),
            callback_cond: Condvar::new(),
            callback_finish_cond: Condvar::new(),
        }
    }
}

pub struct PushDaemonAdapter {
    core: AdapterCore,
    handshake: Arc<Handshake>,
    launcher: TaskLauncher<PushDaemonAdapter>,
    self_handle: Weak<PushDaemonAdapter>,
    service_thread: Mutex<Option<thread::JoinHandle<()>>>,
    task_worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl HasAdapterCore for PushDaemonAdapter {
    fn adapter_core(&self) -> &AdapterCore {
        &self.core
    }
}

impl PushDaemonAdapter {
    pub fn new(channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat) -> Arc<Self> {
        let handshake = Arc::new(Handshake::new());

        let adapter = Arc::new_cyclic(|weak| Self {
            core: AdapterCore::new(SoundcardShared::new(4, channels, samplerate, buffer_size, format, 1)),
            handshake: handshake.clone(),
            launcher: TaskLauncher::new(64),
            self_handle: weak.clone(),
            service_thread: Mutex::new(None),
            task_worker: Mutex::new(None),
        });

        let weak_core = Arc::downgrade(&adapter);
        let service_handshake = handshake;
        let handle = thread::spawn(move || handshake_service_loop(weak_core, service_handshake));
        *adapter.service_thread.lock() = Some(handle);

        let worker = spawn_task_worker(Arc::downgrade(&adapter), &adapter.launcher);
        *adapter.task_worker.lock() = Some(worker);

        adapter
    }

    /// Process-callback entry point: steps 1-4 of the handshake protocol.
    fn run_block(&self) -> Result<()> {
        if self.core.is_shutdown() {
            let mut state = self.handshake.state.lock();
            state.pass_through = true;
            self.handshake.callback_cond.notify_all();
            self.handshake.callback_finish_cond.notify_all();
            return Ok(());
        }

        {
            let mut state = self.handshake.state.lock();
            state.callback_done = true;
            state.callback_finish_done = false;
            if state.callback_wait {
                self.handshake.callback_cond.notify_all();
            }
        }

        {
            let mut state = self.handshake.state.lock();
            if !state.callback_finish_done {
                state.callback_finish_wait = true;
                let deadline = Duration::from_millis(200);
                self.handshake.callback_finish_cond.wait_for(&mut state, deadline);
            }
            state.callback_finish_wait = false;
        }

        if let Some(handle) = self.self_handle.upgrade() {
            post_block_tasks(&self.launcher.sender(), &handle);
        }

        Ok(())
    }
}

/// Stands in for the daemon's own RT callback loop: wakes when the
/// process callback signals CALLBACK_DONE, then immediately marks
/// CALLBACK_FINISH_DONE (there is no real external device-side work to
/// wait on in-process).
fn handshake_service_loop(core: Weak<PushDaemonAdapter>, handshake: Arc<Handshake>) {
    loop {
        let Some(adapter) = core.upgrade() else { return };
        if adapter.core.is_shutdown() {
            return;
        }
        drop(adapter);

        let mut state = handshake.state.lock();
        if !state.callback_done {
            state.callback_wait = true;
            let timed_out = handshake.callback_cond.wait_for(&mut state, Duration::from_millis(100)).timed_out();
            if timed_out {
                continue;
            }
        }
        state.callback_wait = false;
        state.callback_done = false;
        state.callback_finish_done = true;
        drop(state);
        handshake.callback_finish_cond.notify_all();
    }
}

impl soundcard_core::Soundcard for PushDaemonAdapter {
    fn shared(&self) -> &SoundcardCell {
        &self.core.cell
    }

    fn published_offset(&self) -> &arc_swap::ArcSwap<PublishedOffset> {
        &self.core.published
    }

    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)> {
        Ok((vec![DeviceId::new("jack", 0).to_string()], vec!["default jack server".to_string()]))
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        DeviceId::parse(card_id)?;
        Ok(PcmInfo {
            channels_min: 1,
            channels_max: 2,
            rate_min: 8000,
            rate_max: 192_000,
            buffer_size_min: 16,
            buffer_size_max: 8192,
        })
    }

    fn record_init(&self) -> Result<()> {
        let mut guard = self.lock_shared();
        guard.starting = true;
        guard.capability |= Capability::CAPTURE;
        guard.state = SoundcardState::Initialized;
        Ok(())
    }

    fn play_init(&self) -> Result<()> {
        let mut guard = self.lock_shared();
        guard.starting = true;
        guard.capability |= Capability::PLAYBACK;
        guard.state = SoundcardState::Initialized;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.core.request_shutdown();
        self.handshake.callback_cond.notify_all();
        self.handshake.callback_finish_cond.notify_all();

        if let Some(handle) = self.service_thread.lock().take() {
            handle.join().ok();
        }
        if let Some(handle) = self.task_worker.lock().take() {
            handle.join().ok();
        }

        let mut guard = self.lock_shared();
        guard.recording = false;
        guard.playing = false;
        guard.starting = false;
        guard.state = SoundcardState::Stopped;
        Ok(())
    }

    fn record(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("push-daemon adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            if guard.state != SoundcardState::Started {
                guard.state = SoundcardState::Started;
            }
            guard.recording = true;
            guard.starting = false;
        }

        match self.run_block() {
            Ok(()) => {
                self.core.note_success();
                Ok(())
            }
            Err(err) => {
                if self.core.note_failure() {
                    return Err(SoundcardError::DeviceInvalidated(format!(
                        "three consecutive record failures: {err}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn play(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("push-daemon adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            if guard.state != SoundcardState::Started {
                guard.state = SoundcardState::Started;
            }
            guard.playing = true;
            guard.starting = false;
        }

        match self.run_block() {
            Ok(()) => {
                self.core.note_success();
                Ok(())
            }
            Err(err) => {
                if self.core.note_failure() {
                    return Err(SoundcardError::DeviceInvalidated(format!(
                        "three consecutive play failures: {err}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn get_buffer(&self) -> RingBufferLock<'_> {
        self.core.get_buffer()
    }

    fn get_next_buffer(&self) -> RingBufferLock<'_> {
        self.core.get_next_buffer()
    }

    fn get_prev_buffer(&self) -> RingBufferLock<'_> {
        self.core.get_prev_buffer()
    }
}

impl Drop for PushDaemonAdapter {
    fn drop(&mut self) {
        self.core.request_shutdown();
        self.handshake.callback_cond.notify_all();
        self.handshake.callback_finish_cond.notify_all();
        if let Some(handle) = self.service_thread.lock().take() {
            handle.join().ok();
        }
        if let Some(handle) = self.task_worker.lock().take() {
            handle.join().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundcard_core::Soundcard;

    #[test]
    fn play_init_then_play_runs_a_block_and_posts_tasks() {
        let adapter = PushDaemonAdapter::new(2, 44100, 256, SampleFormat::S16);
        adapter.play_init().unwrap();
        assert!(adapter.play().is_ok());
        assert!(adapter.is_playing());
        adapter.stop().unwrap();
    }

    #[test]
    fn stop_releases_the_handshake_and_joins_the_service_thread() {
        let adapter = PushDaemonAdapter::new(2, 44100, 256, SampleFormat::S16);
        adapter.record_init().unwrap();
        adapter.record().unwrap();
        adapter.stop().unwrap();
        assert!(!adapter.is_recording());
    }

    #[test]
    fn list_cards_reports_the_jack_style_device_id() {
        let adapter = PushDaemonAdapter::new(2, 44100, 256, SampleFormat::S16);
        let (ids, _names) = adapter.list_cards().unwrap();
        assert_eq!(ids, vec!["ags-jack-devin-0"]);
        adapter.stop().unwrap();
    }
}
