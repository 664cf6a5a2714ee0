//! An in-memory adapter with no hardware dependency: a Send-safe handle
//! that records how many blocks ran instead of touching a real device.
//! Used by CI hosts with no audio hardware, and by the other two
//! adapters' test suites when they need a plain [`soundcard_core::Soundcard`]
//! to exercise the scheduler/ring-buffer plumbing in isolation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use soundcard_core::{
    Capability, DeviceId, PcmInfo, PublishedOffset, Result, RingBufferLock, SampleFormat, SoundcardCell,
    SoundcardError, SoundcardShared, SoundcardState, TaskLauncher,
};

use crate::core::{post_block_tasks, spawn_task_worker, AdapterCore, HasAdapterCore};

pub struct MockAdapter {
    core: AdapterCore,
    launcher: TaskLauncher<MockAdapter>,
    self_handle: std::sync::Weak<MockAdapter>,
    blocks_run: AtomicU64,
    task_worker: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl HasAdapterCore for MockAdapter {
    fn adapter_core(&self) -> &AdapterCore {
        &self.core
    }
}

impl MockAdapter {
    pub fn new(channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat) -> Arc<Self> {
        let adapter = Arc::new_cyclic(|weak| Self {
            core: AdapterCore::new(SoundcardShared::new(4, channels, samplerate, buffer_size, format, 1)),
            launcher: TaskLauncher::new(64),
            self_handle: weak.clone(),
            blocks_run: AtomicU64::new(0),
            task_worker: parking_lot::Mutex::new(None),
        });

        let worker = spawn_task_worker(Arc::downgrade(&adapter), &adapter.launcher);
        *adapter.task_worker.lock() = Some(worker);

        adapter
    }

    pub fn blocks_run(&self) -> u64 {
        self.blocks_run.load(Ordering::Relaxed)
    }

    fn run_block(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("mock adapter is shut down".into()));
        }

        if let Some(handle) = self.self_handle.upgrade() {
            post_block_tasks(&self.launcher.sender(), &handle);
        }

        self.blocks_run.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl soundcard_core::Soundcard for MockAdapter {
    fn shared(&self) -> &SoundcardCell {
        &self.core.cell
    }

    fn published_offset(&self) -> &arc_swap::ArcSwap<PublishedOffset> {
        &self.core.published
    }

    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)> {
        Ok((vec![DeviceId::new("mock", 0).to_string()], vec!["mock device".to_string()]))
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        DeviceId::parse(card_id)?;
        Ok(PcmInfo {
            channels_min: 1,
            channels_max: 8,
            rate_min: 8000,
            rate_max: 192_000,
            buffer_size_min: 16,
            buffer_size_max: 16384,
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
            return Err(SoundcardError::ServiceNotRunning("mock adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            guard.state = SoundcardState::Started;
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
                    return Err(SoundcardError::DeviceInvalidated(format!("three consecutive record failures: {err}")));
                }
                Ok(())
            }
        }
    }

    fn play(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("mock adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            guard.state = SoundcardState::Started;
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
                    return Err(SoundcardError::DeviceInvalidated(format!("three consecutive play failures: {err}")));
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

impl Drop for MockAdapter {
    fn drop(&mut self) {
        self.core.request_shutdown();
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
    fn play_runs_blocks_and_counts_them() {
        let adapter = MockAdapter::new(2, 44100, 128, SampleFormat::S16);
        adapter.play_init().unwrap();
        adapter.play().unwrap();
        adapter.play().unwrap();
        assert_eq!(adapter.blocks_run(), 2);
        adapter.stop().unwrap();
    }

    #[test]
    fn stopped_adapter_refuses_further_blocks() {
        let adapter = MockAdapter::new(2, 44100, 128, SampleFormat::S16);
        adapter.record_init().unwrap();
        adapter.stop().unwrap();
        assert!(adapter.record().is_err());
    }

    #[test]
    fn list_cards_reports_the_mock_device_id() {
        let adapter = MockAdapter::new(2, 44100, 128, SampleFormat::S16);
        let (ids, names) = adapter.list_cards().unwrap();
        assert_eq!(ids, vec!["ags-mock-devin-0"]);
        assert_eq!(names, vec!["mock device"]);
        adapter.stop().unwrap();
    }
}
