//! Variant B: a soft-real-time adapter for audio daemon libraries that
//! expose a synchronous "read one block, write one block" API rather
//! than an OS callback. No condvar handshake: `record`/`play` itself
//! paces the block cadence against wall-clock time and then runs the
//! block's Tic/ClearBuffer/SwitchBufferFlag sequence inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use soundcard_core::{
    Capability, DeviceId, PcmInfo, PublishedOffset, Result, RingBufferLock, SampleFormat, SoundcardCell,
    SoundcardError, SoundcardShared, SoundcardState, TaskLauncher,
};

use crate::core::{post_block_tasks, spawn_task_worker, AdapterCore, HasAdapterCore};

pub struct PolledDeviceAdapter {
    core: AdapterCore,
    launcher: TaskLauncher<PolledDeviceAdapter>,
    self_handle: std::sync::Weak<PolledDeviceAdapter>,
    last_block_at: parking_lot::Mutex<Option<Instant>>,
    blocks_run: AtomicU64,
    task_worker: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl HasAdapterCore for PolledDeviceAdapter {
    fn adapter_core(&self) -> &AdapterCore {
        &self.core
    }
}

impl PolledDeviceAdapter {
    pub fn new(channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat) -> Arc<Self> {
        let adapter = Arc::new_cyclic(|weak| Self {
            core: AdapterCore::new(SoundcardShared::new(8, channels, samplerate, buffer_size, format, 2)),
            launcher: TaskLauncher::new(64),
            self_handle: weak.clone(),
            last_block_at: parking_lot::Mutex::new(None),
            blocks_run: AtomicU64::new(0),
            task_worker: parking_lot::Mutex::new(None),
        });

        let worker = spawn_task_worker(Arc::downgrade(&adapter), &adapter.launcher);
        *adapter.task_worker.lock() = Some(worker);

        adapter
    }

    /// Wall-clock duration of one block at the current preset, `{
    /// buffer_size} / {samplerate}` seconds. The block-to-block cadence
    /// this loop paces itself against; the musical (16th-note) clock
    /// inside `Tic` runs off `TimeModel::absolute_delay` independently,
    /// same as on the other two adapter variants.
    fn block_period(&self) -> Duration {
        let (_, samplerate, buffer_size, _) = self.lock_shared().get_presets();
        Duration::from_secs_f64(buffer_size as f64 / samplerate.max(1) as f64)
    }

    fn run_block(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("polled device adapter is shut down".into()));
        }

        let period = self.block_period();
        {
            let mut last = self.last_block_at.lock();
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < period {
                    std::thread::sleep(period - elapsed);
                }
            }
            *last = Some(Instant::now());
        }

        if let Some(handle) = self.self_handle.upgrade() {
            post_block_tasks(&self.launcher.sender(), &handle);
        }

        self.blocks_run.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn blocks_run(&self) -> u64 {
        self.blocks_run.load(Ordering::Relaxed)
    }
}

impl soundcard_core::Soundcard for PolledDeviceAdapter {
    fn shared(&self) -> &SoundcardCell {
        &self.core.cell
    }

    fn published_offset(&self) -> &arc_swap::ArcSwap<PublishedOffset> {
        &self.core.published
    }

    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)> {
        Ok((vec![DeviceId::new("gstreamer", 0).to_string()], vec!["default audio daemon sink".to_string()]))
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        DeviceId::parse(card_id)?;
        Ok(PcmInfo {
            channels_min: 1,
            channels_max: 8,
            rate_min: 8000,
            rate_max: 192_000,
            buffer_size_min: 32,
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
            return Err(SoundcardError::ServiceNotRunning("polled device adapter is shut down".into()));
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
                tracing::warn!(%err, "polled device record block failed");
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
            return Err(SoundcardError::ServiceNotRunning("polled device adapter is shut down".into()));
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
                tracing::warn!(%err, "polled device play block failed");
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

impl Drop for PolledDeviceAdapter {
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
    fn play_blocks_run_sequentially_and_paced() {
        let adapter = PolledDeviceAdapter::new(2, 44100, 64, SampleFormat::S16);
        adapter.play_init().unwrap();
        adapter.play().unwrap();
        adapter.play().unwrap();
        assert_eq!(adapter.blocks_run(), 2);
        adapter.stop().unwrap();
    }

    #[test]
    fn stopped_adapter_refuses_further_blocks() {
        let adapter = PolledDeviceAdapter::new(2, 44100, 64, SampleFormat::S16);
        adapter.play_init().unwrap();
        adapter.stop().unwrap();
        assert!(adapter.play().is_err());
    }

    #[test]
    fn pcm_info_rejects_unknown_device_ids() {
        let adapter = PolledDeviceAdapter::new(2, 44100, 64, SampleFormat::S16);
        assert!(adapter.pcm_info("not-a-device-id").is_err());
    }
}
