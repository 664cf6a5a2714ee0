//! Variant C: an OS-callback adapter for host APIs that pull samples
//! from a registered data callback on their own thread (WASAPI, CoreAudio,
//! ALSA via cpal). The worker thread owns the non-`Send` `cpal::Device`
//! and `cpal::Stream`; `record`/`play` only toggle a control channel,
//! keeping the public handle `Send`.
//!
//! cpal's portable API has no way to request WASAPI exclusive mode; a
//! [`soundcard_core::config::ShareMode::Exclusive`] preference is stored
//! and surfaced through `pcm_info`, but the stream is always opened in
//! the host's shared mode. Tracked in the repository's design notes
//! rather than silently ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use soundcard_core::config::ShareMode;
use soundcard_core::{
    Capability, DeviceId, PcmInfo, PublishedOffset, Result, RingBufferLock, SampleFormat, SoundcardCell,
    SoundcardError, SoundcardShared, SoundcardState, TaskLauncher, TaskSender,
};

use crate::core::{post_block_tasks, spawn_task_worker, AdapterCore, HasAdapterCore};

enum CtrlMsg {
    StartOutput,
    StartInput,
    Stop,
    Shutdown,
}

pub struct PullHostAdapter {
    core: AdapterCore,
    launcher: TaskLauncher<PullHostAdapter>,
    share_mode: ShareMode,
    ctrl_tx: Sender<CtrlMsg>,
    host_thread: Mutex<Option<thread::JoinHandle<()>>>,
    task_worker: Mutex<Option<thread::JoinHandle<()>>>,
    frames_since_start: AtomicU64,
}

impl HasAdapterCore for PullHostAdapter {
    fn adapter_core(&self) -> &AdapterCore {
        &self.core
    }
}

impl PullHostAdapter {
    pub fn new(channels: u16, samplerate: u32, buffer_size: u32, share_mode: ShareMode) -> Result<Arc<Self>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SoundcardError::ServiceNotRunning("no default cpal output device".into()))?;

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(samplerate),
            buffer_size: cpal::BufferSize::Fixed(buffer_size),
        };

        let (ctrl_tx, ctrl_rx) = unbounded();

        let adapter = Arc::new(Self {
            core: AdapterCore::new(SoundcardShared::new(8, channels, samplerate, buffer_size, SampleFormat::F32, 2)),
            launcher: TaskLauncher::new(64),
            share_mode,
            ctrl_tx,
            host_thread: Mutex::new(None),
            task_worker: Mutex::new(None),
            frames_since_start: AtomicU64::new(0),
        });

        let weak_worker = Arc::downgrade(&adapter);
        let sender = adapter.launcher.sender();
        let host_handle = thread::spawn(move || worker_loop(weak_worker, device, config, ctrl_rx, sender));
        *adapter.host_thread.lock() = Some(host_handle);

        let worker = spawn_task_worker(Arc::downgrade(&adapter), &adapter.launcher);
        *adapter.task_worker.lock() = Some(worker);

        Ok(adapter)
    }

    pub fn frames_since_start(&self) -> u64 {
        self.frames_since_start.load(Ordering::Relaxed)
    }

    /// The share mode requested at construction. Informational only: cpal
    /// offers no portable way to force WASAPI exclusive mode, so streams
    /// are always opened shared regardless of this value.
    pub fn share_mode(&self) -> ShareMode {
        self.share_mode
    }
}

/// Owns the cpal device and stream so neither crosses into the adapter's
/// `Send + Sync` handle. Data callbacks read/write the shared ring buffer
/// directly and post the per-block task trio themselves, since the host
/// drives the callback cadence rather than `record`/`play`.
fn worker_loop(
    weak: Weak<PullHostAdapter>,
    device: Device,
    config: StreamConfig,
    rx: Receiver<CtrlMsg>,
    sender: TaskSender<PullHostAdapter>,
) {
    let channels = config.channels as usize;
    let mut output_stream: Option<cpal::Stream> = None;
    let mut input_stream: Option<cpal::Stream> = None;

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(CtrlMsg::StartOutput) => {
                if output_stream.is_none() {
                    output_stream = build_output_stream(&device, &config, channels, weak.clone(), sender.clone());
                }
            }
            Ok(CtrlMsg::StartInput) => {
                if input_stream.is_none() {
                    input_stream = build_input_stream(&device, &config, channels, weak.clone(), sender.clone());
                }
            }
            Ok(CtrlMsg::Stop) => {
                output_stream = None;
                input_stream = None;
            }
            Ok(CtrlMsg::Shutdown) => return,
            Err(RecvTimeoutError::Timeout) => {
                if weak.upgrade().map(|a| a.core.is_shutdown()).unwrap_or(true) {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn build_output_stream(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    weak: Weak<PullHostAdapter>,
    sender: TaskSender<PullHostAdapter>,
) -> Option<cpal::Stream> {
    let data_cb = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
        let Some(adapter) = weak.upgrade() else {
            data.fill(0.0);
            return;
        };
        if adapter.core.is_shutdown() {
            data.fill(0.0);
            return;
        }

        {
            let buf = adapter.core.get_buffer();
            copy_bytes_to_floats(buf.bytes(), data);
        }

        let frames = data.len() / channels.max(1);
        adapter.frames_since_start.fetch_add(frames as u64, Ordering::Relaxed);
        post_block_tasks(&sender, &adapter);
    };
    let err_cb = |err| tracing::warn!(%err, "pull-host output stream error");

    match device.build_output_stream(config, data_cb, err_cb, None) {
        Ok(stream) => match stream.play() {
            Ok(()) => Some(stream),
            Err(err) => {
                tracing::warn!(%err, "failed to start pull-host output stream");
                None
            }
        },
        Err(err) => {
            tracing::warn!(%err, "failed to build pull-host output stream");
            None
        }
    }
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    weak: Weak<PullHostAdapter>,
    sender: TaskSender<PullHostAdapter>,
) -> Option<cpal::Stream> {
    let data_cb = move |data: &[f32], _info: &cpal::InputCallbackInfo| {
        let Some(adapter) = weak.upgrade() else { return };
        if adapter.core.is_shutdown() {
            return;
        }

        {
            let buf = adapter.core.get_next_buffer();
            copy_floats_to_bytes(data, buf.bytes_mut());
        }

        let frames = data.len() / channels.max(1);
        adapter.frames_since_start.fetch_add(frames as u64, Ordering::Relaxed);
        post_block_tasks(&sender, &adapter);
    };
    let err_cb = |err| tracing::warn!(%err, "pull-host input stream error");

    match device.build_input_stream(config, data_cb, err_cb, None) {
        Ok(stream) => match stream.play() {
            Ok(()) => Some(stream),
            Err(err) => {
                tracing::warn!(%err, "failed to start pull-host input stream");
                None
            }
        },
        Err(err) => {
            tracing::warn!(%err, "failed to build pull-host input stream");
            None
        }
    }
}

fn copy_bytes_to_floats(bytes: &[u8], out: &mut [f32]) {
    for (i, sample) in out.iter_mut().enumerate() {
        let start = i * 4;
        *sample = bytes
            .get(start..start + 4)
            .and_then(|chunk| chunk.try_into().ok())
            .map(f32::from_le_bytes)
            .unwrap_or(0.0);
    }
}

fn copy_floats_to_bytes(samples: &[f32], out: &mut [u8]) {
    for (i, sample) in samples.iter().enumerate() {
        let start = i * 4;
        if let Some(chunk) = out.get_mut(start..start + 4) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
    }
}

impl soundcard_core::Soundcard for PullHostAdapter {
    fn shared(&self) -> &SoundcardCell {
        &self.core.cell
    }

    fn published_offset(&self) -> &arc_swap::ArcSwap<PublishedOffset> {
        &self.core.published
    }

    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)> {
        let host = cpal::default_host();
        let mut ids = Vec::new();
        let mut names = Vec::new();

        let outputs = host.output_devices().map_err(|e| SoundcardError::ServiceNotRunning(e.to_string()))?;
        for (index, device) in outputs.enumerate() {
            ids.push(DeviceId::new("wasapi", index as u32).to_string());
            names.push(device.name().unwrap_or_else(|_| "unknown output device".to_string()));
        }

        Ok((ids, names))
    }

    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo> {
        DeviceId::parse(card_id)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SoundcardError::ServiceNotRunning("no default cpal output device".into()))?;
        let configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| SoundcardError::ServiceNotRunning(e.to_string()))?
            .collect();

        if configs.is_empty() {
            return Err(SoundcardError::ServiceNotRunning(format!("{card_id} reports no supported configs")));
        }

        let channels_min = configs.iter().map(|c| c.channels()).min().unwrap_or(1);
        let channels_max = configs.iter().map(|c| c.channels()).max().unwrap_or(2);
        let rate_min = configs.iter().map(|c| c.min_sample_rate().0).min().unwrap_or(8000);
        let rate_max = configs.iter().map(|c| c.max_sample_rate().0).max().unwrap_or(192_000);

        Ok(PcmInfo {
            channels_min,
            channels_max,
            rate_min,
            rate_max,
            buffer_size_min: 32,
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
        self.ctrl_tx.send(CtrlMsg::Stop).ok();
        self.ctrl_tx.send(CtrlMsg::Shutdown).ok();

        if let Some(handle) = self.host_thread.lock().take() {
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
            return Err(SoundcardError::ServiceNotRunning("pull-host adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            guard.state = SoundcardState::Started;
            guard.recording = true;
            guard.starting = false;
        }

        self.ctrl_tx
            .send(CtrlMsg::StartInput)
            .map_err(|_| SoundcardError::ServiceNotRunning("pull-host control channel closed".into()))
    }

    fn play(&self) -> Result<()> {
        if self.core.is_shutdown() {
            return Err(SoundcardError::ServiceNotRunning("pull-host adapter is shut down".into()));
        }

        {
            let mut guard = self.lock_shared();
            guard.state = SoundcardState::Started;
            guard.playing = true;
            guard.starting = false;
        }

        self.ctrl_tx
            .send(CtrlMsg::StartOutput)
            .map_err(|_| SoundcardError::ServiceNotRunning("pull-host control channel closed".into()))
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

impl Drop for PullHostAdapter {
    fn drop(&mut self) {
        self.core.request_shutdown();
        self.ctrl_tx.send(CtrlMsg::Shutdown).ok();
        if let Some(handle) = self.host_thread.lock().take() {
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

    #[test]
    fn copy_bytes_to_floats_pads_short_buffers_with_silence() {
        let bytes = 1.0f32.to_le_bytes();
        let mut out = [0.0f32; 3];
        copy_bytes_to_floats(&bytes, &mut out);
        assert_eq!(out, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn copy_floats_to_bytes_round_trips_through_copy_bytes_to_floats() {
        let samples = [0.25f32, -0.5, 1.0];
        let mut bytes = vec![0u8; 16];
        copy_floats_to_bytes(&samples, &mut bytes);

        let mut out = [0.0f32; 4];
        copy_bytes_to_floats(&bytes, &mut out);
        assert_eq!(out, [0.25, -0.5, 1.0, 0.0]);
    }
}
