//! The soundcard contract and the state every backend adapter embeds.
//!
//! Backend structs compose a [`SoundcardShared`] instead of inheriting
//! from a common base (there is no base to inherit from in Rust, and the
//! single-inheritance-chain shape this deliberately avoids). The
//! [`Soundcard`] trait's generic queries are
//! implemented once against `SoundcardShared`; each adapter only
//! supplies the hardware-facing operations.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::Result;
use crate::format::{Capability, DeviceId, SampleFormat};
use crate::ring_buffer::{RingBuffer, RingBufferLock};
use crate::scheduler::Scheduler;
use crate::time_model::TimeModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundcardState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

/// State every backend adapter embeds by composition. Guarded by its own
/// recursive mutex; adapters may re-enter it from within a call already
/// holding the lock (e.g. `tic` invoked from inside `record`/`play`).
pub struct SoundcardShared {
    pub state: SoundcardState,
    pub device_id: Option<DeviceId>,
    pub capability: Capability,

    pub channels: u16,
    pub samplerate: u32,
    pub buffer_size: u32,
    pub format: SampleFormat,

    pub ring_buffer: RingBuffer,
    pub time_model: TimeModel,
    pub scheduler: Scheduler,

    pub recording: bool,
    pub playing: bool,
    pub starting: bool,
}

impl SoundcardShared {
    pub fn new(generations: usize, channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat, sub_block_count: usize) -> Self {
        Self {
            state: SoundcardState::Uninitialized,
            device_id: None,
            capability: Capability::empty(),
            channels,
            samplerate,
            buffer_size,
            format,
            ring_buffer: RingBuffer::new(generations, channels, buffer_size, format, sub_block_count),
            time_model: TimeModel::new(samplerate, buffer_size),
            scheduler: Scheduler::new(),
            recording: false,
            playing: false,
            starting: false,
        }
    }

    /// Fails silently (no reallocation, no recompute) if every field is
    /// already identical to the requested preset.
    pub fn set_presets(&mut self, channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat) {
        if self.channels == channels && self.samplerate == samplerate && self.buffer_size == buffer_size && self.format == format {
            return;
        }

        let running = self.state == SoundcardState::Started;
        self.ring_buffer.reallocate(channels, buffer_size, format, running);
        self.time_model.set_samplerate(samplerate);
        self.time_model.set_buffer_size(buffer_size);

        self.channels = channels;
        self.samplerate = samplerate;
        self.buffer_size = buffer_size;
        self.format = format;
    }

    pub fn get_presets(&self) -> (u16, u32, u32, SampleFormat) {
        (self.channels, self.samplerate, self.buffer_size, self.format)
    }

    /// `HH:MM:SS.mmm` derived from `note_offset_absolute * absolute_delay
    /// * buffer_size / samplerate`; the zero-string while not running.
    pub fn get_uptime(&self) -> String {
        if self.state != SoundcardState::Started {
            return "00:00:00.000".to_string();
        }

        let seconds = self.scheduler.note_offset_absolute() as f64 * self.time_model.absolute_delay()
            * self.buffer_size as f64
            / self.samplerate.max(1) as f64;

        let total_millis = (seconds * 1000.0).round() as u64;
        let hours = total_millis / 3_600_000;
        let minutes = (total_millis / 60_000) % 60;
        let secs = (total_millis / 1000) % 60;
        let millis = total_millis % 1000;

        format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
    }
}

/// The soundcard object mutex: a recursive lock around the shared state,
/// wrapped in `UnsafeCell` so the guard can hand out `&mut` access. Sound
/// because the mutex serializes all access; the only hazard is a second
/// `&mut` taken by the *same* thread re-entering the lock, which the
/// default trait methods avoid by never nesting `lock_shared()` calls.
pub type SoundcardCell = ReentrantMutex<UnsafeCell<SoundcardShared>>;

pub fn new_soundcard_cell(shared: SoundcardShared) -> SoundcardCell {
    ReentrantMutex::new(UnsafeCell::new(shared))
}

pub struct SoundcardGuard<'a> {
    guard: ReentrantMutexGuard<'a, UnsafeCell<SoundcardShared>>,
}

impl<'a> Deref for SoundcardGuard<'a> {
    type Target = SoundcardShared;

    fn deref(&self) -> &SoundcardShared {
        unsafe { &*self.guard.get() }
    }
}

impl<'a> DerefMut for SoundcardGuard<'a> {
    fn deref_mut(&mut self) -> &mut SoundcardShared {
        unsafe { &mut *self.guard.get() }
    }
}

/// Snapshot of the note offset published outside the soundcard mutex, so
/// a UI or MIDI client can poll position without contending with the
/// audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishedOffset {
    pub note_offset: u32,
    pub note_offset_absolute: u64,
}

/// A polymorphic capability exposed to the rest of the engine. All
/// hardware-facing operations are required; everything derivable purely
/// from [`SoundcardShared`] has a default implementation.
pub trait Soundcard: Send + Sync {
    fn shared(&self) -> &SoundcardCell;

    /// Lock-free publication point for [`PublishedOffset`]; adapters own
    /// this as a sibling field to their `SoundcardCell`, not nested
    /// inside it, so reading it never takes the soundcard mutex.
    fn published_offset(&self) -> &ArcSwap<PublishedOffset>;

    fn lock_shared(&self) -> SoundcardGuard<'_> {
        SoundcardGuard { guard: self.shared().lock() }
    }

    /// Lock-free read of the last offset [`Soundcard::tic`] published.
    fn get_published_offset(&self) -> Arc<PublishedOffset> {
        self.published_offset().load_full()
    }

    /// Two parallel lists: card identifiers and their human-readable names.
    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)>;

    /// Capability bounds for `card_id`; `SoundcardError::OutOfRange` if
    /// the device is unknown to this backend.
    fn pcm_info(&self, card_id: &str) -> Result<PcmInfo>;

    fn get_capability(&self) -> Capability {
        self.lock_shared().capability
    }

    fn record_init(&self) -> Result<()>;
    fn play_init(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;

    fn record(&self) -> Result<()>;
    fn play(&self) -> Result<()>;

    fn is_starting(&self) -> bool {
        self.lock_shared().starting
    }

    fn is_recording(&self) -> bool {
        self.lock_shared().recording
    }

    fn is_playing(&self) -> bool {
        self.lock_shared().playing
    }

    fn is_available(&self) -> bool {
        let guard = self.lock_shared();
        guard.state == SoundcardState::Started || guard.state == SoundcardState::Initialized
    }

    fn set_presets(&self, channels: u16, samplerate: u32, buffer_size: u32, format: SampleFormat) {
        self.lock_shared().set_presets(channels, samplerate, buffer_size, format);
    }

    fn get_presets(&self) -> (u16, u32, u32, SampleFormat) {
        self.lock_shared().get_presets()
    }

    fn get_buffer(&self) -> RingBufferLock<'_>;
    fn get_next_buffer(&self) -> RingBufferLock<'_>;
    fn get_prev_buffer(&self) -> RingBufferLock<'_>;

    /// Advances the scheduler by one block; returns whether a 16th pulse
    /// boundary was crossed (i.e. whether Tic/ClearBuffer/SwitchBufferFlag
    /// should be posted by the caller). Publishes the resulting offset for
    /// lock-free readers before returning.
    fn tic(&self) -> bool {
        let (note_offset, note_offset_absolute, crossed_pulse) = {
            let mut guard = self.lock_shared();
            let time_model = guard.time_model.clone();
            let outcome = guard.scheduler.tic(&time_model);
            (outcome.note_offset, guard.scheduler.note_offset_absolute(), outcome.crossed_pulse)
        };

        self.published_offset().store(Arc::new(PublishedOffset { note_offset, note_offset_absolute }));

        crossed_pulse
    }

    fn get_delay_counter(&self) -> u32 {
        self.lock_shared().scheduler.delay_counter()
    }

    fn get_note_offset(&self) -> u32 {
        self.lock_shared().scheduler.note_offset()
    }

    fn get_note_offset_absolute(&self) -> u64 {
        self.lock_shared().scheduler.note_offset_absolute()
    }

    fn get_loop_offset(&self) -> u32 {
        self.lock_shared().scheduler.loop_offset()
    }

    fn get_start_note_offset(&self) -> u32 {
        self.lock_shared().scheduler.start_note_offset()
    }

    fn get_delay(&self) -> f64 {
        let guard = self.lock_shared();
        guard.time_model.delay()[0]
    }

    fn get_attack(&self) -> u32 {
        let guard = self.lock_shared();
        guard.time_model.attack()[0]
    }

    fn get_absolute_delay(&self) -> f64 {
        self.lock_shared().time_model.absolute_delay()
    }

    fn get_bpm(&self) -> f64 {
        self.lock_shared().time_model.bpm()
    }

    fn get_delay_factor(&self) -> f64 {
        self.lock_shared().time_model.delay_factor()
    }

    fn set_bpm(&self, bpm: f64) {
        self.lock_shared().time_model.set_bpm(bpm);
    }

    fn set_delay_factor(&self, factor: f64) {
        self.lock_shared().time_model.set_delay_factor(factor);
    }

    fn get_note_256th_offset(&self) -> (u32, u32) {
        self.lock_shared().scheduler.note_256th_offset()
    }

    fn get_note_256th_attack(&self) -> (u32, u32) {
        let guard = self.lock_shared();
        guard.scheduler.note_256th_attack(&guard.time_model)
    }

    fn get_note_256th_attack_at_position(&self, position: u32) -> u32 {
        let guard = self.lock_shared();
        guard.scheduler.note_256th_attack_at_position(&guard.time_model, position)
    }

    fn get_note_256th_attack_position(&self) -> (u32, u32) {
        self.lock_shared().scheduler.note_256th_attack_position()
    }

    fn get_note_256th_attack_of_16th_pulse(&self) -> u32 {
        self.lock_shared().scheduler.note_256th_attack_of_16th_pulse()
    }

    fn get_note_256th_attack_of_16th_pulse_position(&self) -> u32 {
        self.lock_shared().scheduler.note_256th_attack_of_16th_pulse_position()
    }

    fn set_loop(&self, loop_left: u32, loop_right: u32, do_loop: bool) {
        self.lock_shared().scheduler.set_loop(loop_left, loop_right, do_loop);
    }

    fn get_loop(&self) -> (u32, u32, bool) {
        self.lock_shared().scheduler.get_loop()
    }

    fn get_uptime(&self) -> String {
        self.lock_shared().get_uptime()
    }
}

/// Capability bounds returned by `pcm_info`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcmInfo {
    pub channels_min: u16,
    pub channels_max: u16,
    pub rate_min: u32,
    pub rate_max: u32,
    pub buffer_size_min: u32,
    pub buffer_size_max: u32,
}

/// Minimal in-memory adapter used only to exercise the trait's default
/// methods; real adapters live in the backend crate.
#[cfg(test)]
struct TestSoundcard {
    cell: SoundcardCell,
    published: ArcSwap<PublishedOffset>,
}

#[cfg(test)]
impl TestSoundcard {
    fn new() -> Self {
        Self {
            cell: new_soundcard_cell(SoundcardShared::new(4, 2, 44100, 512, SampleFormat::S16, 1)),
            published: ArcSwap::from_pointee(PublishedOffset::default()),
        }
    }
}

#[cfg(test)]
impl Soundcard for TestSoundcard {
    fn shared(&self) -> &SoundcardCell {
        &self.cell
    }

    fn published_offset(&self) -> &ArcSwap<PublishedOffset> {
        &self.published
    }

    fn list_cards(&self) -> Result<(Vec<String>, Vec<String>)> {
        Ok((Vec::new(), Vec::new()))
    }

    fn pcm_info(&self, _card_id: &str) -> Result<PcmInfo> {
        Err(crate::error::SoundcardError::OutOfRange("no cards".into()))
    }

    fn record_init(&self) -> Result<()> {
        Ok(())
    }

    fn play_init(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn record(&self) -> Result<()> {
        Ok(())
    }

    fn play(&self) -> Result<()> {
        Ok(())
    }

    fn get_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_current() }
    }

    fn get_next_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_next() }
    }

    fn get_prev_buffer(&self) -> RingBufferLock<'_> {
        unsafe { (*self.cell.lock().get()).ring_buffer.lock_prev() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tic_publishes_offset_without_taking_the_mutex_afterward() {
        let card = TestSoundcard::new();
        assert_eq!(card.get_published_offset().note_offset_absolute, 0);

        for _ in 0..4096 {
            card.tic();
        }

        assert!(card.get_published_offset().note_offset_absolute > 0);
        assert_eq!(card.get_note_offset_absolute(), card.get_published_offset().note_offset_absolute);
    }

    #[test]
    fn trait_default_queries_delegate_to_shared_state() {
        let card = TestSoundcard::new();
        assert_eq!(card.get_presets(), (2, 44100, 512, SampleFormat::S16));
        assert!(!card.is_playing());
        assert_eq!(card.get_uptime(), "00:00:00.000");
    }

    #[test]
    fn set_presets_is_noop_when_identical() {
        let mut shared = SoundcardShared::new(4, 2, 44100, 512, SampleFormat::S16, 1);
        shared.scheduler.set_loop(0, 8, true);
        let before_mode = shared.ring_buffer.current_mode();
        shared.ring_buffer.switch_buffer_flag();
        let after_first_switch = shared.ring_buffer.current_mode();
        assert_ne!(before_mode, after_first_switch);

        shared.set_presets(2, 44100, 512, SampleFormat::S16);
        assert_eq!(shared.ring_buffer.current_mode(), after_first_switch);
    }

    #[test]
    fn preset_round_trip_matches_scenario() {
        let mut shared = SoundcardShared::new(4, 2, 44100, 512, SampleFormat::S16, 1);
        shared.set_presets(2, 44100, 512, SampleFormat::S16);
        assert_eq!(shared.get_presets(), (2, 44100, 512, SampleFormat::S16));
        assert!((shared.time_model.absolute_delay() - 2.6906).abs() < 1e-3);
    }

    #[test]
    fn uptime_is_zero_string_when_not_started() {
        let shared = SoundcardShared::new(4, 2, 44100, 512, SampleFormat::S16, 1);
        assert_eq!(shared.get_uptime(), "00:00:00.000");
    }

    #[test]
    fn uptime_advances_once_started() {
        let mut shared = SoundcardShared::new(4, 2, 44100, 512, SampleFormat::S16, 1);
        shared.state = SoundcardState::Started;
        for _ in 0..1000 {
            let time_model = shared.time_model.clone();
            shared.scheduler.tic(&time_model);
        }
        assert_ne!(shared.get_uptime(), "00:00:00.000");
    }
}
