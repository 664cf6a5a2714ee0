//! N-generation audio frame storage with per-generation recursive locks.
//!
//! Each generation is `channels * buffer_size * word_size(format)` bytes.
//! `switch_buffer_flag` is the only legal mutation of the active generation
//! index and is meant to be driven exclusively through a [`crate::task`]
//! so consumers and producers observe it at the same serialization point.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::format::SampleFormat;

/// One lockable generation: a byte buffer plus its sub-block locks.
struct Generation {
    data: ReentrantMutex<UnsafeCell<Vec<u8>>>,
    sub_blocks: Vec<ReentrantMutex<()>>,
}

/// A fixed array of `N` independently-lockable frame buffers.
pub struct RingBuffer {
    generations: Vec<Generation>,
    mode: AtomicUsize,
    channels: u16,
    buffer_size: u32,
    format: SampleFormat,
    sub_block_count: usize,
}

/// RAII guard over one generation's raw bytes. Holding this guard is what
/// makes the `UnsafeCell` access inside sound: only the lock holder (this
/// guard) may call [`RingBufferLock::bytes`]/[`RingBufferLock::bytes_mut`].
pub struct RingBufferLock<'a> {
    guard: ReentrantMutexGuard<'a, UnsafeCell<Vec<u8>>>,
}

impl<'a> RingBufferLock<'a> {
    pub fn bytes(&self) -> &[u8] {
        unsafe { &*self.guard.get() }
    }

    /// # Safety-by-construction
    /// Exclusive access is guaranteed by the recursive mutex this guard
    /// holds; the only hazard is a second `&mut` taken by the *same*
    /// thread re-entering the lock, which callers must avoid (mirrors the
    /// single-writer-at-a-time discipline the recursive mutex is meant to
    /// enforce).
    pub fn bytes_mut(&self) -> &mut [u8] {
        unsafe { &mut *self.guard.get() }
    }
}

impl RingBuffer {
    /// `generations` is 4 for push-daemon backends, 8 for polled/pull-host.
    pub fn new(
        generations: usize,
        channels: u16,
        buffer_size: u32,
        format: SampleFormat,
        sub_block_count: usize,
    ) -> Self {
        let frame_bytes = channels as usize * buffer_size as usize * format.word_size();

        let generations = (0..generations)
            .map(|_| Generation {
                data: ReentrantMutex::new(UnsafeCell::new(vec![0u8; frame_bytes])),
                sub_blocks: (0..sub_block_count * channels as usize)
                    .map(|_| ReentrantMutex::new(()))
                    .collect(),
            })
            .collect();

        Self {
            generations,
            mode: AtomicUsize::new(0),
            channels,
            buffer_size,
            format,
            sub_block_count,
        }
    }

    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.buffer_size as usize * self.format.word_size()
    }

    /// Current generation index, `app_buffer_mode`.
    pub fn current_mode(&self) -> usize {
        self.mode.load(Ordering::Acquire)
    }

    /// Advances `app_buffer_mode := (mode + 1) mod N`. This is the only
    /// legal mutation of the index; callers route it through a
    /// `SwitchBufferFlag` task so it stays serialized with consumers.
    pub fn switch_buffer_flag(&self) {
        let n = self.generations.len();
        self.mode
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |m| Some((m + 1) % n))
            .ok();
    }

    pub fn lock_current(&self) -> RingBufferLock<'_> {
        self.lock_generation(self.current_mode())
    }

    pub fn lock_next(&self) -> RingBufferLock<'_> {
        let n = self.generations.len();
        self.lock_generation((self.current_mode() + 1) % n)
    }

    pub fn lock_prev(&self) -> RingBufferLock<'_> {
        let n = self.generations.len();
        self.lock_generation((self.current_mode() + n - 1) % n)
    }

    pub fn lock_generation(&self, index: usize) -> RingBufferLock<'_> {
        let generation = &self.generations[index % self.generations.len()];
        RingBufferLock { guard: generation.data.lock() }
    }

    /// Locks one sub-block mutex within a generation, permitting
    /// fine-grained parallel fills by multiple producer threads.
    pub fn lock_sub_block(&self, generation: usize, sub_block: usize) -> ReentrantMutexGuard<'_, ()> {
        let generation = &self.generations[generation % self.generations.len()];
        let idx = sub_block % generation.sub_blocks.len().max(1);
        generation.sub_blocks[idx].lock()
    }

    /// Frees and reallocates every generation, zero-initialized, per
    /// `set_presets`. Resets the generation index to 0 only if `running`
    /// is `false`.
    pub fn reallocate(&mut self, channels: u16, buffer_size: u32, format: SampleFormat, running: bool) {
        let frame_bytes = channels as usize * buffer_size as usize * format.word_size();
        let sub_block_count = self.sub_block_count;

        self.generations = (0..self.generations.len())
            .map(|_| Generation {
                data: ReentrantMutex::new(UnsafeCell::new(vec![0u8; frame_bytes])),
                sub_blocks: (0..sub_block_count * channels as usize)
                    .map(|_| ReentrantMutex::new(()))
                    .collect(),
            })
            .collect();

        self.channels = channels;
        self.buffer_size = buffer_size;
        self.format = format;

        if !running {
            self.mode.store(0, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reallocate_sizes_every_generation_correctly() {
        let mut rb = RingBuffer::new(4, 2, 512, SampleFormat::S16, 4);
        assert_eq!(rb.frame_bytes(), 2 * 512 * 2);
        rb.reallocate(2, 256, SampleFormat::F32, false);
        assert_eq!(rb.frame_bytes(), 2 * 256 * 4);
        assert_eq!(rb.lock_current().bytes().len(), 2 * 256 * 4);
    }

    #[test]
    fn rotation_returns_to_same_generation_after_n_switches() {
        let rb = RingBuffer::new(4, 2, 128, SampleFormat::S16, 1);
        let start = rb.current_mode();
        for _ in 0..rb.generation_count() {
            rb.switch_buffer_flag();
        }
        assert_eq!(rb.current_mode(), start);
    }

    #[test]
    fn reallocate_resets_index_only_when_not_running() {
        let mut rb = RingBuffer::new(4, 2, 128, SampleFormat::S16, 1);
        rb.switch_buffer_flag();
        rb.switch_buffer_flag();
        assert_eq!(rb.current_mode(), 2);

        rb.reallocate(2, 128, SampleFormat::S16, true);
        assert_eq!(rb.current_mode(), 2);

        rb.reallocate(2, 128, SampleFormat::S16, false);
        assert_eq!(rb.current_mode(), 0);
    }

    #[test]
    fn write_then_read_current_generation_is_visible() {
        let rb = RingBuffer::new(4, 1, 4, SampleFormat::S8, 1);
        {
            let lock = rb.lock_current();
            lock.bytes_mut()[0] = 42;
        }
        assert_eq!(rb.lock_current().bytes()[0], 42);
    }
}
