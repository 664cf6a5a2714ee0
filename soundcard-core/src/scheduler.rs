//! Tick scheduler: advances note offset, the 256th-offset window, loop
//! handling, and task emission. Invoked exactly once per audio block.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::time_model::{TimeModel, PERIOD};

/// Scheduler state advanced once per audio block under the soundcard
/// mutex. `note_offset_absolute` is additionally published through an
/// atomic so readers can observe monotonicity without locking.
pub struct Scheduler {
    tic_counter: u32,
    delay_counter: f64,
    tact_counter: u64,

    note_offset: u32,
    note_offset_absolute: AtomicU64,
    start_note_offset: u32,

    loop_left: u32,
    loop_right: u32,
    do_loop: bool,
    loop_offset: u32,

    note_256th_offset: u32,
    note_256th_offset_last: u32,
    note_256th_attack_of_16th_pulse: u32,
    note_256th_attack_of_16th_pulse_position: u32,
}

/// Outcome of one [`Scheduler::tic`] call: whether a new 16th pulse was
/// crossed (and hence whether the Tic/ClearBuffer/SwitchBufferFlag tasks
/// should be posted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicOutcome {
    pub note_offset: u32,
    pub crossed_pulse: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tic_counter: 0,
            delay_counter: 0.0,
            tact_counter: 0,
            note_offset: 0,
            note_offset_absolute: AtomicU64::new(0),
            start_note_offset: 0,
            loop_left: 0,
            loop_right: 4,
            do_loop: false,
            loop_offset: 0,
            note_256th_offset: 0,
            note_256th_offset_last: 0,
            note_256th_attack_of_16th_pulse: 0,
            note_256th_attack_of_16th_pulse_position: 0,
        }
    }

    pub fn delay_counter(&self) -> u32 {
        self.delay_counter as u32
    }

    pub fn note_offset(&self) -> u32 {
        self.note_offset
    }

    pub fn note_offset_absolute(&self) -> u64 {
        self.note_offset_absolute.load(Ordering::Acquire)
    }

    pub fn start_note_offset(&self) -> u32 {
        self.start_note_offset
    }

    pub fn set_start_note_offset(&mut self, offset: u32) {
        self.start_note_offset = offset;
    }

    pub fn loop_offset(&self) -> u32 {
        self.loop_offset
    }

    pub fn tact_counter(&self) -> u64 {
        self.tact_counter
    }

    pub fn set_loop(&mut self, loop_left: u32, loop_right: u32, do_loop: bool) {
        self.loop_left = loop_left;
        self.loop_right = loop_right;
        self.do_loop = do_loop;
    }

    pub fn get_loop(&self) -> (u32, u32, bool) {
        (self.loop_left, self.loop_right, self.do_loop)
    }

    pub fn note_256th_offset(&self) -> (u32, u32) {
        (self.note_256th_offset, self.note_256th_offset_last)
    }

    /// The sub-tick window covered by the present block: `[attack[tic],
    /// attack[tic+1])` within the current period.
    pub fn note_256th_attack(&self, time_model: &TimeModel) -> (u32, u32) {
        let lower = time_model.attack()[self.tic_counter as usize % PERIOD];
        let upper = time_model.attack()[(self.tic_counter as usize + 1) % PERIOD];
        (lower, upper)
    }

    pub fn note_256th_attack_at_position(&self, time_model: &TimeModel, position: u32) -> u32 {
        time_model.note_256th_attack_at_position(position as usize, self.tic_counter as usize)
    }

    pub fn note_256th_attack_position(&self) -> (u32, u32) {
        (self.note_256th_offset, self.note_256th_offset_last)
    }

    pub fn note_256th_attack_of_16th_pulse(&self) -> u32 {
        self.note_256th_attack_of_16th_pulse
    }

    pub fn note_256th_attack_of_16th_pulse_position(&self) -> u32 {
        self.note_256th_attack_of_16th_pulse_position
    }

    /// Advances `tic_counter` modulo [`PERIOD`]. Invoked after a note
    /// offset change, mirroring `ags_*_devin_offset_changed`.
    fn offset_changed(&mut self) {
        self.tic_counter = (self.tic_counter + 1) % PERIOD as u32;
    }

    /// Runs the per-block delay/attack/loop arithmetic. Returns the
    /// resulting note offset and whether a 16th pulse boundary was
    /// crossed (i.e. whether the caller should post
    /// Tic/ClearBuffer/SwitchBufferFlag).
    pub fn tic(&mut self, time_model: &TimeModel) -> TicOutcome {
        let delay = time_model.delay()[self.tic_counter as usize];
        let note_256th_delay = time_model.note_256th_delay();
        let attack = time_model.attack()[self.tic_counter as usize];
        let (lower, upper) = self.note_256th_attack(time_model);

        if self.delay_counter + 1.0 >= delay.floor() {
            if self.do_loop && self.note_offset + 1 == self.loop_right {
                self.note_offset = self.loop_left;
                self.note_256th_offset = 16 * self.loop_left;
            } else {
                self.note_offset += 1;
                self.note_256th_offset = 16 * self.note_offset;
            }

            self.note_256th_offset_last = self.note_256th_offset;
            if note_256th_delay < 1.0 && lower < upper {
                self.note_256th_offset_last = self.note_256th_offset
                    + ((upper - lower) as f64 / (note_256th_delay * time_model.buffer_size() as f64))
                        .floor() as u32;
            }

            self.recompute_pulse_attack(time_model, attack, note_256th_delay);

            self.note_offset_absolute.fetch_add(1, Ordering::AcqRel);
            self.offset_changed();

            self.delay_counter = self.delay_counter + 1.0 - delay;
            self.tact_counter += 1;

            TicOutcome { note_offset: self.note_offset, crossed_pulse: true }
        } else {
            self.note_256th_offset =
                16 * self.note_offset + ((self.delay_counter + 1.0) / note_256th_delay).floor() as u32;
            self.note_256th_offset_last = self.note_256th_offset;
            if lower < upper {
                self.note_256th_offset_last = self.note_256th_offset
                    + ((upper - lower) as f64 / (note_256th_delay * time_model.buffer_size() as f64))
                        .floor() as u32;
            }

            self.delay_counter += 1.0;

            TicOutcome { note_offset: self.note_offset, crossed_pulse: false }
        }
    }

    /// Walks backward through recorded sub-tick positions while the
    /// attack-at-position keeps decreasing.
    fn recompute_pulse_attack(&mut self, time_model: &TimeModel, attack: u32, note_256th_delay: f64) {
        let mut pulse = attack;
        let mut i: u32 = 1;

        if note_256th_delay < 1.0 {
            let limit = (1.0 / note_256th_delay).ceil() as u32;
            while i < limit {
                if self.note_256th_attack_of_16th_pulse_position >= i {
                    let candidate = self.note_256th_attack_at_position(
                        time_model,
                        self.note_256th_attack_of_16th_pulse_position - i,
                    );
                    if candidate < pulse {
                        pulse = candidate;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
                i += 1;
            }
        }

        self.note_256th_attack_of_16th_pulse = pulse;
        self.note_256th_attack_of_16th_pulse_position += i;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_absolute_offset_across_many_tics() {
        let time_model = TimeModel::new(44100, 512);
        let mut scheduler = Scheduler::new();

        let mut prev = scheduler.note_offset_absolute();
        for _ in 0..64 {
            let before = scheduler.note_offset_absolute();
            // Force a crossing every tic for this test by shrinking delay via bpm.
            scheduler.tic(&time_model);
            let after = scheduler.note_offset_absolute();
            assert!(after == before || after == before + 1);
            prev = after;
        }
        let _ = prev;
    }

    #[test]
    fn loop_wrap_sequence() {
        let time_model = TimeModel::new(44100, 512);
        let mut scheduler = Scheduler::new();
        scheduler.set_loop(2, 4, true);
        scheduler.note_offset = 3;
        scheduler.delay_counter = time_model.delay()[0].floor() - 1.0;

        let before_absolute = scheduler.note_offset_absolute();
        let outcome = scheduler.tic(&time_model);

        assert_eq!(outcome.note_offset, 2);
        assert_eq!(scheduler.note_offset_absolute(), before_absolute + 1);
    }

    #[test]
    fn delay_counter_never_exceeds_period_minus_one_at_buffer_size_one() {
        let time_model = TimeModel::new(44100, 1);
        let mut scheduler = Scheduler::new();

        for _ in 0..256 {
            scheduler.tic(&time_model);
            assert!(scheduler.delay_counter() <= PERIOD as u32);
        }
    }
}
