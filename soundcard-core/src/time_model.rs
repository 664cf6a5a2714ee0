//! BPM, delay factor, segmentation, and the per-tick delay/attack arrays.
//!
//! `delay[]`/`attack[]` are indexed by `tic_counter` (one of
//! [`PERIOD`] slots); the 256th-note sub-tick arrays are 32 rows of
//! `PERIOD` slots each, kept as one contiguous 2-D array for cache
//! locality.

/// Number of distinct `delay[]`/`attack[]` slots.
pub const PERIOD: usize = 16;

/// Number of 256th-note sub-tick rows.
const SUB_TICK_ROWS: usize = 32;

#[derive(Debug, Clone)]
pub struct TimeModel {
    bpm: f64,
    delay_factor: f64,
    samplerate: u32,
    buffer_size: u32,

    delay: [f64; PERIOD],
    attack: [u32; PERIOD],

    note_256th_delay: f64,
    note_256th_attack: [[u32; PERIOD]; SUB_TICK_ROWS],
}

impl TimeModel {
    pub fn new(samplerate: u32, buffer_size: u32) -> Self {
        let mut model = Self {
            bpm: 120.0,
            delay_factor: 1.0,
            samplerate,
            buffer_size,
            delay: [0.0; PERIOD],
            attack: [0; PERIOD],
            note_256th_delay: 0.0,
            note_256th_attack: [[0; PERIOD]; SUB_TICK_ROWS],
        };
        model.adjust_delay_and_attack();
        model
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn delay_factor(&self) -> f64 {
        self.delay_factor
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn delay(&self) -> &[f64; PERIOD] {
        &self.delay
    }

    pub fn attack(&self) -> &[u32; PERIOD] {
        &self.attack
    }

    pub fn note_256th_delay(&self) -> f64 {
        self.note_256th_delay
    }

    /// `absolute_delay = 60 * (samplerate/buffer_size) / bpm * (1/16) * (1/delay_factor)`.
    pub fn absolute_delay(&self) -> f64 {
        60.0 * (self.samplerate as f64 / self.buffer_size as f64) / self.bpm * (1.0 / 16.0)
            * (1.0 / self.delay_factor)
    }

    pub fn note_256th_attack_at_position(&self, row: usize, col: usize) -> u32 {
        self.note_256th_attack[row % SUB_TICK_ROWS][col % PERIOD]
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
        self.adjust_delay_and_attack();
    }

    pub fn set_delay_factor(&mut self, factor: f64) {
        self.delay_factor = factor;
        self.adjust_delay_and_attack();
    }

    pub fn set_samplerate(&mut self, samplerate: u32) {
        self.samplerate = samplerate;
        self.adjust_delay_and_attack();
    }

    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        self.buffer_size = buffer_size;
        self.adjust_delay_and_attack();
    }

    /// `"numerator/denominator"` yields `delay_factor := 1/denominator`.
    /// Invalid strings leave the factor unchanged.
    pub fn set_segmentation(&mut self, segmentation: &str) {
        if let Some((num_str, den_str)) = segmentation.split_once('/') {
            if let (Ok(numerator), Ok(denominator)) =
                (num_str.trim().parse::<f64>(), den_str.trim().parse::<f64>())
            {
                if numerator != 0.0 && denominator != 0.0 {
                    self.delay_factor = (1.0 / numerator) * (numerator / denominator);
                    self.adjust_delay_and_attack();
                }
            }
        }
    }

    /// Recomputes `delay[]`, `attack[]`, `note_256th_delay`, and the
    /// sub-tick attack grid from the current (bpm, delay_factor,
    /// samplerate, buffer_size). Idempotent when no presets change.
    pub fn adjust_delay_and_attack(&mut self) {
        let absolute_delay = self.absolute_delay();
        self.note_256th_delay = absolute_delay / 16.0;

        let mut attack_accum: f64 = 0.0;
        for i in 0..PERIOD {
            self.delay[i] = absolute_delay;
            self.attack[i] = attack_accum.round() as u32;
            attack_accum = (attack_accum + absolute_delay * self.buffer_size as f64)
                % self.buffer_size.max(1) as f64;
        }

        let sub_tick_span = if self.note_256th_delay > 0.0 {
            self.note_256th_delay * self.buffer_size as f64
        } else {
            0.0
        };

        for row in 0..SUB_TICK_ROWS {
            for col in 0..PERIOD {
                let base = self.attack[col] as f64;
                let offset = sub_tick_span * row as f64;
                self.note_256th_attack[row][col] =
                    ((base + offset) as u32) % self.buffer_size.max(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_delay_matches_preset_round_trip_scenario() {
        let model = TimeModel::new(44100, 512);
        let mut model = model;
        model.set_bpm(120.0);
        let expected = 60.0 * (44100.0 / 512.0) / 120.0 * (1.0 / 16.0);
        assert!((model.absolute_delay() - expected).abs() < 1e-9);
        assert!((model.absolute_delay() - 2.6906_f64).abs() < 1e-3);
    }

    #[test]
    fn set_bpm_round_trips() {
        let mut model = TimeModel::new(48000, 1024);
        model.set_bpm(140.0);
        assert_eq!(model.bpm(), 140.0);
    }

    #[test]
    fn adjust_delay_and_attack_is_idempotent() {
        let mut model = TimeModel::new(48000, 1024);
        let before = model.clone_state();
        model.adjust_delay_and_attack();
        assert_eq!(before, model.clone_state());
    }

    #[test]
    fn segmentation_parses_numerator_over_denominator() {
        let mut model = TimeModel::new(48000, 1024);
        model.set_segmentation("3/4");
        assert!((model.delay_factor() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn invalid_segmentation_leaves_factor_unchanged() {
        let mut model = TimeModel::new(48000, 1024);
        let before = model.delay_factor();
        model.set_segmentation("not-a-fraction");
        assert_eq!(model.delay_factor(), before);
    }

    #[test]
    fn note_256th_delay_is_absolute_delay_over_sixteen() {
        let model = TimeModel::new(48000, 1024);
        assert!((model.note_256th_delay() - model.absolute_delay() / 16.0).abs() < 1e-12);
    }

    impl TimeModel {
        fn clone_state(&self) -> (Vec<f64>, Vec<u32>, f64) {
            (self.delay.to_vec(), self.attack.to_vec(), self.note_256th_delay)
        }
    }
}
