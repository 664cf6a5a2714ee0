//! Sample formats, capability bits, and device identifier strings.
//!
//! These are the wire-compatible primitives: the sample format codes must
//! be preserved exactly, the capability bits are a small fixed set, and the
//! device identifier grammar is shared with the backend adapters.

use crate::error::{Result, SoundcardError};

/// PCM sample container format. `S24` carries a 32-bit physical container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    S8,
    S16,
    S24,
    S32,
    S64,
    F32,
    F64,
    Complex,
}

impl SampleFormat {
    /// Physical container size in bytes. `S24` is 4 bytes, not 3.
    pub fn word_size(self) -> usize {
        match self {
            SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 4,
            SampleFormat::S32 => 4,
            SampleFormat::S64 => 8,
            SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
            SampleFormat::Complex => 16,
        }
    }
}

bitflags::bitflags! {
    /// Capability bits advertised by `get_capability`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capability: u8 {
        const PLAYBACK = 1;
        const CAPTURE = 2;
        const DUPLEX = 4;
    }
}

/// A validated `"ags-<backend>-devin-<N>"` device identifier.
///
/// Setting a device name that doesn't start with the expected prefix is an
/// error and leaves the device unchanged (see `Soundcard::set_device_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    backend: String,
    index: u32,
}

impl DeviceId {
    pub fn new(backend: impl Into<String>, index: u32) -> Self {
        Self { backend: backend.into(), index }
    }

    /// Parse `"ags-<backend>-devin-<N>"`. Any other shape is
    /// `SoundcardError::OutOfRange`.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("ags-")
            .ok_or_else(|| SoundcardError::OutOfRange(format!("device id `{s}` missing ags- prefix")))?;

        let (backend, index_str) = rest
            .rsplit_once("-devin-")
            .ok_or_else(|| SoundcardError::OutOfRange(format!("device id `{s}` missing -devin-<N> suffix")))?;

        let index: u32 = index_str
            .parse()
            .map_err(|_| SoundcardError::OutOfRange(format!("device id `{s}` has a non-numeric index")))?;

        Ok(Self { backend: backend.to_string(), index })
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ags-{}-devin-{}", self.backend, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_size_s24_is_four_bytes() {
        assert_eq!(SampleFormat::S24.word_size(), 4);
    }

    #[test]
    fn device_id_round_trips() {
        let id = DeviceId::parse("ags-jack-devin-3").unwrap();
        assert_eq!(id.backend(), "jack");
        assert_eq!(id.index(), 3);
        assert_eq!(id.to_string(), "ags-jack-devin-3");
    }

    #[test]
    fn device_id_rejects_bad_prefix() {
        assert!(DeviceId::parse("pulse-devin-0").is_err());
    }

    #[test]
    fn capability_bits_combine() {
        let duplex = Capability::PLAYBACK | Capability::CAPTURE;
        assert!(duplex.contains(Capability::PLAYBACK));
        assert!(duplex.contains(Capability::CAPTURE));
        assert!(!duplex.contains(Capability::DUPLEX));
    }
}
