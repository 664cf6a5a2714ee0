//! INI-style external configuration for soundcard presets.
//!
//! Keys are grouped into a `[soundcard]`
//! section for backend-specific tuning and a `[generic]` section for the
//! segmentation fraction shared by every instance.

use configparser::ini::Ini;

use crate::format::SampleFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    Exclusive,
    Shared,
}

impl ShareMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "exclusive" => Some(ShareMode::Exclusive),
            "shared" => Some(ShareMode::Shared),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ShareMode::Exclusive => "exclusive",
            ShareMode::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoundcardConfig {
    pub wasapi_buffer_size: u32,
    pub wasapi_share_mode: ShareMode,
    pub segmentation: String,
    pub dsp_channels: u16,
    pub pcm_channels: u16,
    pub samplerate: u32,
    pub buffer_size: u32,
    pub format: SampleFormat,
}

impl Default for SoundcardConfig {
    fn default() -> Self {
        Self {
            wasapi_buffer_size: 1024,
            wasapi_share_mode: ShareMode::Shared,
            segmentation: "4/4".to_string(),
            dsp_channels: 2,
            pcm_channels: 2,
            samplerate: 44100,
            buffer_size: 512,
            format: SampleFormat::S16,
        }
    }
}

impl SoundcardConfig {
    /// Loads from an INI document at `path`. Missing keys fall back to
    /// the default; a missing file or parse failure logs a warning and
    /// yields the default configuration unchanged.
    pub fn load(path: &str) -> Self {
        let mut ini = Ini::new();
        let default = Self::default();

        match ini.load(path) {
            Ok(_) => Self {
                wasapi_buffer_size: ini
                    .get("soundcard", "wasapi-buffer-size")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.wasapi_buffer_size),
                wasapi_share_mode: ini
                    .get("soundcard", "wasapi-share-mode")
                    .and_then(|v| ShareMode::parse(&v))
                    .unwrap_or(default.wasapi_share_mode),
                segmentation: ini
                    .get("generic", "segmentation")
                    .unwrap_or(default.segmentation),
                dsp_channels: ini
                    .get("soundcard", "dsp-channels")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.dsp_channels),
                pcm_channels: ini
                    .get("soundcard", "pcm-channels")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.pcm_channels),
                samplerate: ini
                    .get("soundcard", "samplerate")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.samplerate),
                buffer_size: ini
                    .get("soundcard", "buffer-size")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.buffer_size),
                format: ini
                    .get("soundcard", "format")
                    .and_then(|v| parse_format(&v))
                    .unwrap_or(default.format),
            },
            Err(err) => {
                tracing::warn!(%err, %path, "failed to load soundcard config, using defaults");
                default
            }
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let mut ini = Ini::new();

        ini.set("soundcard", "wasapi-buffer-size", Some(self.wasapi_buffer_size.to_string()));
        ini.set("soundcard", "wasapi-share-mode", Some(self.wasapi_share_mode.as_str().to_string()));
        ini.set("generic", "segmentation", Some(self.segmentation.clone()));
        ini.set("soundcard", "dsp-channels", Some(self.dsp_channels.to_string()));
        ini.set("soundcard", "pcm-channels", Some(self.pcm_channels.to_string()));
        ini.set("soundcard", "samplerate", Some(self.samplerate.to_string()));
        ini.set("soundcard", "buffer-size", Some(self.buffer_size.to_string()));
        ini.set("soundcard", "format", Some(format_name(self.format).to_string()));

        ini.write(path)
    }
}

fn parse_format(s: &str) -> Option<SampleFormat> {
    match s {
        "s8" => Some(SampleFormat::S8),
        "s16" => Some(SampleFormat::S16),
        "s24" => Some(SampleFormat::S24),
        "s32" => Some(SampleFormat::S32),
        "s64" => Some(SampleFormat::S64),
        "float" => Some(SampleFormat::F32),
        "double" => Some(SampleFormat::F64),
        "complex" => Some(SampleFormat::Complex),
        _ => None,
    }
}

fn format_name(format: SampleFormat) -> &'static str {
    match format {
        SampleFormat::S8 => "s8",
        SampleFormat::S16 => "s16",
        SampleFormat::S24 => "s24",
        SampleFormat::S32 => "s32",
        SampleFormat::S64 => "s64",
        SampleFormat::F32 => "float",
        SampleFormat::F64 => "double",
        SampleFormat::Complex => "complex",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = SoundcardConfig::load("/nonexistent/path/does-not-exist.ini");
        assert_eq!(cfg.wasapi_buffer_size, 1024);
        assert_eq!(cfg.wasapi_share_mode, ShareMode::Shared);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("soundcard-core-test-{:?}.ini", std::thread::current().id()));
        let path = path.to_str().unwrap();

        let mut cfg = SoundcardConfig::default();
        cfg.wasapi_buffer_size = 2048;
        cfg.wasapi_share_mode = ShareMode::Exclusive;
        cfg.segmentation = "3/4".to_string();
        cfg.format = SampleFormat::F32;
        cfg.save(path).unwrap();

        let loaded = SoundcardConfig::load(path);
        assert_eq!(loaded.wasapi_buffer_size, 2048);
        assert_eq!(loaded.wasapi_share_mode, ShareMode::Exclusive);
        assert_eq!(loaded.segmentation, "3/4");
        assert_eq!(loaded.format, SampleFormat::F32);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn share_mode_parses_known_strings_only() {
        assert_eq!(ShareMode::parse("exclusive"), Some(ShareMode::Exclusive));
        assert_eq!(ShareMode::parse("shared"), Some(ShareMode::Shared));
        assert_eq!(ShareMode::parse("garbage"), None);
    }
}
