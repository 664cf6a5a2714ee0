//! Error taxonomy shared by the soundcard contract and every backend adapter.
//!
//! Mirrors the failure kinds a real device-facing soundcard implementation
//! distinguishes: lock/availability failures, format negotiation failures,
//! partially-initialized sessions, and transient per-block hiccups.

/// Errors surfaced by the soundcard contract, the scheduler, and the
/// automation container.
#[derive(Debug, thiserror::Error)]
pub enum SoundcardError {
    /// Another thread/process holds the device exclusively, or the host API
    /// refused to open/activate it. Returned from `record_init`/`play_init`.
    #[error("soundcard is locked by another session: {0}")]
    LockedSoundcard(String),

    /// The requested preset is incompatible with the host, or an internal
    /// word-size switch hit an unhandled format.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The host accepted a format then failed to initialize; any partially
    /// acquired resources must be released before this is returned.
    #[error("broken configuration: {0}")]
    BrokenConfiguration(String),

    /// A transient host error occurred mid-block (e.g. the device was
    /// unplugged). Logged and surfaced; the adapter does not reinitialize
    /// automatically.
    #[error("device invalidated: {0}")]
    DeviceInvalidated(String),

    /// The backing service (daemon, driver) is not running.
    #[error("service not running: {0}")]
    ServiceNotRunning(String),

    /// Clipboard XML failed the version/program check, or a point's x/y
    /// could not be parsed. The offending node is skipped; this is not
    /// necessarily fatal to the surrounding operation.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A preset value fell outside its published bounds; the setter made
    /// no change.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

pub type Result<T> = std::result::Result<T, SoundcardError>;
