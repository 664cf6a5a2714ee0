//! Device-independent core of a multi-track sequencer's real-time audio
//! I/O engine: the soundcard contract, the multi-generation ring buffer,
//! the tick/attack scheduler, and the per-port automation container.
//!
//! Backend-specific device I/O (the adapters that actually talk to JACK,
//! WASAPI, or a pull-model host API) lives in the sibling `audio-backend`
//! crate, which depends on this one for the [`soundcard::Soundcard`]
//! trait and shared types.

pub mod automation;
pub mod config;
pub mod error;
pub mod format;
pub mod registry;
pub mod ring_buffer;
pub mod scheduler;
pub mod soundcard;
pub mod task;
pub mod time_model;
pub mod timestamp;
pub mod value;

pub use automation::{Acceleration, Automation};
pub use error::{Result, SoundcardError};
pub use format::{Capability, DeviceId, SampleFormat};
pub use ring_buffer::{RingBuffer, RingBufferLock};
pub use scheduler::{Scheduler, TicOutcome};
pub use soundcard::{
    new_soundcard_cell, PcmInfo, PublishedOffset, Soundcard, SoundcardCell, SoundcardGuard, SoundcardShared,
    SoundcardState,
};
pub use task::{Task, TaskLauncher, TaskSender};
pub use time_model::{TimeModel, PERIOD};
pub use timestamp::Timestamp;
pub use value::{PortValue, PortValueType};
