//! Three concrete backend adapters over the soundcard contract:
//! [`push_daemon::PushDaemonAdapter`] (condvar handshake, JACK-like
//! servers), [`polled_device::PolledDeviceAdapter`] (soft-real-time
//! polling loop), and [`pull_host::PullHostAdapter`] (OS callback APIs,
//! cpal-backed). All three compose `soundcard_core::SoundcardShared`
//! rather than inheriting from it.

mod core;
pub mod mock;
pub mod polled_device;
pub mod pull_host;
pub mod push_daemon;

pub use mock::MockAdapter;
pub use polled_device::PolledDeviceAdapter;
pub use pull_host::PullHostAdapter;
pub use push_daemon::PushDaemonAdapter;
