//! Host collaborators of the device core
//!
//! Each collaborator is a trait with a single Linux implementation. Test
//! doubles live in [`crate::testing::mocks`].

pub mod clock;
pub mod network;
pub mod sensor;
pub mod updates;

pub use clock::{MonotonicClock, SystemClock};
pub use network::{LinuxNetwork, NetworkInfo};
pub use sensor::{HwmonSensor, SensorDriver, SensorError};
pub use updates::{DisabledUpdates, UpdateTransport};
