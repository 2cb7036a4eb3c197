//! Device core: timers, the connectivity lifecycle, the sampling schedule
//! and the main loop that ties them together

pub mod driver;
pub mod events;
pub mod lifecycle;
pub mod scheduler;
pub mod timer;

pub use driver::{Device, DeviceTiming, TickReport};
pub use events::{EventLog, LifecycleEvent, LifecycleListener, UpdateError};
pub use lifecycle::{
    BrokerConnectionState, ConnectivityManager, LifecycleError, ReconnectOutcome,
    ReconnectPolicy, RetryBudget, SessionOptions, publish_payload_limit,
};
pub use scheduler::{SampleOutcome, SampleScheduler};
pub use timer::IntervalTimer;
