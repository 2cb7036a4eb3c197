//! Test helpers and utilities for integration tests

use envsensor::debug::{BufferSink, DebugStream};
use envsensor::device::{ConnectivityManager, ReconnectPolicy, SessionOptions};
use envsensor::protocol::{build_identity, DeviceDescriptor};
use envsensor::testing::mocks::{MockProvisioning, ScriptedBroker};
use std::time::Duration;

/// Chip id used by every fixture
#[allow(dead_code)]
pub const TEST_CHIP_ID: u32 = 0x00AB_CDEF;

#[allow(dead_code)]
pub type TestManager = ConnectivityManager<ScriptedBroker, MockProvisioning>;

/// Reconnect policy with the production attempt count and no delay
#[allow(dead_code)]
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: 10,
        retry_delay: Duration::ZERO,
    }
}

/// Build a manager around the given broker and provisioning doubles
#[allow(dead_code)]
pub fn test_manager(broker: ScriptedBroker, provisioning: MockProvisioning) -> TestManager {
    let identity = build_identity(TEST_CHIP_ID);
    let device = DeviceDescriptor::new(&identity, "AHT10", "2022.06.14");
    ConnectivityManager::new(
        broker,
        provisioning,
        identity,
        device,
        SessionOptions::default(),
        fast_policy(),
    )
}

/// Manager whose provisioning points at a broker
#[allow(dead_code)]
pub fn configured_manager(broker: ScriptedBroker) -> TestManager {
    test_manager(broker, MockProvisioning::configured("broker.local"))
}

/// Debug stream writing into an inspectable buffer
#[allow(dead_code)]
pub fn buffered_debug() -> (DebugStream, BufferSink) {
    let buffer = BufferSink::unbounded();
    let stream = DebugStream::with_sink(Box::new(buffer.clone()));
    (stream, buffer)
}
