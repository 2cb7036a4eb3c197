//! Testing utilities and mock implementations
//!
//! Mock collaborators for exercising the device lifecycle without a broker,
//! a sensor or a network.

pub mod mocks;

pub use mocks::*;
