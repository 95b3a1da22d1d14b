// SPDX-License-Identifier: GPL-3.0-or-later

mod composite;
mod field;
mod registry;

pub use composite::CompositeClock;
pub use field::{BitField, ClkLock};
pub use registry::{ClkFramework, ClkHandle, Registry, SimpleProvider};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClkError {
    #[error("Out of memory while building a clock name")]
    Allocation,

    #[error("{name}: Could not map the clock registers: {reason}")]
    Map { name: String, reason: String },

    #[error("{name}: Couldn't register the clock: {reason}")]
    Registration { name: String, reason: String },

    #[error("Value {value} does not fit in a {width}-bit field")]
    OutOfRange { value: u32, width: u32 },

    #[error("{name}: Clock has no gate and cannot be disabled")]
    NoGate { name: String },

    #[error("Invalid field geometry shift={shift} width={width}")]
    InvalidField { shift: u32, width: u32 },

    #[error("Clock {0} not found")]
    NotFound(String),
}

pub type Result<T, E = ClkError> = std::result::Result<T, E>;
