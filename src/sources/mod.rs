//! Configuration source implementations.

mod config_source;
mod memory;
mod polling;

#[cfg(feature = "remote")]
mod runtimeconfig;

pub use config_source::{Change, ConfigSource, Session, VariableId};
pub use memory::MemorySource;
pub use polling::{PollingSession, PollingSource};

#[cfg(feature = "remote")]
pub use runtimeconfig::{DEFAULT_ENDPOINT, RuntimeConfigSource, RuntimeConfigSourceBuilder};
