//! Environment and CPU sensor adapters.
//!
//! These are the opaque synchronous collaborators of the HTTP layer: each
//! call stands alone, never raises past its boundary, and reports
//! unavailability as a value rather than an error.

pub mod climate;
pub mod cpu;

// Re-export commonly used items
pub use climate::{ClimateProbe, NullProbe, SensorReading};
pub use cpu::{read_cpu_clock, read_cpu_temp, CpuAdapters};

#[cfg(feature = "gpio")]
pub use climate::Dht22Probe;
