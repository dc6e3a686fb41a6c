//! Execution layer.
//!
//! Devices, the in-order job engine, completion timelines and the prepared
//! program cache.

pub mod device;
pub mod engine;
pub mod cache;
pub mod timeline;

pub use device::{describe, device_count, Device, DeviceDescription, HostDevice};
pub use engine::{ImageBinding, Job, Step, Storage};
pub use cache::{CacheStats, ProgramCache, ProgramManifest};
pub use timeline::{JobReport, Submission, Timeline};
