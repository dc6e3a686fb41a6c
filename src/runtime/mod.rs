//! Runtime object model.
//!
//! A [`Context`] owns images, filters and command queues and is the entry
//! point of every operation on them.

pub mod context;
pub mod filter;
pub mod image;
pub mod queue;

pub use context::{check_api_version, Context, ContextOptions, SubmitCallback};
pub use filter::Filter;
pub use image::{Image, MappedImage};
pub use queue::{Attachment, CommandQueue, QueueState};
