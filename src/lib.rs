//! # Filterworks - Image Filter Execution Engine
//!
//! Filterworks runs ordered pipelines of image filters on a selectable compute
//! backend. A host application creates images and filters inside a
//! [`Context`](runtime::Context), binds parameters, attaches filters to a
//! command queue and submits the queue as one unit.
//!
//! ## Features
//!
//! - **Handle-based objects**: images, filters and queues live in the context
//!   and are addressed by typed ids
//! - **Typed parameters**: every value is checked against the filter's schema
//! - **Asynchronous dispatch**: execute returns after submission, synchronize
//!   waits for completion
//! - **Info queries**: one size-probe then fill convention for every object
//! - **Program cache**: prepared kernels are reused and their manifests kept
//!   on disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filterworks::prelude::*;
//!
//! # fn main() -> FilterResult<()> {
//! let mut ctx = Context::new(filterworks::API_VERSION, BackendApi::OpenCl, 0, None)?;
//!
//! let desc = ImageDescriptor::new(800, 600, 3, ComponentType::Uint8);
//! let pixels = vec![128u8; desc.storage_size()];
//! let input = ctx.create_image(&desc, Some(&pixels))?;
//! let output = ctx.create_image(&desc, None)?;
//!
//! let blur = ctx.create_filter(FilterType::GaussianBlur)?;
//! ctx.set_parameter_1u(blur, "radius", 3)?;
//! ctx.set_parameter_1f(blur, "sigma", 2.0)?;
//!
//! let queue = ctx.create_command_queue();
//! ctx.attach(queue, blur, input, output, None)?;
//! ctx.execute(queue, None, None)?;
//! ctx.synchronize(queue)?;
//!
//! let mapping = ctx.map_image(output, MapAccess::Read)?;
//! println!("first pixel: {:?}", &mapping.as_slice()[..3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: handles, status codes, descriptors, parameter values, the info
//!   encoding and the kernel trait
//! - [`filters`]: filter types, the catalog and the host kernels
//! - [`execution`]: devices, the job engine, timelines and the program cache
//! - [`runtime`]: the context and the objects it owns
//! - [`config`] and [`logging`]: ambient setup

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod execution;
pub mod filters;
pub mod logging;
pub mod runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use filterworks::prelude::*;
/// ```
pub mod prelude {
    // Handles and errors
    pub use crate::core::error::{FilterError, FilterResult, Status};
    pub use crate::core::handle::{FilterId, ImageId, Object, QueueId};

    // Descriptors and values
    pub use crate::core::types::{
        BackendApi, ComponentType, ComputeType, ImageDescriptor, MapAccess, ParameterType,
        ParameterValue, PerformanceStatistic, Rect,
    };

    // Kernels
    pub use crate::core::kernel::{FilterMetadata, Kernel};
    pub use crate::core::parameter::{Constraint, ParameterDefinition};

    // Filters
    pub use crate::filters::catalog::FilterCatalog;
    pub use crate::filters::kind::{Category, FilterType};

    // Runtime
    pub use crate::execution::timeline::{JobReport, Submission};
    pub use crate::runtime::{Context, ContextOptions, MappedImage, QueueState};

    // Setup
    pub use crate::config::EngineConfig;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

pub const API_VERSION_MAJOR: u64 = 1;
pub const API_VERSION_MINOR: u64 = 6;
pub const API_VERSION_REVISION: u64 = 1;
pub const API_VERSION_BUILD: u64 = 0;

/// Pack an API version as `major.minor.revision.build` into 8/8/16/32 bits.
pub const fn make_api_version(major: u64, minor: u64, revision: u64, build: u64) -> u64 {
    ((major & 0xff) << 56)
        | ((minor & 0xff) << 48)
        | ((revision & 0xffff) << 32)
        | (build & 0xffff_ffff)
}

/// API version this library implements; pass it to [`runtime::Context::new`].
pub const API_VERSION: u64 = make_api_version(
    API_VERSION_MAJOR,
    API_VERSION_MINOR,
    API_VERSION_REVISION,
    API_VERSION_BUILD,
);

/// Dotted form of [`API_VERSION`].
pub const API_VERSION_STRING: &str = "1.6.1.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "filterworks");
        assert!(semver::Version::parse(VERSION).is_ok());
    }

    #[test]
    fn test_api_version_packing() {
        assert_eq!(API_VERSION, 0x0106_0001_0000_0000);
        assert_eq!(API_VERSION >> 56, API_VERSION_MAJOR);
        assert_eq!(
            API_VERSION_STRING,
            format!(
                "{}.{}.{}.{}",
                API_VERSION_MAJOR, API_VERSION_MINOR, API_VERSION_REVISION, API_VERSION_BUILD
            )
        );
    }

    #[test]
    fn test_prelude_builds_a_pipeline() {
        use crate::prelude::*;

        let mut ctx = Context::new(API_VERSION, BackendApi::Metal, 0, None).unwrap();
        let desc = ImageDescriptor::new(16, 16, 4, ComponentType::Float32);
        let input = ctx.create_image(&desc, None).unwrap();
        let output = ctx.create_image(&desc, None).unwrap();
        let filter = ctx.create_filter(FilterType::FlipHorizontal).unwrap();
        let queue = ctx.create_command_queue();
        ctx.attach(queue, filter, input, output, None).unwrap();
        ctx.execute(queue, None, None).unwrap().wait().unwrap();
        assert_eq!(ctx.get_queue(queue).unwrap().state(), QueueState::Submitted);
        ctx.synchronize(queue).unwrap();
        assert_eq!(ctx.get_queue(queue).unwrap().state(), QueueState::Synchronized);
    }
}
