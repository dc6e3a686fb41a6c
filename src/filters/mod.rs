//! Filter module.
//!
//! Contains the filter type enumeration, the catalog and the built-in host
//! kernels.

pub mod kind;
pub mod catalog;
pub mod builtin;

pub use kind::{Category, FilterType};
pub use catalog::{CatalogEntry, FilterCatalog, KernelFactory};
