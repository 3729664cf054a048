//! Resource handles and import maps for the preview sandbox.

mod handle;
mod import_map;
#[allow(clippy::module_inception)]
mod registry;

pub use handle::ResourceHandle;
pub use import_map::{ImportMap, ResourceRef};
pub use registry::{ModuleRegistry, RegistryError};
