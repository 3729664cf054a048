//! Import specifier resolution across the root alias, absolute, relative and
//! package addressing schemes.

mod package;
#[allow(clippy::module_inception)]
mod resolver;

pub use package::ExternalPackage;
pub use resolver::{Resolution, ResolveError, Resolver};
