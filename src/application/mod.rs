#[allow(clippy::module_inception)]
mod application;
pub mod data;
mod report;
mod runtime_config;

pub use application::{Application, ApplicationError, SessionOutcome};
pub use report::render_status;
pub use runtime_config::RuntimeConfig;
