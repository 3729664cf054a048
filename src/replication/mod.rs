//! Keeps store replicas identical by replaying one ordered command log.
//!
//! The generation side executes commands through a [`CommandPublisher`],
//! which logs each successful command and sends it down a channel to every
//! subscribed replica. Replicas apply the commands in order with [`apply`].

mod command;
mod command_log;
mod publisher;
mod script;

pub use command::{ReplayError, StoreCommand, apply, replay};
pub use command_log::{CommandLog, LoggedCommand};
pub use publisher::CommandPublisher;
pub use script::{CommandScript, CommandScriptError, ScriptStep};
