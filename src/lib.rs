#![allow(clippy::enum_variant_names)]

pub mod application;
pub mod cli;
pub mod config;
pub mod preview;
pub mod registry;
pub mod replication;
pub mod resolver;
pub mod store;
pub mod transformer;
