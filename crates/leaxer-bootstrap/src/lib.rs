//! Composition root and smoke-test CLI for the Leaxer execution
//! substrate (§2.1). The only crate allowed to construct concrete
//! adapters; everything else in the workspace depends on the port
//! traits `leaxer-core` defines.

pub mod commands;
pub mod config;
pub mod handlers;
pub mod parser;
pub mod wiring;

pub use commands::Commands;
pub use config::BootstrapConfig;
pub use parser::Cli;
pub use wiring::{AppContext, bootstrap};
