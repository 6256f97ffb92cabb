//! Command handlers: thin glue between parsed CLI arguments and
//! `AppContext`, following `gglib_cli::handlers`'s one-module-per-command
//! layout.

pub mod cancel;
pub mod clear_pending;
pub mod enqueue;
pub mod paths;
pub mod serve;
pub mod status;
