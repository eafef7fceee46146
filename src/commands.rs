//! HTTP command handlers
//!
//! Each command module is its own file in the commands/ directory;
//! handlers are re-exported here for the router.

pub mod resync_commands;

pub use resync_commands::*;
