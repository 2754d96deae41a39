//! ticksim console protocol
//!
//! This crate defines the line-based text commands an operator types into the
//! simulator console and turns them into typed [`Command`] values.
//!
//! # Command Overview
//!
//! | Command | Arguments |
//! |---|---|
//! | `send` | `<from_id> <to_id> <message>` |
//! | `show`, `crash`, `restart`, `clear`, `status` | `<node_id>` |
//! | `exit` | none |
//!
//! # Example
//!
//! ```rust
//! use ticksim_cli_protocol::Command;
//! use ticksim_common::NodeId;
//!
//! let cmd = Command::parse("crash 1", 3).unwrap();
//! assert_eq!(cmd, Command::Crash { node: NodeId(1) });
//! ```

mod commands;
mod error;

pub use commands::*;
pub use error::*;
