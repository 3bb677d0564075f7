//! # ROCCC driver core
//!
//! Building blocks shared by every `roccc` subcommand: parsing the small
//! directive files that select optional passes, instantiating command
//! templates, and running external tools one after another with their
//! outcomes mapped onto process exit codes.
pub mod config;
pub mod directives;
pub mod env;
pub mod error;
pub mod exec;
pub mod fs;
pub mod job;
pub mod lock;
pub mod lowering;
pub mod regress;
pub mod script;
pub mod session;
pub mod template;
pub mod uninterrupt;

pub use error::{Error, Result};
pub use exec::{Invocation, Outcome, Sequencer, Stage};
pub use session::Session;
