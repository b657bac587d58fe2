//! resacl core - shared data structures and trait definitions
//!
//! Types, errors, configuration and logging used by the ACL store, the
//! resolver and the command-line tool, plus the [`HostDirectory`] seam
//! through which the host system is consulted.

pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use directory::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
