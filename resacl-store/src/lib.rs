//! resacl store - validated persistence for per-resource ACL entries
//!
//! - [`schema`]: closed-set validators and the create/update/patch schemas
//! - [`storage`]: the [`AclStorage`] seam with memory and SQLite backends
//! - [`store`]: [`AclStore`], the validated CRUD surface

pub mod schema;
pub mod storage;
pub mod store;

pub use schema::{AclInput, AclPatch, AclReplacement, NewAcl};
#[cfg(feature = "sqlite")]
pub use storage::SqliteAclStorage;
pub use storage::{AclQuery, AclStorage, MemoryAclStorage};
pub use store::AclStore;
