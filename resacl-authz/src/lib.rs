//! Resource ACL authorization
//!
//! Effective-permission resolution over stored ACL entries, the capability
//! gate in front of ACL management, and the named action surface.

pub mod actions;
pub mod gate;
pub mod labels;
pub mod resolver;
pub mod service;

pub use actions::{Action, ActionRegistry};
pub use gate::{AclAction, AuthorizationGate};
pub use labels::{acl_label, baseline_dataset_labels, dataset_labels, PermissionLabels};
pub use resolver::{combine, AclResolver, EffectivePermission, GrantSource};
pub use service::{AclService, PrincipalName, ResourceGrant};
