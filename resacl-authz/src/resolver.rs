//! ACL Resolver
//!
//! Combines a user's direct grant with the grants inherited from their
//! organizations into one effective permission.
//!
//! A direct grant always decides when present, so a direct `none` suppresses
//! an inherited `read`. Nothing suppresses in the other direction: a direct
//! `read` is never weakened by an organization `none`. When several direct
//! entries exist for the same user and resource, the most recently created
//! one wins (ties go to the later insertion, which is the store's order).

use resacl_core::{AclEntry, AuthType, HostDirectory, Permission, ResaclResult, UserInfo};
use resacl_store::AclStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Where an effective permission came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantSource {
    Direct { entry_id: String },
    Inherited { entry_id: String, org_id: String },
}

/// Outcome of resolving a user's permission on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub permission: Permission,
    pub source: GrantSource,
    /// A direct `none` hid an inherited `read`
    pub suppressed_inherited: bool,
}

impl EffectivePermission {
    pub fn allows(&self, required: Permission) -> bool {
        self.permission.allows(required)
    }
}

/// Combine one resource's entries for a user.
///
/// `entries` must be in store order (oldest first). Returns `None` when no
/// entry names the user or one of their organizations.
pub fn combine(
    entries: &[AclEntry],
    user_id: &str,
    org_ids: &HashSet<String>,
) -> Option<EffectivePermission> {
    let direct = entries
        .iter()
        .filter(|e| e.is_for(AuthType::User, user_id))
        .last();

    let org_entries: Vec<&AclEntry> = entries
        .iter()
        .filter(|e| e.auth_type == AuthType::Org && org_ids.contains(&e.auth_id))
        .collect();
    let inherited = org_entries
        .iter()
        .find(|e| e.permission == Permission::Read)
        .or_else(|| org_entries.first())
        .copied();

    match (direct, inherited) {
        (Some(direct), inherited) => Some(EffectivePermission {
            permission: direct.permission,
            source: GrantSource::Direct {
                entry_id: direct.id.clone(),
            },
            suppressed_inherited: direct.permission == Permission::None
                && inherited.map_or(false, |e| e.permission == Permission::Read),
        }),
        (None, Some(inherited)) => Some(EffectivePermission {
            permission: inherited.permission,
            source: GrantSource::Inherited {
                entry_id: inherited.id.clone(),
                org_id: inherited.auth_id.clone(),
            },
            suppressed_inherited: false,
        }),
        (None, None) => None,
    }
}

#[derive(Clone)]
pub struct AclResolver {
    store: AclStore,
}

impl AclResolver {
    pub fn new(store: AclStore) -> Self {
        Self { store }
    }

    fn directory(&self) -> &dyn HostDirectory {
        self.store.directory().as_ref()
    }

    /// Resolve by user id or name; unknown users have no ACL record
    pub async fn resolve(
        &self,
        resource_id: &str,
        user: &str,
    ) -> ResaclResult<Option<EffectivePermission>> {
        match self.directory().get_user(user).await? {
            Some(user) => self.resolve_for(resource_id, &user).await,
            None => {
                debug!(user, "Unknown user has no ACL record");
                Ok(None)
            }
        }
    }

    pub async fn resolve_for(
        &self,
        resource_id: &str,
        user: &UserInfo,
    ) -> ResaclResult<Option<EffectivePermission>> {
        let org_ids = self.directory().get_user_org_ids(user).await?;
        let entries = self.store.entries_for_resource(resource_id).await?;
        let resolved = combine(&entries, &user.id, &org_ids);

        debug!(
            resource_id,
            user_id = %user.id,
            permission = ?resolved.as_ref().map(|r| r.permission),
            "Resolved ACL permission"
        );
        Ok(resolved)
    }

    /// Whether the user's ACL grants at least `required`; false when no record exists
    pub async fn has_permission(
        &self,
        resource_id: &str,
        user: &UserInfo,
        required: Permission,
    ) -> ResaclResult<bool> {
        Ok(self
            .resolve_for(resource_id, user)
            .await?
            .map_or(false, |p| p.allows(required)))
    }

    /// Every resource the user can read through a direct or inherited grant
    pub async fn readable_resources(
        &self,
        user: &UserInfo,
    ) -> ResaclResult<Vec<(String, EffectivePermission)>> {
        let org_ids = self.directory().get_user_org_ids(user).await?;
        let org_list: Vec<String> = org_ids.iter().cloned().collect();
        let entries = self.store.entries_for_principals(&user.id, &org_list).await?;

        let mut by_resource: BTreeMap<String, Vec<AclEntry>> = BTreeMap::new();
        for entry in entries {
            by_resource
                .entry(entry.resource_id.clone())
                .or_default()
                .push(entry);
        }

        Ok(by_resource
            .into_iter()
            .filter_map(|(resource_id, entries)| {
                combine(&entries, &user.id, &org_ids)
                    .filter(|p| p.allows(Permission::Read))
                    .map(|p| (resource_id, p))
            })
            .collect())
    }
}
