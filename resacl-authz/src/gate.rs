//! Authorization gate
//!
//! Capability checks in front of ACL management, and the resource
//! visibility rule that layers ACL grants over the host's default
//! package visibility.

use crate::resolver::AclResolver;
use resacl_core::{
    not_authorized_error, not_found_error, CallerContext, HostDirectory, Permission, ResaclResult,
    ResourceInfo, UserInfo,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// ACL management operations guarded by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    List,
    Show,
    Create,
    Update,
    Patch,
    Delete,
}

impl AclAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclAction::List => "list",
            AclAction::Show => "show",
            AclAction::Create => "create",
            AclAction::Update => "update",
            AclAction::Patch => "patch",
            AclAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for AclAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: AclResolver,
    directory: Arc<dyn HostDirectory>,
}

impl AuthorizationGate {
    pub fn new(resolver: AclResolver, directory: Arc<dyn HostDirectory>) -> Self {
        Self {
            resolver,
            directory,
        }
    }

    pub fn resolver(&self) -> &AclResolver {
        &self.resolver
    }

    /// Check that the caller may perform `action` on the ACL of `resource_id`.
    ///
    /// Every action requires the capability to update the resource. Without a
    /// resource (listing every entry) only sysadmins pass. `ignore_auth`
    /// callers skip all checks.
    pub async fn check_access(
        &self,
        action: AclAction,
        ctx: &CallerContext,
        resource_id: Option<&str>,
    ) -> ResaclResult<()> {
        if ctx.ignore_auth {
            debug!(action = %action, "Authorization skipped for site context");
            return Ok(());
        }

        let user = self.acting_user(ctx).await?;

        let Some(resource_id) = resource_id else {
            return match &user {
                Some(u) if u.sysadmin => Ok(()),
                _ => {
                    let name = user.as_ref().map_or("anonymous", |u| u.name.as_str());
                    warn!(user = name, action = %action, "Unscoped ACL access denied");
                    Err(not_authorized_error!(
                        format!("User {} not authorized to {} resource acls", name, action),
                        "authorization_gate"
                    ))
                }
            };
        };

        if !self.directory.resource_exists(resource_id).await? {
            return Err(not_found_error!(
                format!("resource <{}>", resource_id),
                "authorization_gate"
            ));
        }

        let allowed = match &user {
            Some(user) => self.directory.can_update_resource(user, resource_id).await?,
            None => false,
        };

        if !allowed {
            let name = user.as_ref().map_or("anonymous", |u| u.name.as_str());
            warn!(user = name, action = %action, resource_id, "ACL access denied");
            return Err(not_authorized_error!(
                format!(
                    "User {} not authorized to {} resource acl of {}",
                    name, action, resource_id
                ),
                "authorization_gate"
            ));
        }

        Ok(())
    }

    /// Whether `user` (id or name, `None` for anonymous) may view the resource.
    ///
    /// An ACL record for the user decides outright. Otherwise public packages
    /// are visible, members of a private package's owner organization see it,
    /// and everyone else falls back to the host's default rule.
    pub async fn can_view(&self, resource_id: &str, user: Option<&str>) -> ResaclResult<bool> {
        let resource = self.directory.get_resource(resource_id).await?.ok_or_else(|| {
            not_found_error!(format!("resource <{}>", resource_id), "authorization_gate")
        })?;

        let user = match user {
            Some(identifier) => self.directory.get_user(identifier).await?,
            None => None,
        };

        self.can_view_resource(&resource, user.as_ref()).await
    }

    /// Visibility for already loaded resource and user records
    pub async fn can_view_resource(
        &self,
        resource: &ResourceInfo,
        user: Option<&UserInfo>,
    ) -> ResaclResult<bool> {
        if let Some(user) = user {
            if let Some(effective) = self.resolver.resolve_for(&resource.id, user).await? {
                debug!(
                    resource_id = %resource.id,
                    user_id = %user.id,
                    permission = %effective.permission,
                    "Visibility decided by ACL"
                );
                return Ok(effective.allows(Permission::Read));
            }
        }

        let package = self
            .directory
            .get_package(&resource.package_id)
            .await?
            .ok_or_else(|| {
                not_found_error!(
                    format!("package <{}>", resource.package_id),
                    "authorization_gate"
                )
            })?;

        if !package.private {
            return Ok(true);
        }

        if let (Some(user), Some(owner_org)) = (user, package.owner_org.as_deref()) {
            if self.directory.get_user_org_ids(user).await?.contains(owner_org) {
                return Ok(true);
            }
        }

        self.directory
            .default_resource_visibility(&package, user)
            .await
    }

    /// Keep only the resources `user` may view, preserving order
    pub async fn filter_visible_resources(
        &self,
        resources: Vec<ResourceInfo>,
        user: Option<&str>,
    ) -> ResaclResult<Vec<ResourceInfo>> {
        let user = match user {
            Some(identifier) => self.directory.get_user(identifier).await?,
            None => None,
        };

        let mut visible = Vec::with_capacity(resources.len());
        for resource in resources {
            if self.can_view_resource(&resource, user.as_ref()).await? {
                visible.push(resource);
            }
        }
        Ok(visible)
    }

    async fn acting_user(&self, ctx: &CallerContext) -> ResaclResult<Option<UserInfo>> {
        match ctx.user.as_deref() {
            Some(identifier) if !identifier.is_empty() => {
                self.directory.get_user(identifier).await
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resacl_core::{Capacity, ResaclError, StaticDirectory};
    use resacl_store::{AclInput, AclStore, MemoryAclStorage};

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_user("u-root", "root", true)
            .with_user("u-editor", "editor", false)
            .with_user("u-member", "member", false)
            .with_user("u-outsider", "outsider", false)
            .with_organization("o-lab", "lab")
            .with_member("o-lab", "u-editor", Capacity::Editor)
            .with_member("o-lab", "u-member", Capacity::Member)
            .with_package("p-private", true, Some("o-lab"))
            .with_package("p-public", false, Some("o-lab"))
            .with_resource("r-private", "p-private")
            .with_resource("r-public", "p-public")
    }

    fn gate() -> (AuthorizationGate, AclStore) {
        let directory: Arc<dyn HostDirectory> = Arc::new(directory());
        let store = AclStore::new(Arc::new(MemoryAclStorage::new()), directory.clone());
        let gate = AuthorizationGate::new(AclResolver::new(store.clone()), directory);
        (gate, store)
    }

    #[tokio::test]
    async fn test_site_context_bypasses_checks() {
        let (gate, _) = gate();
        let ctx = CallerContext::site("site_user");
        gate.check_access(AclAction::List, &ctx, None).await.unwrap();
        gate.check_access(AclAction::Delete, &ctx, Some("r-private"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_management_requires_update_capability() {
        let (gate, _) = gate();

        gate.check_access(AclAction::Create, &CallerContext::user("editor"), Some("r-private"))
            .await
            .unwrap();

        let denied = gate
            .check_access(AclAction::Create, &CallerContext::user("member"), Some("r-private"))
            .await;
        assert!(matches!(denied, Err(ResaclError::NotAuthorized { .. })));

        let anonymous = gate
            .check_access(AclAction::Show, &CallerContext::anonymous(), Some("r-public"))
            .await;
        assert!(matches!(anonymous, Err(ResaclError::NotAuthorized { .. })));
    }

    #[tokio::test]
    async fn test_unscoped_listing_is_sysadmin_only() {
        let (gate, _) = gate();
        gate.check_access(AclAction::List, &CallerContext::user("root"), None)
            .await
            .unwrap();
        let denied = gate
            .check_access(AclAction::List, &CallerContext::user("editor"), None)
            .await;
        assert!(matches!(denied, Err(ResaclError::NotAuthorized { .. })));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_not_found() {
        let (gate, _) = gate();
        let result = gate
            .check_access(AclAction::Update, &CallerContext::user("root"), Some("r-404"))
            .await;
        assert!(matches!(result, Err(ResaclError::NotFound { .. })));

        let result = gate.can_view("r-404", Some("member")).await;
        assert!(matches!(result, Err(ResaclError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_visibility_without_acl_follows_package() {
        let (gate, _) = gate();
        assert!(gate.can_view("r-public", None).await.unwrap());
        assert!(!gate.can_view("r-private", None).await.unwrap());
        assert!(gate.can_view("r-private", Some("member")).await.unwrap());
        assert!(!gate.can_view("r-private", Some("outsider")).await.unwrap());
        assert!(gate.can_view("r-private", Some("root")).await.unwrap());
    }

    #[tokio::test]
    async fn test_acl_record_decides_visibility() {
        let (gate, store) = gate();
        store
            .create(&AclInput::new("r-private", "user", "u-outsider", "read"), "")
            .await
            .unwrap();
        store
            .create(&AclInput::new("r-public", "user", "u-member", "none"), "")
            .await
            .unwrap();

        assert!(gate.can_view("r-private", Some("outsider")).await.unwrap());
        assert!(!gate.can_view("r-public", Some("member")).await.unwrap());
        // anonymous callers have no ACL record
        assert!(gate.can_view("r-public", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_filter_visible_resources_keeps_order() {
        let (gate, _) = gate();
        let resources = vec![
            ResourceInfo {
                id: "r-public".to_string(),
                package_id: "p-public".to_string(),
            },
            ResourceInfo {
                id: "r-private".to_string(),
                package_id: "p-private".to_string(),
            },
        ];

        let visible = gate
            .filter_visible_resources(resources.clone(), Some("outsider"))
            .await
            .unwrap();
        assert_eq!(visible, vec![resources[0].clone()]);

        let visible = gate
            .filter_visible_resources(resources.clone(), Some("member"))
            .await
            .unwrap();
        assert_eq!(visible, resources);
    }
}
