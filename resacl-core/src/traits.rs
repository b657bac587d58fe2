//! Core trait definitions

use crate::error::ResaclResult;
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashSet;

/// Lookups the ACL layer needs from the host system that owns users,
/// organizations, packages and resources.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Whether a resource with this id exists
    async fn resource_exists(&self, resource_id: &str) -> ResaclResult<bool> {
        Ok(self.get_resource(resource_id).await?.is_some())
    }

    async fn get_resource(&self, resource_id: &str) -> ResaclResult<Option<ResourceInfo>>;

    async fn get_package(&self, package_id: &str) -> ResaclResult<Option<PackageInfo>>;

    /// Look up a user by id or name
    async fn get_user(&self, identifier: &str) -> ResaclResult<Option<UserInfo>>;

    /// Look up an organization by id or name
    async fn get_organization(&self, identifier: &str) -> ResaclResult<Option<OrganizationInfo>>;

    /// Ids of the organizations the user is a direct member of
    async fn get_user_org_ids(&self, user: &UserInfo) -> ResaclResult<HashSet<String>>;

    /// Baseline visibility of a package's resources when no ACL applies
    async fn default_resource_visibility(
        &self,
        package: &PackageInfo,
        user: Option<&UserInfo>,
    ) -> ResaclResult<bool>;

    /// Host rule for editing a resource; ACL management is gated on it
    async fn can_update_resource(&self, user: &UserInfo, resource_id: &str)
        -> ResaclResult<bool>;
}
