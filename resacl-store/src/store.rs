//! ACL store
//!
//! Validated create/read/update/patch/delete over an [`AclStorage`] backend.
//! Capability checks are not done here; callers go through the
//! authorization gate first.

use crate::schema::{validate_create, validate_patch, validate_update, AclInput};
use crate::storage::{AclQuery, AclStorage};
use chrono::Utc;
use resacl_core::{
    log_operation_start, log_operation_success, not_found_error, AclEntry, HostDirectory,
    ResaclResult,
};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AclStore {
    storage: Arc<dyn AclStorage>,
    directory: Arc<dyn HostDirectory>,
    max_page_size: Option<u32>,
}

impl AclStore {
    pub fn new(storage: Arc<dyn AclStorage>, directory: Arc<dyn HostDirectory>) -> Self {
        Self {
            storage,
            directory,
            max_page_size: None,
        }
    }

    /// Clamp every `list` page to at most this many entries
    pub fn with_max_page_size(mut self, max_page_size: Option<u32>) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn directory(&self) -> &Arc<dyn HostDirectory> {
        &self.directory
    }

    /// Create the backing table
    pub async fn init(&self) -> ResaclResult<()> {
        self.storage.init().await
    }

    pub async fn create(&self, input: &AclInput, creator: &str) -> ResaclResult<AclEntry> {
        log_operation_start!("acl_create", resource_id = ?input.resource_id);

        let acl = validate_create(input, self.directory.as_ref()).await?;
        let now = Utc::now();
        let entry = AclEntry {
            id: uuid::Uuid::new_v4().to_string(),
            resource_id: acl.resource_id,
            auth_type: acl.auth_type,
            auth_id: acl.auth_id,
            permission: acl.permission,
            created: now,
            last_modified: now,
            creator_user_id: creator.to_string(),
            modifier_user_id: String::new(),
        };

        self.storage.insert(&entry).await?;

        log_operation_success!(
            "acl_create",
            acl_id = %entry.id,
            resource_id = %entry.resource_id,
            auth_type = %entry.auth_type,
            permission = %entry.permission
        );
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> ResaclResult<AclEntry> {
        self.storage
            .fetch(id)
            .await?
            .ok_or_else(|| not_found_error!(format!("acl <{}> was not found.", id), "acl_store"))
    }

    /// List entries; a `limit` of zero means no limit
    pub async fn list(&self, query: &AclQuery) -> ResaclResult<Vec<AclEntry>> {
        let requested = query.limit.filter(|l| *l > 0);
        let limit = match (requested, self.max_page_size) {
            (Some(l), Some(max)) => Some(l.min(max)),
            (None, Some(max)) => Some(max),
            (l, None) => l,
        };

        if query.resource_id.is_none() && limit.is_none() {
            warn!("Listing every ACL entry without a resource filter or page limit");
        }

        self.storage
            .list(&AclQuery {
                resource_id: query.resource_id.clone(),
                limit,
                offset: query.offset,
            })
            .await
    }

    /// Every entry for a resource, ignoring the page clamp
    pub async fn entries_for_resource(&self, resource_id: &str) -> ResaclResult<Vec<AclEntry>> {
        self.storage.list(&AclQuery::for_resource(resource_id)).await
    }

    /// Every entry naming the user directly or one of their organizations
    pub async fn entries_for_principals(
        &self,
        user_id: &str,
        org_ids: &[String],
    ) -> ResaclResult<Vec<AclEntry>> {
        self.storage.list_for_principals(user_id, org_ids).await
    }

    /// Full replace of `auth_type`, `auth_id` and `permission`
    pub async fn update(
        &self,
        id: &str,
        input: &AclInput,
        modifier: &str,
    ) -> ResaclResult<AclEntry> {
        let mut entry = self.get(id).await?;
        let replacement = validate_update(input)?;

        entry.auth_type = replacement.auth_type;
        entry.auth_id = replacement.auth_id;
        entry.permission = replacement.permission;

        self.save_modified(entry, modifier, "acl_update").await
    }

    /// Partial update; fields absent from `input` keep their stored values
    pub async fn patch(&self, id: &str, input: &AclInput, modifier: &str) -> ResaclResult<AclEntry> {
        let mut entry = self.get(id).await?;
        let patch = validate_patch(input)?;

        if let Some(auth_type) = patch.auth_type {
            entry.auth_type = auth_type;
        }
        if let Some(auth_id) = patch.auth_id {
            entry.auth_id = auth_id;
        }
        if let Some(permission) = patch.permission {
            entry.permission = permission;
        }

        self.save_modified(entry, modifier, "acl_patch").await
    }

    pub async fn delete(&self, id: &str) -> ResaclResult<()> {
        if !self.storage.remove(id).await? {
            return Err(not_found_error!(
                format!("acl <{}> was not found.", id),
                "acl_store"
            ));
        }
        log_operation_success!("acl_delete", acl_id = %id);
        Ok(())
    }

    pub async fn health_check(&self) -> ResaclResult<()> {
        self.storage.health_check().await
    }

    async fn save_modified(
        &self,
        mut entry: AclEntry,
        modifier: &str,
        operation: &str,
    ) -> ResaclResult<AclEntry> {
        entry.last_modified = Utc::now();
        entry.modifier_user_id = modifier.to_string();

        // concurrent delete between read and write
        if !self.storage.replace(&entry).await? {
            return Err(not_found_error!(
                format!("acl <{}> was not found.", entry.id),
                "acl_store"
            ));
        }

        log_operation_success!(
            operation,
            acl_id = %entry.id,
            auth_type = %entry.auth_type,
            auth_id = %entry.auth_id,
            permission = %entry.permission
        );
        Ok(entry)
    }
}
