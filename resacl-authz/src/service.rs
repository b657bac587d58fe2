//! ACL service
//!
//! The operation surface. Every call takes an explicit [`CallerContext`]:
//! management operations pass through the [`AuthorizationGate`] before the
//! store is touched, read-side operations act for the given user or, when
//! none is given, for the caller.

use crate::gate::{AclAction, AuthorizationGate};
use crate::labels::PermissionLabels;
use crate::resolver::{AclResolver, EffectivePermission, GrantSource};
use resacl_core::{
    log_operation_start, log_operation_success, not_authorized_error, not_found_error,
    validation_error, AclEntry, AuthType, CallerContext, HostDirectory, Permission, ResaclResult,
    ResourceInfo, UserInfo,
};
use resacl_store::{AclInput, AclQuery, AclStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One resource a user can read through the ACL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub resource_id: String,
    pub permission: Permission,
    pub source: GrantSource,
}

/// A principal named the way a person types it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum PrincipalName {
    User(String),
    Organization(String),
}

#[derive(Clone)]
pub struct AclService {
    store: AclStore,
    gate: AuthorizationGate,
    labels: PermissionLabels,
}

impl AclService {
    pub fn new(store: AclStore) -> Self {
        let directory = store.directory().clone();
        let resolver = AclResolver::new(store.clone());
        let gate = AuthorizationGate::new(resolver.clone(), directory.clone());
        let labels = PermissionLabels::new(resolver, directory);
        Self {
            store,
            gate,
            labels,
        }
    }

    pub fn store(&self) -> &AclStore {
        &self.store
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn resolver(&self) -> &AclResolver {
        self.gate.resolver()
    }

    fn directory(&self) -> &Arc<dyn HostDirectory> {
        self.store.directory()
    }

    pub async fn acl_list(
        &self,
        ctx: &CallerContext,
        query: &AclQuery,
    ) -> ResaclResult<Vec<AclEntry>> {
        self.gate
            .check_access(AclAction::List, ctx, query.resource_id.as_deref())
            .await?;
        self.store.list(query).await
    }

    pub async fn acl_show(&self, ctx: &CallerContext, id: &str) -> ResaclResult<AclEntry> {
        let entry = self.store.get(id).await?;
        self.gate
            .check_access(AclAction::Show, ctx, Some(&entry.resource_id))
            .await?;
        Ok(entry)
    }

    /// Authorization runs before validation, so an unknown resource reaches
    /// authenticated callers as not found and site callers as a validation
    /// error. A missing resource id goes straight to the create schema.
    pub async fn acl_create(&self, ctx: &CallerContext, input: &AclInput) -> ResaclResult<AclEntry> {
        let resource_id = input
            .resource_id
            .as_deref()
            .filter(|rid| !rid.trim().is_empty());

        if let Some(resource_id) = resource_id {
            self.gate
                .check_access(AclAction::Create, ctx, Some(resource_id))
                .await?;
        }
        // rejected by the create schema when the resource id is missing
        self.store.create(input, ctx.actor_id()).await
    }

    pub async fn acl_update(
        &self,
        ctx: &CallerContext,
        id: &str,
        input: &AclInput,
    ) -> ResaclResult<AclEntry> {
        let entry = self.store.get(id).await?;
        self.gate
            .check_access(AclAction::Update, ctx, Some(&entry.resource_id))
            .await?;
        self.store.update(id, input, ctx.actor_id()).await
    }

    pub async fn acl_patch(
        &self,
        ctx: &CallerContext,
        id: &str,
        input: &AclInput,
    ) -> ResaclResult<AclEntry> {
        let entry = self.store.get(id).await?;
        self.gate
            .check_access(AclAction::Patch, ctx, Some(&entry.resource_id))
            .await?;
        self.store.patch(id, input, ctx.actor_id()).await
    }

    pub async fn acl_delete(&self, ctx: &CallerContext, id: &str) -> ResaclResult<()> {
        let entry = self.store.get(id).await?;
        self.gate
            .check_access(AclAction::Delete, ctx, Some(&entry.resource_id))
            .await?;
        self.store.delete(id).await
    }

    /// Create an entry for a user or organization given by name (or id)
    pub async fn create_for_principal(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        principal: &PrincipalName,
        permission: &str,
    ) -> ResaclResult<AclEntry> {
        log_operation_start!("create_for_principal", resource_id, principal = ?principal);

        let (auth_type, auth_id) = match principal {
            PrincipalName::User(name) => {
                let user = self.directory().get_user(name).await?.ok_or_else(|| {
                    validation_error!(
                        format!("User {} does not exist.", name),
                        "username",
                        "acl_service"
                    )
                })?;
                (AuthType::User, user.id)
            }
            PrincipalName::Organization(name) => {
                let org = self.directory().get_organization(name).await?.ok_or_else(|| {
                    validation_error!(
                        format!("Organization {} does not exist.", name),
                        "organization",
                        "acl_service"
                    )
                })?;
                (AuthType::Org, org.id)
            }
        };

        let input = AclInput::new(resource_id, auth_type.as_str(), &auth_id, permission);
        self.acl_create(ctx, &input).await
    }

    /// Effective ACL permission of `user` (the caller when omitted)
    pub async fn resolve_permission(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        user: Option<&str>,
    ) -> ResaclResult<Option<EffectivePermission>> {
        self.authorize_subject(ctx, user).await?;

        if !self.directory().resource_exists(resource_id).await? {
            return Err(not_found_error!(
                format!("resource <{}>", resource_id),
                "acl_service"
            ));
        }

        match user.or(ctx.user.as_deref()) {
            Some(user) => self.resolver().resolve(resource_id, user).await,
            None => Ok(None),
        }
    }

    /// Resources readable through the ACL, one per resource, ordered by id.
    /// Unknown or anonymous users get an empty list.
    pub async fn list_resources_for_user(
        &self,
        ctx: &CallerContext,
        user: Option<&str>,
    ) -> ResaclResult<Vec<ResourceGrant>> {
        self.authorize_subject(ctx, user).await?;

        let Some(user) = self.lookup_user(ctx, user).await? else {
            return Ok(Vec::new());
        };

        let grants: Vec<ResourceGrant> = self
            .resolver()
            .readable_resources(&user)
            .await?
            .into_iter()
            .map(|(resource_id, effective)| ResourceGrant {
                resource_id,
                permission: effective.permission,
                source: effective.source,
            })
            .collect();

        log_operation_success!("resource_list_for_user", user_id = %user.id, count = grants.len());
        Ok(grants)
    }

    pub async fn can_view(
        &self,
        ctx: &CallerContext,
        resource_id: &str,
        user: Option<&str>,
    ) -> ResaclResult<bool> {
        self.authorize_subject(ctx, user).await?;

        let visible = self
            .gate
            .can_view(resource_id, user.or(ctx.user.as_deref()))
            .await?;
        debug!(resource_id, visible, "Resource visibility");
        Ok(visible)
    }

    pub async fn filter_visible_resources(
        &self,
        ctx: &CallerContext,
        resources: Vec<ResourceInfo>,
    ) -> ResaclResult<Vec<ResourceInfo>> {
        self.gate
            .filter_visible_resources(resources, ctx.user.as_deref())
            .await
    }

    pub async fn user_dataset_labels(
        &self,
        ctx: &CallerContext,
        user: Option<&str>,
    ) -> ResaclResult<Vec<String>> {
        self.authorize_subject(ctx, user).await?;

        let user = self.lookup_user(ctx, user).await?;
        self.labels.user_dataset_labels(user.as_ref()).await
    }

    /// Only site contexts and sysadmins may ask about a user other than
    /// themselves
    async fn authorize_subject(&self, ctx: &CallerContext, user: Option<&str>) -> ResaclResult<()> {
        let Some(subject) = user else {
            return Ok(());
        };
        if ctx.ignore_auth {
            return Ok(());
        }

        let acting = self.lookup_user(ctx, None).await?;
        if let Some(acting) = &acting {
            if acting.sysadmin || acting.id == subject || acting.name == subject {
                return Ok(());
            }
        }

        let name = acting.as_ref().map_or("anonymous", |u| u.name.as_str());
        warn!(user = name, subject, "Query about another user's permissions denied");
        Err(not_authorized_error!(
            format!("User {} not authorized to query permissions of {}", name, subject),
            "acl_service"
        ))
    }

    async fn lookup_user(
        &self,
        ctx: &CallerContext,
        user: Option<&str>,
    ) -> ResaclResult<Option<UserInfo>> {
        match user.or(ctx.user.as_deref()) {
            Some(identifier) if !identifier.is_empty() => {
                self.directory().get_user(identifier).await
            }
            _ => Ok(None),
        }
    }
}
