//! Action registry
//!
//! Named operations registered once into a lookup table. Each call takes a
//! JSON parameter object, decodes it into the operation's typed parameters
//! and dispatches to [`AclService`]. Results come back as JSON.

use crate::service::AclService;
use resacl_core::{not_found_error, validation_error, CallerContext, ResaclResult};
use resacl_store::{AclInput, AclQuery};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, to_value, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AclList,
    AclShow,
    AclCreate,
    AclUpdate,
    AclPatch,
    AclDelete,
    AclResolve,
    ListForUser,
    ResourceShow,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::AclList,
        Action::AclShow,
        Action::AclCreate,
        Action::AclUpdate,
        Action::AclPatch,
        Action::AclDelete,
        Action::AclResolve,
        Action::ListForUser,
        Action::ResourceShow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::AclList => "resource_acl_list",
            Action::AclShow => "resource_acl_show",
            Action::AclCreate => "resource_acl_create",
            Action::AclUpdate => "resource_acl_update",
            Action::AclPatch => "resource_acl_patch",
            Action::AclDelete => "resource_acl_delete",
            Action::AclResolve => "resource_acl_resolve",
            Action::ListForUser => "resource_list_for_user",
            Action::ResourceShow => "resource_show",
        }
    }

    /// Whether the action never writes
    pub fn is_side_effect_free(&self) -> bool {
        !matches!(
            self,
            Action::AclCreate | Action::AclUpdate | Action::AclPatch | Action::AclDelete
        )
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    resource_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MutateParams {
    id: String,
    #[serde(flatten)]
    input: AclInput,
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    resource_id: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UserParams {
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceShowParams {
    id: String,
    #[serde(default)]
    user: Option<String>,
}

fn decode<T: DeserializeOwned>(action: Action, params: Value) -> ResaclResult<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| validation_error!(e, "params", action.name()))
}

#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: HashMap<&'static str, Action>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        let actions = Action::ALL.iter().map(|a| (a.name(), *a)).collect();
        Self { actions }
    }

    pub fn get(&self, name: &str) -> Option<Action> {
        self.actions.get(name).copied()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.actions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn call(
        &self,
        service: &AclService,
        ctx: &CallerContext,
        name: &str,
        params: Value,
    ) -> ResaclResult<Value> {
        let action = self
            .get(name)
            .ok_or_else(|| not_found_error!(format!("action <{}>", name), "action_registry"))?;
        debug!(action = name, user = ?ctx.user, "Dispatching action");

        let result = match action {
            Action::AclList => {
                let p: ListParams = decode(action, params)?;
                let query = AclQuery {
                    resource_id: p.resource_id,
                    limit: p.limit,
                    offset: p.offset,
                };
                to_value(service.acl_list(ctx, &query).await?)?
            }
            Action::AclShow => {
                let p: IdParams = decode(action, params)?;
                to_value(service.acl_show(ctx, &p.id).await?)?
            }
            Action::AclCreate => {
                let input: AclInput = decode(action, params)?;
                to_value(service.acl_create(ctx, &input).await?)?
            }
            Action::AclUpdate => {
                let p: MutateParams = decode(action, params)?;
                to_value(service.acl_update(ctx, &p.id, &p.input).await?)?
            }
            Action::AclPatch => {
                let p: MutateParams = decode(action, params)?;
                to_value(service.acl_patch(ctx, &p.id, &p.input).await?)?
            }
            Action::AclDelete => {
                let p: IdParams = decode(action, params)?;
                service.acl_delete(ctx, &p.id).await?;
                Value::Null
            }
            Action::AclResolve => {
                let p: ResolveParams = decode(action, params)?;
                to_value(
                    service
                        .resolve_permission(ctx, &p.resource_id, p.user.as_deref())
                        .await?,
                )?
            }
            Action::ListForUser => {
                let p: UserParams = decode(action, params)?;
                to_value(
                    service
                        .list_resources_for_user(ctx, p.user.as_deref())
                        .await?,
                )?
            }
            Action::ResourceShow => {
                let p: ResourceShowParams = decode(action, params)?;
                let visible = service.can_view(ctx, &p.id, p.user.as_deref()).await?;
                json!({ "id": p.id, "visible": visible })
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_is_registered_once() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.names().len(), Action::ALL.len());
        for action in Action::ALL {
            assert_eq!(registry.get(action.name()), Some(action));
        }
        assert_eq!(registry.get("package_show"), None);
    }

    #[test]
    fn test_read_actions_are_side_effect_free() {
        assert!(Action::AclList.is_side_effect_free());
        assert!(Action::ResourceShow.is_side_effect_free());
        assert!(!Action::AclDelete.is_side_effect_free());
    }

    #[test]
    fn test_missing_id_is_a_validation_error() {
        let err = decode::<IdParams>(Action::AclShow, json!({})).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("params"));
    }
}
