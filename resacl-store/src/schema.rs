//! Input schemas and validators for ACL mutations
//!
//! Raw inputs arrive as optional strings (the way a command line or form
//! supplies them). Each schema checks every field, collects all failures
//! into [`FieldErrors`] and only then hands back typed values, so nothing is
//! persisted from a partially valid request.

use resacl_core::{AuthType, FieldErrors, HostDirectory, Permission, ResaclError, ResaclResult};
use serde::{Deserialize, Serialize};

const MISSING_VALUE: &str = "Missing value";

/// Raw, unvalidated ACL fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclInput {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
}

impl AclInput {
    /// Input with every field supplied, for create and update
    pub fn new(resource_id: &str, auth_type: &str, auth_id: &str, permission: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            auth_type: Some(auth_type.to_string()),
            auth_id: Some(auth_id.to_string()),
            permission: Some(permission.to_string()),
        }
    }

    /// Input for a full update; the resource is taken from the stored entry
    pub fn replace(auth_type: &str, auth_id: &str, permission: &str) -> Self {
        Self {
            resource_id: None,
            auth_type: Some(auth_type.to_string()),
            auth_id: Some(auth_id.to_string()),
            permission: Some(permission.to_string()),
        }
    }

    pub fn with_auth_type(mut self, auth_type: &str) -> Self {
        self.auth_type = Some(auth_type.to_string());
        self
    }

    pub fn with_auth_id(mut self, auth_id: &str) -> Self {
        self.auth_id = Some(auth_id.to_string());
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permission = Some(permission.to_string());
        self
    }
}

/// Validated fields for a new entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAcl {
    pub resource_id: String,
    pub auth_type: AuthType,
    pub auth_id: String,
    pub permission: Permission,
}

/// Validated fields for a full update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclReplacement {
    pub auth_type: AuthType,
    pub auth_id: String,
    pub permission: Permission,
}

/// Validated fields for a partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclPatch {
    pub auth_type: Option<AuthType>,
    pub auth_id: Option<String>,
    pub permission: Option<Permission>,
}

pub fn auth_type_validator(value: &str) -> Result<AuthType, String> {
    value.parse()
}

pub fn permission_validator(value: &str) -> Result<Permission, String> {
    value.parse()
}

pub fn not_empty(value: Option<&str>) -> Result<&str, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MISSING_VALUE.to_string()),
    }
}

/// Accumulates per-field failures while a schema runs
#[derive(Debug, Default)]
struct Collector {
    errors: FieldErrors,
}

impl Collector {
    fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.errors.entry(field.to_string()).or_default().push(message);
                None
            }
        }
    }

    fn required<T>(
        &mut self,
        field: &str,
        value: Option<&str>,
        validator: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        let present = self.check(field, not_empty(value))?;
        self.check(field, validator(present))
    }

    fn optional<T>(
        &mut self,
        field: &str,
        value: Option<&str>,
        validator: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        value.and_then(|v| self.check(field, validator(v)))
    }

    fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_error(self) -> ResaclError {
        ResaclError::validation(self.errors, "schema")
    }
}

/// Create schema: every field is required and the resource must exist
pub async fn validate_create(
    input: &AclInput,
    directory: &dyn HostDirectory,
) -> ResaclResult<NewAcl> {
    let mut collector = Collector::default();

    let resource_id = collector.required("resource_id", input.resource_id.as_deref(), |v| {
        Ok(v.to_string())
    });
    let auth_type =
        collector.required("auth_type", input.auth_type.as_deref(), auth_type_validator);
    let auth_id = collector.required("auth_id", input.auth_id.as_deref(), |v| Ok(v.to_string()));
    let permission =
        collector.required("permission", input.permission.as_deref(), permission_validator);

    if let Some(resource_id) = &resource_id {
        if !directory.resource_exists(resource_id).await? {
            collector
                .errors
                .entry("resource_id".to_string())
                .or_default()
                .push("Not found: Resource".to_string());
        }
    }

    match (resource_id, auth_type, auth_id, permission) {
        (Some(resource_id), Some(auth_type), Some(auth_id), Some(permission))
            if collector.is_clean() =>
        {
            Ok(NewAcl {
                resource_id,
                auth_type,
                auth_id,
                permission,
            })
        }
        _ => Err(collector.into_error()),
    }
}

/// Update schema: the three mutable fields are all required
pub fn validate_update(input: &AclInput) -> ResaclResult<AclReplacement> {
    let mut collector = Collector::default();

    let auth_type =
        collector.required("auth_type", input.auth_type.as_deref(), auth_type_validator);
    let auth_id = collector.required("auth_id", input.auth_id.as_deref(), |v| Ok(v.to_string()));
    let permission =
        collector.required("permission", input.permission.as_deref(), permission_validator);

    match (auth_type, auth_id, permission) {
        (Some(auth_type), Some(auth_id), Some(permission)) if collector.is_clean() => {
            Ok(AclReplacement {
                auth_type,
                auth_id,
                permission,
            })
        }
        _ => Err(collector.into_error()),
    }
}

/// Patch schema: absent fields are ignored, present ones are validated
pub fn validate_patch(input: &AclInput) -> ResaclResult<AclPatch> {
    let mut collector = Collector::default();

    let auth_type = collector.optional("auth_type", input.auth_type.as_deref(), auth_type_validator);
    let auth_id = collector.optional("auth_id", input.auth_id.as_deref(), |v| {
        not_empty(Some(v)).map(str::to_string)
    });
    let permission =
        collector.optional("permission", input.permission.as_deref(), permission_validator);

    if !collector.is_clean() {
        return Err(collector.into_error());
    }

    Ok(AclPatch {
        auth_type,
        auth_id,
        permission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resacl_core::StaticDirectory;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_package("p-1", false, None)
            .with_resource("r-1", "p-1")
    }

    #[tokio::test]
    async fn test_create_accepts_every_valid_pair() {
        let dir = directory();
        for auth_type in AuthType::ALL {
            for permission in Permission::ALL {
                let input = AclInput::new("r-1", auth_type.as_str(), "x", permission.as_str());
                let acl = validate_create(&input, &dir).await.unwrap();
                assert_eq!(acl.auth_type, auth_type);
                assert_eq!(acl.permission, permission);
            }
        }
    }

    #[tokio::test]
    async fn test_create_rejects_values_outside_the_sets() {
        let dir = directory();
        let cases = [
            ("admin", "read", "auth_type"),
            ("group", "none", "auth_type"),
            ("user", "write", "permission"),
            ("org", "READ", "permission"),
            ("", "read", "auth_type"),
        ];

        for (auth_type, permission, field) in cases {
            let input = AclInput::new("r-1", auth_type, "x", permission);
            let err = validate_create(&input, &dir).await.unwrap_err();
            let errors = err.field_errors().expect("validation error");
            assert!(errors.contains_key(field), "{auth_type}/{permission}");
        }
    }

    #[tokio::test]
    async fn test_create_collects_all_field_errors() {
        let dir = directory();
        let input = AclInput::new("r-missing", "team", " ", "write");
        let err = validate_create(&input, &dir).await.unwrap_err();
        let errors = err.field_errors().unwrap();

        assert_eq!(errors["resource_id"], vec!["Not found: Resource".to_string()]);
        assert_eq!(errors["auth_type"], vec!["Invalid auth_type team".to_string()]);
        assert_eq!(errors["auth_id"], vec![MISSING_VALUE.to_string()]);
        assert_eq!(errors["permission"], vec!["Invalid permission write".to_string()]);
    }

    #[test]
    fn test_update_requires_all_fields() {
        let input = AclInput {
            permission: Some("read".to_string()),
            ..AclInput::default()
        };
        let err = validate_update(&input).unwrap_err();
        let errors = err.field_errors().unwrap();
        assert!(errors.contains_key("auth_type"));
        assert!(errors.contains_key("auth_id"));
        assert!(!errors.contains_key("permission"));
    }

    #[test]
    fn test_patch_ignores_missing_fields() {
        let patch = validate_patch(&AclInput::default().with_permission("none")).unwrap();
        assert_eq!(
            patch,
            AclPatch {
                auth_type: None,
                auth_id: None,
                permission: Some(Permission::None),
            }
        );

        let err = validate_patch(&AclInput::default().with_auth_id("")).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("auth_id"));
    }
}
