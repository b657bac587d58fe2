//! Integration tests for resacl-core infrastructure

use resacl_core::{
    config_error, init_logging, not_authorized_error, not_found_error, validation_error,
    HostDirectory, LogFormat, LoggingConfig, ResaclConfig, ResaclError, StaticDirectory,
};

#[tokio::test]
async fn test_error_macros() {
    let validation_err = validation_error!("Missing value", "auth_id", "schema");
    match &validation_err {
        ResaclError::Validation {
            errors, context, ..
        } => {
            assert_eq!(errors.get("auth_id"), Some(&vec!["Missing value".to_string()]));
            assert_eq!(context.component, "schema");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }
    validation_err.log();

    let not_found_err = not_found_error!("acl <abc>", "store");
    match not_found_err {
        ResaclError::NotFound {
            resource, context, ..
        } => {
            assert_eq!(resource, "acl <abc>");
            assert_eq!(context.component, "store");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected NotFound error"),
    }

    let denied = not_authorized_error!("User bob cannot edit resource r1", "gate");
    assert!(denied.to_string().contains("bob"));

    let config_err = config_error!("Invalid config", "test");
    assert!(!config_err.is_recoverable());
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        filter_directives: vec!["resacl_core=debug".to_string()],
        ..LoggingConfig::default()
    };

    // A second initialisation in the same process reports an error instead of panicking
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_directory_fixture_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.toml");
    std::fs::write(
        &path,
        r#"
        [[users]]
        id = "u-1"
        name = "alice"

        [[organizations]]
        id = "o-1"
        name = "lab"
        members = [{ user_id = "u-1" }]

        [[packages]]
        id = "p-1"
        private = true
        owner_org = "o-1"

        [[resources]]
        id = "r-1"
        package_id = "p-1"
        "#,
    )
    .unwrap();

    let directory = StaticDirectory::from_file(&path).unwrap();
    let alice = directory.get_user("alice").await.unwrap().unwrap();
    let orgs = directory.get_user_org_ids(&alice).await.unwrap();

    assert!(orgs.contains("o-1"));
    assert!(directory.resource_exists("r-1").await.unwrap());
    assert!(!directory.resource_exists("r-2").await.unwrap());
    // plain members may read private packages but not edit them
    assert!(!directory.can_update_resource(&alice, "r-1").await.unwrap());
}

#[tokio::test]
async fn test_missing_config_file_is_config_error() {
    let result = ResaclConfig::from_file("/definitely/not/here.toml");
    assert!(matches!(result, Err(ResaclError::Config { .. })));
}
