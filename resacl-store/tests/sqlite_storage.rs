//! SQLite backend tests against a temporary database file

#![cfg(feature = "sqlite")]

use resacl_core::{AuthType, Permission, ResaclError, StaticDirectory};
use resacl_store::{AclInput, AclQuery, AclStorage, AclStore, SqliteAclStorage};
use std::sync::Arc;
use tempfile::TempDir;

async fn sqlite_store() -> (AclStore, SqliteAclStorage, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("acl.db").display());
    let storage = SqliteAclStorage::connect(&url, 2).await.unwrap();

    let directory = StaticDirectory::new()
        .with_package("p-1", true, Some("o-1"))
        .with_resource("r-1", "p-1")
        .with_resource("r-2", "p-1");

    let store = AclStore::new(Arc::new(storage.clone()), Arc::new(directory));
    store.init().await.unwrap();
    (store, storage, dir)
}

#[tokio::test]
async fn test_init_is_repeatable() {
    let (store, _storage, _dir) = sqlite_store().await;
    store.init().await.unwrap();
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_crud_round_trip() {
    let (store, _storage, _dir) = sqlite_store().await;

    let created = store
        .create(&AclInput::new("r-1", "org", "o-1", "read"), "site_user")
        .await
        .unwrap();
    assert_eq!(store.get(&created.id).await.unwrap(), created);

    let updated = store
        .update(&created.id, &AclInput::replace("user", "u-1", "none"), "alice")
        .await
        .unwrap();
    let reloaded = store.get(&created.id).await.unwrap();
    assert_eq!(reloaded, updated);
    assert_eq!(reloaded.auth_type, AuthType::User);
    assert_eq!(reloaded.permission, Permission::None);
    assert_eq!(reloaded.resource_id, "r-1");
    assert_eq!(reloaded.modifier_user_id, "alice");

    let patched = store
        .patch(&created.id, &AclInput::default().with_permission("read"), "bob")
        .await
        .unwrap();
    assert_eq!(patched.auth_id, "u-1");
    assert_eq!(store.get(&created.id).await.unwrap().permission, Permission::Read);

    store.delete(&created.id).await.unwrap();
    assert!(matches!(
        store.get(&created.id).await,
        Err(ResaclError::NotFound { .. })
    ));
    assert!(matches!(
        store.delete(&created.id).await,
        Err(ResaclError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_list_is_stable_and_paginated() {
    let (store, _storage, _dir) = sqlite_store().await;

    let mut ids = Vec::new();
    for i in 0..10 {
        let acl = store
            .create(&AclInput::new("r-1", "user", &format!("u-{i}"), "read"), "site_user")
            .await
            .unwrap();
        ids.push(acl.id);
    }
    store
        .create(&AclInput::new("r-2", "org", "o-1", "none"), "site_user")
        .await
        .unwrap();

    let page: Vec<String> = store
        .list(&AclQuery::for_resource("r-1").page(Some(3), Some(3)))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(page, ids[3..6].to_vec());

    let offset_only = store
        .list(&AclQuery::for_resource("r-1").page(None, Some(8)))
        .await
        .unwrap();
    assert_eq!(offset_only.len(), 2);

    assert_eq!(store.list(&AclQuery::all()).await.unwrap().len(), 11);
}

#[tokio::test]
async fn test_principal_query_matches_type_and_id() {
    let (store, storage, _dir) = sqlite_store().await;

    store
        .create(&AclInput::new("r-1", "user", "u-1", "none"), "site_user")
        .await
        .unwrap();
    store
        .create(&AclInput::new("r-1", "org", "o-1", "read"), "site_user")
        .await
        .unwrap();
    store
        .create(&AclInput::new("r-2", "org", "u-1", "read"), "site_user")
        .await
        .unwrap();

    let without_orgs = storage.list_for_principals("u-1", &[]).await.unwrap();
    assert_eq!(without_orgs.len(), 1);
    assert_eq!(without_orgs[0].auth_type, AuthType::User);

    let with_orgs = storage
        .list_for_principals("u-1", &["o-1".to_string(), "o-2".to_string()])
        .await
        .unwrap();
    assert_eq!(with_orgs.len(), 2);
}

#[tokio::test]
async fn test_corrupt_rows_surface_as_storage_errors() {
    let (store, storage, _dir) = sqlite_store().await;
    let created = store
        .create(&AclInput::new("r-1", "user", "u-1", "read"), "site_user")
        .await
        .unwrap();

    sqlx::query("UPDATE resource_acl SET permission = 'write' WHERE id = ?")
        .bind(&created.id)
        .execute(storage.pool())
        .await
        .unwrap();

    assert!(matches!(
        store.get(&created.id).await,
        Err(ResaclError::Storage { .. })
    ));
}
