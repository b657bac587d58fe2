//! ACL storage backends
//!
//! Provides the persistence seam for ACL entries with an in-memory backend
//! and a SQLite backend (behind the `sqlite` feature).
//!
//! Every backend returns entries in the same stable order: ascending
//! `created`, ties broken by insertion order. The resolver relies on this to
//! pick the most recent of several duplicate entries.

use async_trait::async_trait;
use resacl_core::{storage_error, AclEntry, AuthType, ResaclResult};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Filter and window for listing entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclQuery {
    pub resource_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AclQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_resource(resource_id: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            ..Self::default()
        }
    }

    pub fn page(mut self, limit: Option<u32>, offset: Option<u32>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Storage trait for different persistence backends
#[async_trait]
pub trait AclStorage: Send + Sync {
    /// Create the backing table if it does not exist yet
    async fn init(&self) -> ResaclResult<()>;

    async fn insert(&self, entry: &AclEntry) -> ResaclResult<()>;

    async fn fetch(&self, id: &str) -> ResaclResult<Option<AclEntry>>;

    /// List entries, optionally filtered by resource, in stable order
    async fn list(&self, query: &AclQuery) -> ResaclResult<Vec<AclEntry>>;

    /// Entries naming the user directly or any of the given organizations
    async fn list_for_principals(
        &self,
        user_id: &str,
        org_ids: &[String],
    ) -> ResaclResult<Vec<AclEntry>>;

    /// Overwrite a stored entry; returns false when the id is gone
    async fn replace(&self, entry: &AclEntry) -> ResaclResult<bool>;

    /// Hard delete; returns false when nothing was removed
    async fn remove(&self, id: &str) -> ResaclResult<bool>;

    /// Health check for the storage backend
    async fn health_check(&self) -> ResaclResult<()>;
}

fn window<T>(items: Vec<T>, limit: Option<u32>, offset: Option<u32>) -> Vec<T> {
    let skip = offset.unwrap_or(0) as usize;
    let take = limit.map_or(usize::MAX, |l| l as usize);
    items.into_iter().skip(skip).take(take).collect()
}

fn matches_principal(entry: &AclEntry, user_id: &str, org_ids: &[String]) -> bool {
    match entry.auth_type {
        AuthType::User => entry.auth_id == user_id,
        AuthType::Org => org_ids.iter().any(|org| *org == entry.auth_id),
    }
}

/// In-memory ACL storage (default implementation)
#[derive(Default)]
pub struct MemoryAclStorage {
    // insertion order is the tie-break for equal `created` values
    entries: Arc<RwLock<Vec<AclEntry>>>,
}

impl MemoryAclStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(entries: impl Iterator<Item = AclEntry>) -> Vec<AclEntry> {
        let mut entries: Vec<AclEntry> = entries.collect();
        entries.sort_by_key(|e| e.created);
        entries
    }
}

#[async_trait]
impl AclStorage for MemoryAclStorage {
    async fn init(&self) -> ResaclResult<()> {
        Ok(())
    }

    async fn insert(&self, entry: &AclEntry) -> ResaclResult<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(storage_error!(
                format!("Duplicate ACL id {}", entry.id),
                "memory_storage"
            ));
        }
        entries.push(entry.clone());
        debug!("Saved ACL {} to memory storage", entry.id);
        Ok(())
    }

    async fn fetch(&self, id: &str) -> ResaclResult<Option<AclEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    async fn list(&self, query: &AclQuery) -> ResaclResult<Vec<AclEntry>> {
        let entries = self.entries.read().await;
        let filtered = entries
            .iter()
            .filter(|e| {
                query
                    .resource_id
                    .as_deref()
                    .map_or(true, |rid| e.resource_id == rid)
            })
            .cloned();
        Ok(window(Self::sorted(filtered), query.limit, query.offset))
    }

    async fn list_for_principals(
        &self,
        user_id: &str,
        org_ids: &[String],
    ) -> ResaclResult<Vec<AclEntry>> {
        let entries = self.entries.read().await;
        let matching = entries
            .iter()
            .filter(|e| matches_principal(e, user_id, org_ids))
            .cloned();
        Ok(Self::sorted(matching))
    }

    async fn replace(&self, entry: &AclEntry) -> ResaclResult<bool> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                debug!("Replaced ACL {} in memory storage", entry.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> ResaclResult<bool> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < before)
    }

    async fn health_check(&self) -> ResaclResult<()> {
        // Memory storage is always healthy
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAclStorage;

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use chrono::{DateTime, Utc};
    use resacl_core::{ErrorContext, Permission, ResaclError};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{QueryBuilder, Sqlite, SqlitePool};
    use std::str::FromStr;
    use tracing::info;

    const SELECT_COLUMNS: &str = "SELECT id, resource_id, auth_type, auth_id, permission, \
         created, last_modified, creator_user_id, modifier_user_id FROM resource_acl";

    const ORDER: &str = " ORDER BY created ASC, rowid ASC";

    /// Database ACL record
    #[derive(Debug, sqlx::FromRow)]
    struct AclRecord {
        id: String,
        resource_id: String,
        auth_type: String,
        auth_id: String,
        permission: String,
        created: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        creator_user_id: Option<String>,
        modifier_user_id: Option<String>,
    }

    impl AclRecord {
        /// Convert to AclEntry, rejecting values outside the enumerated sets
        fn into_entry(self) -> ResaclResult<AclEntry> {
            let auth_type = AuthType::from_str(&self.auth_type)
                .map_err(|e| corrupt_row(&self.id, &e))?;
            let permission = Permission::from_str(&self.permission)
                .map_err(|e| corrupt_row(&self.id, &e))?;

            Ok(AclEntry {
                id: self.id,
                resource_id: self.resource_id,
                auth_type,
                auth_id: self.auth_id,
                permission,
                created: self.created,
                last_modified: self.last_modified,
                creator_user_id: self.creator_user_id.unwrap_or_default(),
                modifier_user_id: self.modifier_user_id.unwrap_or_default(),
            })
        }
    }

    fn corrupt_row(id: &str, reason: &str) -> ResaclError {
        ResaclError::Storage {
            message: format!("Stored ACL {} is invalid: {}", id, reason),
            source: None,
            context: ErrorContext::new("sqlite_storage").with_operation("decode_row"),
        }
    }

    fn db_error(operation: &str, e: sqlx::Error) -> ResaclError {
        ResaclError::Storage {
            message: format!("Failed to {}: {}", operation, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("sqlite_storage").with_operation(operation),
        }
    }

    fn into_entries(records: Vec<AclRecord>) -> ResaclResult<Vec<AclEntry>> {
        records.into_iter().map(AclRecord::into_entry).collect()
    }

    /// SQLite ACL storage implementation
    #[derive(Debug, Clone)]
    pub struct SqliteAclStorage {
        pool: SqlitePool,
    }

    impl SqliteAclStorage {
        pub fn new(pool: SqlitePool) -> Self {
            Self { pool }
        }

        /// Create from database URL.
        ///
        /// `sqlite::memory:` databases are private to a connection, so use
        /// `max_connections = 1` with them.
        pub async fn connect(database_url: &str, max_connections: u32) -> ResaclResult<Self> {
            info!("Connecting to ACL database: {}", database_url);

            let options = SqliteConnectOptions::from_str(database_url)
                .map_err(|e| db_error("parse database url", e))?
                .create_if_missing(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await
                .map_err(|e| db_error("connect to SQLite database", e))?;

            Ok(Self::new(pool))
        }

        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }
    }

    #[async_trait]
    impl AclStorage for SqliteAclStorage {
        async fn init(&self) -> ResaclResult<()> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS resource_acl (
                    id TEXT PRIMARY KEY,
                    resource_id TEXT,
                    auth_type TEXT,
                    auth_id TEXT,
                    permission TEXT,
                    created TIMESTAMP,
                    last_modified TIMESTAMP,
                    creator_user_id TEXT DEFAULT '',
                    modifier_user_id TEXT DEFAULT ''
                )
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("create resource_acl table", e))?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_resource_acl_resource_id ON resource_acl(resource_id)",
            )
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("create resource_acl index", e))?;

            info!("resource_acl table ready");
            Ok(())
        }

        async fn insert(&self, entry: &AclEntry) -> ResaclResult<()> {
            sqlx::query(
                r#"
                INSERT INTO resource_acl
                (id, resource_id, auth_type, auth_id, permission, created, last_modified,
                 creator_user_id, modifier_user_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.resource_id)
            .bind(entry.auth_type.as_str())
            .bind(&entry.auth_id)
            .bind(entry.permission.as_str())
            .bind(entry.created)
            .bind(entry.last_modified)
            .bind(&entry.creator_user_id)
            .bind(&entry.modifier_user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("insert ACL", e))?;

            debug!("Saved ACL {} to SQLite storage", entry.id);
            Ok(())
        }

        async fn fetch(&self, id: &str) -> ResaclResult<Option<AclEntry>> {
            let record: Option<AclRecord> =
                sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("load ACL", e))?;

            record.map(AclRecord::into_entry).transpose()
        }

        async fn list(&self, query: &AclQuery) -> ResaclResult<Vec<AclEntry>> {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
            if let Some(resource_id) = &query.resource_id {
                builder.push(" WHERE resource_id = ").push_bind(resource_id.clone());
            }
            builder.push(ORDER);
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded
            builder
                .push(" LIMIT ")
                .push_bind(query.limit.map_or(-1_i64, i64::from))
                .push(" OFFSET ")
                .push_bind(i64::from(query.offset.unwrap_or(0)));

            let records: Vec<AclRecord> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list ACLs", e))?;

            debug!("Listed {} ACLs from SQLite storage", records.len());
            into_entries(records)
        }

        async fn list_for_principals(
            &self,
            user_id: &str,
            org_ids: &[String],
        ) -> ResaclResult<Vec<AclEntry>> {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
            builder
                .push(" WHERE (auth_type = 'user' AND auth_id = ")
                .push_bind(user_id.to_string())
                .push(")");

            if !org_ids.is_empty() {
                builder.push(" OR (auth_type = 'org' AND auth_id IN (");
                let mut separated = builder.separated(", ");
                for org_id in org_ids {
                    separated.push_bind(org_id.clone());
                }
                separated.push_unseparated("))");
            }
            builder.push(ORDER);

            let records: Vec<AclRecord> = builder
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list ACLs for principals", e))?;

            into_entries(records)
        }

        async fn replace(&self, entry: &AclEntry) -> ResaclResult<bool> {
            let result = sqlx::query(
                r#"
                UPDATE resource_acl
                SET auth_type = ?, auth_id = ?, permission = ?, last_modified = ?,
                    modifier_user_id = ?
                WHERE id = ?
                "#,
            )
            .bind(entry.auth_type.as_str())
            .bind(&entry.auth_id)
            .bind(entry.permission.as_str())
            .bind(entry.last_modified)
            .bind(&entry.modifier_user_id)
            .bind(&entry.id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update ACL", e))?;

            Ok(result.rows_affected() > 0)
        }

        async fn remove(&self, id: &str) -> ResaclResult<bool> {
            let result = sqlx::query("DELETE FROM resource_acl WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("delete ACL", e))?;

            Ok(result.rows_affected() > 0)
        }

        async fn health_check(&self) -> ResaclResult<()> {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("run SQLite health check", e))?;
            Ok(())
        }
    }
}
