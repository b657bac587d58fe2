//! Static host directory
//!
//! An in-memory [`HostDirectory`] built programmatically or loaded from a TOML
//! fixture. Used by the command-line tool and by tests; real deployments plug
//! their own host system in behind the same trait.

use crate::error::{ErrorContext, ResaclError, ResaclResult};
use crate::traits::HostDirectory;
use crate::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Role a user holds inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Member,
    Editor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    #[serde(default = "default_capacity")]
    pub capacity: Capacity,
}

fn default_capacity() -> Capacity {
    Capacity::Member
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<Membership>,
}

/// On-disk fixture layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFixture {
    #[serde(default)]
    pub users: Vec<UserInfo>,
    #[serde(default)]
    pub organizations: Vec<OrganizationRecord>,
    #[serde(default)]
    pub packages: Vec<PackageInfo>,
    #[serde(default)]
    pub resources: Vec<ResourceInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<String, UserInfo>,
    organizations: HashMap<String, OrganizationRecord>,
    packages: HashMap<String, PackageInfo>,
    resources: HashMap<String, ResourceInfo>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: DirectoryFixture) -> Self {
        let mut directory = Self::new();
        for user in fixture.users {
            directory.users.insert(user.id.clone(), user);
        }
        for org in fixture.organizations {
            directory.organizations.insert(org.id.clone(), org);
        }
        for package in fixture.packages {
            directory.packages.insert(package.id.clone(), package);
        }
        for resource in fixture.resources {
            directory.resources.insert(resource.id.clone(), resource);
        }
        directory
    }

    /// Load a directory fixture from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ResaclResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ResaclError::Config {
            message: format!("Failed to read directory fixture {}: {}", path.display(), e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("directory")
                .with_operation("read_file")
                .with_suggestion("Check directory.path in your configuration"),
        })?;

        let fixture: DirectoryFixture =
            toml::from_str(&content).map_err(|e| ResaclError::Config {
                message: format!("Failed to parse directory fixture: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("directory").with_operation("parse_toml"),
            })?;

        tracing::debug!(
            users = fixture.users.len(),
            organizations = fixture.organizations.len(),
            packages = fixture.packages.len(),
            resources = fixture.resources.len(),
            "Loaded directory fixture"
        );

        Ok(Self::from_fixture(fixture))
    }

    pub fn with_user(mut self, id: &str, name: &str, sysadmin: bool) -> Self {
        self.users.insert(
            id.to_string(),
            UserInfo {
                id: id.to_string(),
                name: name.to_string(),
                sysadmin,
            },
        );
        self
    }

    pub fn with_organization(mut self, id: &str, name: &str) -> Self {
        self.organizations.insert(
            id.to_string(),
            OrganizationRecord {
                id: id.to_string(),
                name: name.to_string(),
                members: Vec::new(),
            },
        );
        self
    }

    pub fn with_member(mut self, org_id: &str, user_id: &str, capacity: Capacity) -> Self {
        if let Some(org) = self.organizations.get_mut(org_id) {
            org.members.retain(|m| m.user_id != user_id);
            org.members.push(Membership {
                user_id: user_id.to_string(),
                capacity,
            });
        }
        self
    }

    pub fn with_package(mut self, id: &str, private: bool, owner_org: Option<&str>) -> Self {
        self.packages.insert(
            id.to_string(),
            PackageInfo {
                id: id.to_string(),
                private,
                owner_org: owner_org.map(str::to_string),
                creator_user_id: None,
            },
        );
        self
    }

    pub fn with_resource(mut self, id: &str, package_id: &str) -> Self {
        self.resources.insert(
            id.to_string(),
            ResourceInfo {
                id: id.to_string(),
                package_id: package_id.to_string(),
            },
        );
        self
    }

    /// Resources belonging to a package, ordered by id
    pub fn package_resources(&self, package_id: &str) -> Vec<ResourceInfo> {
        let mut resources: Vec<ResourceInfo> = self
            .resources
            .values()
            .filter(|r| r.package_id == package_id)
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.id.cmp(&b.id));
        resources
    }

    fn capacity_in(&self, org_id: &str, user_id: &str) -> Option<Capacity> {
        self.organizations
            .get(org_id)?
            .members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.capacity)
    }
}

#[async_trait]
impl HostDirectory for StaticDirectory {
    async fn get_resource(&self, resource_id: &str) -> ResaclResult<Option<ResourceInfo>> {
        Ok(self.resources.get(resource_id).cloned())
    }

    async fn get_package(&self, package_id: &str) -> ResaclResult<Option<PackageInfo>> {
        Ok(self.packages.get(package_id).cloned())
    }

    async fn get_user(&self, identifier: &str) -> ResaclResult<Option<UserInfo>> {
        if let Some(user) = self.users.get(identifier) {
            return Ok(Some(user.clone()));
        }
        Ok(self.users.values().find(|u| u.name == identifier).cloned())
    }

    async fn get_organization(&self, identifier: &str) -> ResaclResult<Option<OrganizationInfo>> {
        let org = self
            .organizations
            .get(identifier)
            .or_else(|| self.organizations.values().find(|o| o.name == identifier));

        Ok(org.map(|o| OrganizationInfo {
            id: o.id.clone(),
            name: o.name.clone(),
        }))
    }

    async fn get_user_org_ids(&self, user: &UserInfo) -> ResaclResult<HashSet<String>> {
        Ok(self
            .organizations
            .values()
            .filter(|org| org.members.iter().any(|m| m.user_id == user.id))
            .map(|org| org.id.clone())
            .collect())
    }

    async fn default_resource_visibility(
        &self,
        package: &PackageInfo,
        user: Option<&UserInfo>,
    ) -> ResaclResult<bool> {
        if !package.private {
            return Ok(true);
        }

        let Some(user) = user else {
            return Ok(false);
        };

        if user.sysadmin || package.creator_user_id.as_deref() == Some(user.id.as_str()) {
            return Ok(true);
        }

        Ok(package
            .owner_org
            .as_deref()
            .and_then(|org| self.capacity_in(org, &user.id))
            .is_some())
    }

    async fn can_update_resource(
        &self,
        user: &UserInfo,
        resource_id: &str,
    ) -> ResaclResult<bool> {
        if user.sysadmin {
            return Ok(true);
        }

        let Some(package) = self
            .resources
            .get(resource_id)
            .and_then(|r| self.packages.get(&r.package_id))
        else {
            return Ok(false);
        };

        if package.creator_user_id.as_deref() == Some(user.id.as_str()) {
            return Ok(true);
        }

        Ok(package
            .owner_org
            .as_deref()
            .and_then(|org| self.capacity_in(org, &user.id))
            .map_or(false, |capacity| capacity >= Capacity::Editor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_user("u-admin", "root", true)
            .with_user("u-alice", "alice", false)
            .with_user("u-bob", "bob", false)
            .with_organization("o-lab", "lab")
            .with_member("o-lab", "u-alice", Capacity::Editor)
            .with_member("o-lab", "u-bob", Capacity::Member)
            .with_package("p-private", true, Some("o-lab"))
            .with_package("p-public", false, Some("o-lab"))
            .with_resource("r-1", "p-private")
    }

    #[tokio::test]
    async fn test_user_lookup_by_id_or_name() {
        let dir = directory();
        assert_eq!(dir.get_user("u-alice").await.unwrap().unwrap().name, "alice");
        assert_eq!(dir.get_user("alice").await.unwrap().unwrap().id, "u-alice");
        assert!(dir.get_user("carol").await.unwrap().is_none());
        assert_eq!(dir.get_organization("lab").await.unwrap().unwrap().id, "o-lab");
    }

    #[tokio::test]
    async fn test_private_visibility_follows_membership() {
        let dir = directory();
        let package = dir.get_package("p-private").await.unwrap().unwrap();
        let bob = dir.get_user("bob").await.unwrap().unwrap();
        let root = dir.get_user("root").await.unwrap().unwrap();
        let outsider = UserInfo {
            id: "u-x".to_string(),
            name: "x".to_string(),
            sysadmin: false,
        };

        assert!(dir.default_resource_visibility(&package, Some(&bob)).await.unwrap());
        assert!(dir.default_resource_visibility(&package, Some(&root)).await.unwrap());
        assert!(!dir.default_resource_visibility(&package, Some(&outsider)).await.unwrap());
        assert!(!dir.default_resource_visibility(&package, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_requires_editor_capacity() {
        let dir = directory();
        let alice = dir.get_user("alice").await.unwrap().unwrap();
        let bob = dir.get_user("bob").await.unwrap().unwrap();

        assert!(dir.can_update_resource(&alice, "r-1").await.unwrap());
        assert!(!dir.can_update_resource(&bob, "r-1").await.unwrap());
        assert!(!dir.can_update_resource(&alice, "missing").await.unwrap());
    }

    #[test]
    fn test_fixture_parses_from_toml() {
        let fixture: DirectoryFixture = toml::from_str(
            r#"
            [[users]]
            id = "u1"
            name = "alice"

            [[organizations]]
            id = "o1"
            name = "lab"
            members = [{ user_id = "u1", capacity = "admin" }]

            [[packages]]
            id = "p1"
            private = true
            owner_org = "o1"

            [[resources]]
            id = "r1"
            package_id = "p1"
            "#,
        )
        .unwrap();

        let dir = StaticDirectory::from_fixture(fixture);
        assert_eq!(dir.package_resources("p1").len(), 1);
        assert_eq!(dir.capacity_in("o1", "u1"), Some(Capacity::Admin));
    }
}
