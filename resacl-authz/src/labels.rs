//! Permission labels for search-index filtering
//!
//! A dataset is indexed with labels, a user is searched with labels, and a
//! hit requires one shared label. Resource ACLs add an `acl-<resource_id>`
//! label on both sides so a granted user can find a private dataset.

use crate::resolver::AclResolver;
use resacl_core::{HostDirectory, PackageInfo, ResaclResult, ResourceInfo, UserInfo};
use std::sync::Arc;

pub const PUBLIC_LABEL: &str = "public";

pub fn acl_label(resource_id: &str) -> String {
    format!("acl-{}", resource_id)
}

/// Labels the host would give the package without resource ACLs
pub fn baseline_dataset_labels(package: &PackageInfo) -> Vec<String> {
    if !package.private {
        return vec![PUBLIC_LABEL.to_string()];
    }

    match (&package.owner_org, &package.creator_user_id) {
        (Some(org), _) => vec![format!("member-{}", org)],
        (None, Some(creator)) => vec![format!("creator-{}", creator)],
        (None, None) => Vec::new(),
    }
}

/// Baseline labels plus one `acl-` label per resource
pub fn dataset_labels(package: &PackageInfo, resources: &[ResourceInfo]) -> Vec<String> {
    let mut labels = baseline_dataset_labels(package);
    labels.extend(resources.iter().map(|r| acl_label(&r.id)));
    labels
}

#[derive(Clone)]
pub struct PermissionLabels {
    resolver: AclResolver,
    directory: Arc<dyn HostDirectory>,
}

impl PermissionLabels {
    pub fn new(resolver: AclResolver, directory: Arc<dyn HostDirectory>) -> Self {
        Self {
            resolver,
            directory,
        }
    }

    /// Labels a user searches with; anonymous users only see public datasets
    pub async fn user_dataset_labels(&self, user: Option<&UserInfo>) -> ResaclResult<Vec<String>> {
        let mut labels = vec![PUBLIC_LABEL.to_string()];
        let Some(user) = user else {
            return Ok(labels);
        };

        labels.push(format!("creator-{}", user.id));

        let mut org_ids: Vec<String> = self
            .directory
            .get_user_org_ids(user)
            .await?
            .into_iter()
            .collect();
        org_ids.sort();
        labels.extend(org_ids.iter().map(|org| format!("member-{}", org)));

        labels.extend(
            self.resolver
                .readable_resources(user)
                .await?
                .iter()
                .map(|(resource_id, _)| acl_label(resource_id)),
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(private: bool, owner_org: Option<&str>, creator: Option<&str>) -> PackageInfo {
        PackageInfo {
            id: "p-1".to_string(),
            private,
            owner_org: owner_org.map(str::to_string),
            creator_user_id: creator.map(str::to_string),
        }
    }

    #[test]
    fn test_baseline_labels() {
        assert_eq!(baseline_dataset_labels(&package(false, Some("o"), None)), vec!["public"]);
        assert_eq!(
            baseline_dataset_labels(&package(true, Some("o"), Some("u"))),
            vec!["member-o"]
        );
        assert_eq!(
            baseline_dataset_labels(&package(true, None, Some("u"))),
            vec!["creator-u"]
        );
    }

    #[test]
    fn test_dataset_labels_add_one_label_per_resource() {
        let resources = vec![
            ResourceInfo {
                id: "r-1".to_string(),
                package_id: "p-1".to_string(),
            },
            ResourceInfo {
                id: "r-2".to_string(),
                package_id: "p-1".to_string(),
            },
        ];
        assert_eq!(
            dataset_labels(&package(true, Some("o"), None), &resources),
            vec!["member-o", "acl-r-1", "acl-r-2"]
        );
    }
}
