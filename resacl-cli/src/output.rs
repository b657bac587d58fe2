//! Plain-text rendering of command results

use resacl_authz::{EffectivePermission, GrantSource, ResourceGrant};
use resacl_core::AclEntry;
use std::fmt::Write;

/// Labelled block, one field per line, followed by a blank line
pub fn format_acl(acl: &AclEntry) -> String {
    let mut out = String::new();
    let rows = [
        ("id", acl.id.clone()),
        ("resource id", acl.resource_id.clone()),
        ("auth type", acl.auth_type.to_string()),
        ("auth id", acl.auth_id.clone()),
        ("permission", acl.permission.to_string()),
        ("created", acl.created.to_rfc3339()),
        ("last modified", acl.last_modified.to_rfc3339()),
        ("creator user id", acl.creator_user_id.clone()),
        ("modifier user id", acl.modifier_user_id.clone()),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "{:>16}: {}", label, value);
    }
    out.push('\n');
    out
}

fn describe_source(source: &GrantSource) -> String {
    match source {
        GrantSource::Direct { entry_id } => format!("direct (acl <{}>)", entry_id),
        GrantSource::Inherited { entry_id, org_id } => {
            format!("organization {} (acl <{}>)", org_id, entry_id)
        }
    }
}

pub fn format_resolution(
    resource_id: &str,
    user: &str,
    resolved: Option<&EffectivePermission>,
) -> String {
    match resolved {
        None => format!("no acl record for {} on {}\n", user, resource_id),
        Some(effective) => {
            let mut out = format!(
                "{} on {}: {} via {}\n",
                user,
                resource_id,
                effective.permission,
                describe_source(&effective.source)
            );
            if effective.suppressed_inherited {
                out.push_str("inherited organization read is suppressed\n");
            }
            out
        }
    }
}

pub fn format_grant(grant: &ResourceGrant) -> String {
    format!(
        "{}  {}  {}\n",
        grant.resource_id,
        grant.permission,
        describe_source(&grant.source)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use resacl_core::{AuthType, Permission};

    #[test]
    fn test_acl_block_is_right_aligned() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let acl = AclEntry {
            id: "a-1".to_string(),
            resource_id: "r-1".to_string(),
            auth_type: AuthType::Org,
            auth_id: "o-1".to_string(),
            permission: Permission::Read,
            created: at,
            last_modified: at,
            creator_user_id: "site_user".to_string(),
            modifier_user_id: String::new(),
        };

        let block = format_acl(&acl);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "              id: a-1");
        assert_eq!(lines[2], "       auth type: org");
        assert_eq!(lines[5], "         created: 2024-03-01T12:00:00+00:00");
        assert_eq!(lines[8], "modifier user id: ");
        assert!(block.ends_with("\n\n"));
    }

    #[test]
    fn test_resolution_mentions_suppression() {
        let effective = EffectivePermission {
            permission: Permission::None,
            source: GrantSource::Direct {
                entry_id: "a-2".to_string(),
            },
            suppressed_inherited: true,
        };
        let text = format_resolution("r-1", "alice", Some(&effective));
        assert!(text.starts_with("alice on r-1: none via direct (acl <a-2>)"));
        assert!(text.contains("suppressed"));

        assert_eq!(
            format_resolution("r-1", "bob", None),
            "no acl record for bob on r-1\n"
        );
    }
}
