use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fine-grained capability, grouped by domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    // Report
    #[serde(rename = "CREATE-REPORT")]
    CreateReport,
    #[serde(rename = "READ-REPORT")]
    ReadReport,
    #[serde(rename = "UPDATE-REPORT")]
    UpdateReport,
    #[serde(rename = "DELETE-REPORT")]
    DeleteReport,
    #[serde(rename = "AUDIT-REPORT")]
    AuditReport,

    // Claim
    #[serde(rename = "CREATE-CLAIM")]
    CreateClaim,
    #[serde(rename = "READ-CLAIM")]
    ReadClaim,
    #[serde(rename = "UPDATE-CLAIM")]
    UpdateClaim,
    #[serde(rename = "MARK-CLAIMED")]
    MarkClaimed,
    #[serde(rename = "DELETE-CLAIM")]
    DeleteClaim,

    // Account
    #[serde(rename = "READ-ACCOUNT")]
    ReadAccount,
    #[serde(rename = "CREATE-ACCOUNT")]
    CreateAccount,
    #[serde(rename = "UPDATE-ACCOUNT")]
    UpdateAccount,
    #[serde(rename = "DELETE-ACCOUNT")]
    DeleteAccount,

    // System
    #[serde(rename = "READ-CATEGORY")]
    ReadCategory,
    #[serde(rename = "MANAGE-CATEGORY")]
    ManageCategory,
    #[serde(rename = "READ-ACTIVITY")]
    ReadActivity,
}

/// Domain a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDomain {
    Report,
    Claim,
    Account,
    System,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::CreateReport,
        Permission::ReadReport,
        Permission::UpdateReport,
        Permission::DeleteReport,
        Permission::AuditReport,
        Permission::CreateClaim,
        Permission::ReadClaim,
        Permission::UpdateClaim,
        Permission::MarkClaimed,
        Permission::DeleteClaim,
        Permission::ReadAccount,
        Permission::CreateAccount,
        Permission::UpdateAccount,
        Permission::DeleteAccount,
        Permission::ReadCategory,
        Permission::ManageCategory,
        Permission::ReadActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateReport => "CREATE-REPORT",
            Permission::ReadReport => "READ-REPORT",
            Permission::UpdateReport => "UPDATE-REPORT",
            Permission::DeleteReport => "DELETE-REPORT",
            Permission::AuditReport => "AUDIT-REPORT",
            Permission::CreateClaim => "CREATE-CLAIM",
            Permission::ReadClaim => "READ-CLAIM",
            Permission::UpdateClaim => "UPDATE-CLAIM",
            Permission::MarkClaimed => "MARK-CLAIMED",
            Permission::DeleteClaim => "DELETE-CLAIM",
            Permission::ReadAccount => "READ-ACCOUNT",
            Permission::CreateAccount => "CREATE-ACCOUNT",
            Permission::UpdateAccount => "UPDATE-ACCOUNT",
            Permission::DeleteAccount => "DELETE-ACCOUNT",
            Permission::ReadCategory => "READ-CATEGORY",
            Permission::ManageCategory => "MANAGE-CATEGORY",
            Permission::ReadActivity => "READ-ACTIVITY",
        }
    }

    pub fn domain(&self) -> PermissionDomain {
        match self {
            Permission::CreateReport
            | Permission::ReadReport
            | Permission::UpdateReport
            | Permission::DeleteReport
            | Permission::AuditReport => PermissionDomain::Report,
            Permission::CreateClaim
            | Permission::ReadClaim
            | Permission::UpdateClaim
            | Permission::MarkClaimed
            | Permission::DeleteClaim => PermissionDomain::Claim,
            Permission::ReadAccount
            | Permission::CreateAccount
            | Permission::UpdateAccount
            | Permission::DeleteAccount => PermissionDomain::Account,
            Permission::ReadCategory | Permission::ManageCategory | Permission::ReadActivity => {
                PermissionDomain::System
            }
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// One argument of the `permissions!` macro: a single permission or a list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionArg {
    One(Permission),
    Many(Vec<Permission>),
}

impl From<Permission> for PermissionArg {
    fn from(value: Permission) -> Self {
        PermissionArg::One(value)
    }
}

impl From<Vec<Permission>> for PermissionArg {
    fn from(value: Vec<Permission>) -> Self {
        PermissionArg::Many(value)
    }
}

impl From<&[Permission]> for PermissionArg {
    fn from(value: &[Permission]) -> Self {
        PermissionArg::Many(value.to_vec())
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionArg {
    fn from(value: [Permission; N]) -> Self {
        PermissionArg::Many(value.to_vec())
    }
}

/// Flattens arguments one level, keeping declaration order and duplicates.
pub fn flatten_permissions<I>(args: I) -> Vec<Permission>
where
    I: IntoIterator<Item = PermissionArg>,
{
    let mut out = Vec::new();
    for arg in args {
        match arg {
            PermissionArg::One(p) => out.push(p),
            PermissionArg::Many(list) => out.extend(list),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use Permission::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>(), Ok(p));
            assert_eq!(serde_json::to_value(p).unwrap(), serde_json::json!(p.as_str()));
        }
    }

    #[test]
    fn flatten_mixes_singles_and_lists() {
        let flat = flatten_permissions(vec![
            PermissionArg::from(CreateClaim),
            PermissionArg::from([ReadClaim, UpdateClaim]),
        ]);
        assert_eq!(flat, vec![CreateClaim, ReadClaim, UpdateClaim]);
    }

    #[test]
    fn flatten_concatenates_lists_in_order() {
        let flat = flatten_permissions(vec![
            PermissionArg::from(vec![CreateReport, ReadReport]),
            PermissionArg::from(vec![UpdateReport, DeleteReport]),
        ]);
        assert_eq!(flat, vec![CreateReport, ReadReport, UpdateReport, DeleteReport]);
    }

    #[test]
    fn flatten_of_nothing_is_empty() {
        assert!(flatten_permissions(Vec::<PermissionArg>::new()).is_empty());
    }

    #[test]
    fn flatten_keeps_duplicates() {
        let flat = flatten_permissions(vec![
            PermissionArg::from(ReadReport),
            PermissionArg::from([ReadReport]),
        ]);
        assert_eq!(flat, vec![ReadReport, ReadReport]);
    }

    #[test]
    fn domains_group_permissions() {
        assert_eq!(MarkClaimed.domain(), PermissionDomain::Claim);
        assert_eq!(AuditReport.domain(), PermissionDomain::Report);
        assert_eq!(DeleteAccount.domain(), PermissionDomain::Account);
        assert_eq!(ManageCategory.domain(), PermissionDomain::System);
    }
}
