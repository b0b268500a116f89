//! Permission kinds and the stateless catalog mapping them to roles and
//! grant situations.

use std::str::FromStr;

use advocase_core::AppError;
use serde::{Deserialize, Serialize};

use crate::ids::{DefendantId, PermissionId, UserId};

/// Kinds of material access that can be granted against a defence client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// Allows viewing the defendant record and case materials index.
    ViewDefendant,
    /// Allows viewing uploaded case documents.
    ViewDocument,
    /// Allows uploading case documents.
    UploadDocument,
}

impl PermissionKind {
    /// Returns a stable storage value for this permission kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewDefendant => "defendant.view",
            Self::ViewDocument => "document.view",
            Self::UploadDocument => "document.upload",
        }
    }

    /// Returns all known permission kinds.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionKind] = &[
            PermissionKind::ViewDefendant,
            PermissionKind::ViewDocument,
            PermissionKind::UploadDocument,
        ];

        ALL
    }
}

impl FromStr for PermissionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "defendant.view" => Ok(Self::ViewDefendant),
            "document.view" => Ok(Self::ViewDocument),
            "document.upload" => Ok(Self::UploadDocument),
            _ => Err(AppError::Validation(format!(
                "unknown permission kind '{value}'"
            ))),
        }
    }
}

/// A granted capability tuple, not a relationship: multiple permissions
/// may exist per (source, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable permission identifier.
    pub permission_id: PermissionId,
    /// Kind of access granted.
    pub kind: PermissionKind,
    /// Grantee user holding the capability.
    pub source: UserId,
    /// Defence client the capability applies to.
    pub target: DefendantId,
}

/// Stateless lookup of permission kinds for grant situations.
pub struct PermissionCatalog;

impl PermissionCatalog {
    /// Returns the permission kinds for a grant, given whether the
    /// grantee belongs to the organisation associated with the case.
    ///
    /// Every grant carries defendant visibility. Document permissions are
    /// only tracked for external grantees; an associated-organisation
    /// member already holds them implicitly.
    #[must_use]
    pub fn kinds_for_grant(grantee_is_in_associated_organisation: bool) -> &'static [PermissionKind] {
        const IN_HOUSE: &[PermissionKind] = &[PermissionKind::ViewDefendant];
        const EXTERNAL: &[PermissionKind] = &[
            PermissionKind::ViewDefendant,
            PermissionKind::ViewDocument,
            PermissionKind::UploadDocument,
        ];

        if grantee_is_in_associated_organisation {
            IN_HOUSE
        } else {
            EXTERNAL
        }
    }

    /// Builds the permission tuples for a grant of the given kinds.
    #[must_use]
    pub fn build_grant(
        kinds: &[PermissionKind],
        source: UserId,
        target: DefendantId,
    ) -> Vec<Permission> {
        kinds
            .iter()
            .map(|kind| Permission {
                permission_id: PermissionId::new(),
                kind: *kind,
                source,
                target,
            })
            .collect()
    }
}
