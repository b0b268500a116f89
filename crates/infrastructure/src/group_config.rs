//! Environment-driven configuration of the role-group allow-lists.

use std::env;

use advocase_domain::AllowedGroups;

/// Group allow-list configuration.
///
/// Group names arrive as comma-separated environment values; unset
/// variables fall back to the canonical directory group names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    advocate_groups: Vec<String>,
    defence_lawyer_groups: Vec<String>,
    chambers_admin_groups: Vec<String>,
}

impl GroupConfig {
    /// Environment variable naming the advocate groups.
    pub const ADVOCATE_GROUPS_VAR: &'static str = "ADVOCASE_ADVOCATE_GROUPS";
    /// Environment variable naming the defence lawyer groups.
    pub const DEFENCE_LAWYER_GROUPS_VAR: &'static str = "ADVOCASE_DEFENCE_LAWYER_GROUPS";
    /// Environment variable naming the chambers admin groups.
    pub const CHAMBERS_ADMIN_GROUPS_VAR: &'static str = "ADVOCASE_CHAMBERS_ADMIN_GROUPS";

    /// Loads the configuration from process environment variables.
    #[must_use]
    pub fn load() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            advocate_groups: groups_from(lookup(Self::ADVOCATE_GROUPS_VAR), "Advocates"),
            defence_lawyer_groups: groups_from(
                lookup(Self::DEFENCE_LAWYER_GROUPS_VAR),
                "Defence Lawyers",
            ),
            chambers_admin_groups: groups_from(
                lookup(Self::CHAMBERS_ADMIN_GROUPS_VAR),
                "Chambers Admin",
            ),
        }
    }

    /// Builds the domain allow-lists from this configuration.
    #[must_use]
    pub fn allowed_groups(&self) -> AllowedGroups {
        AllowedGroups::new(
            self.advocate_groups.iter().cloned(),
            self.defence_lawyer_groups.iter().cloned(),
            self.chambers_admin_groups.iter().cloned(),
        )
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::load_with(|_| None)
    }
}

fn groups_from(value: Option<String>, fallback: &str) -> Vec<String> {
    let configured: Vec<String> = value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_owned)
        .collect();

    if configured.is_empty() {
        vec![fallback.to_owned()]
    } else {
        configured
    }
}
