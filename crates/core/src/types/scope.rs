//! Contact scopes and access kinds.

use serde::{Deserialize, Serialize};

/// Which contact collection a list or search request targets.
///
/// Mirrors the host's storage names: `personal`, `shared`, `team`, `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactScope {
    /// The caller's own contacts.
    Personal,
    /// Contacts other users shared with the caller.
    Shared,
    /// The tenant-wide team address book.
    Team,
    /// Everything the caller can see.
    All,
}

impl ContactScope {
    /// Storage name used by the host contacts API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
            Self::Team => "team",
            Self::All => "all",
        }
    }

    /// Whether a query in this scope must also return team book rows.
    #[must_use]
    pub const fn includes_team(self) -> bool {
        matches!(self, Self::Team | Self::All)
    }
}

impl std::fmt::Display for ContactScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContactScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "shared" => Ok(Self::Shared),
            "team" => Ok(Self::Team),
            "all" => Ok(Self::All),
            _ => Err(format!("invalid contact scope: {s}")),
        }
    }
}

/// Kind of access being requested on a contact or address book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_team_and_all_include_team() {
        assert!(ContactScope::Team.includes_team());
        assert!(ContactScope::All.includes_team());
        assert!(!ContactScope::Personal.includes_team());
        assert!(!ContactScope::Shared.includes_team());
    }

    #[test]
    fn test_parse_round_trips_storage_names() {
        for name in ["personal", "shared", "team", "all"] {
            assert_eq!(name.parse::<ContactScope>().unwrap().as_str(), name);
        }
        assert!("global".parse::<ContactScope>().is_err());
    }
}
