use crate::types::{Role, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an account may use the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Normal access
    Active,
    /// Blocked by the platform
    Suspended,
}

impl AccountStatus {
    /// Wire name stored in documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    /// Statuses an account may move to `target` from.
    #[must_use]
    pub fn sources_for(target: Self) -> &'static [AccountStatus] {
        match target {
            Self::Active => &[Self::Suspended],
            Self::Suspended => &[Self::Active],
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user profile, keyed by the auth provider uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Document ID (auth uid)
    pub id: UserId,
    /// Sign-in email
    pub email: String,
    /// Name shown in the apps
    #[serde(default)]
    pub display_name: Option<String>,
    /// Role claim mirrored into the profile
    pub role: Role,
    /// Account status
    pub status: AccountStatus,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Reason given for the last suspension
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}
