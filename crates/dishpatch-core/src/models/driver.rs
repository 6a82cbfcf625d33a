use crate::types::DriverId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform approval state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverApproval {
    /// Registered, documents under review
    Pending,
    /// Allowed to take deliveries
    Approved,
    /// Application turned down
    Rejected,
    /// Blocked after approval
    Suspended,
}

impl DriverApproval {
    /// Wire name stored in documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    /// States a driver may move to `target` from.
    #[must_use]
    pub fn sources_for(target: Self) -> &'static [DriverApproval] {
        match target {
            Self::Pending => &[],
            Self::Approved => &[Self::Pending, Self::Suspended],
            Self::Rejected => &[Self::Pending],
            Self::Suspended => &[Self::Approved],
        }
    }
}

impl fmt::Display for DriverApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery driver, keyed by the driver's auth uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Document ID (auth uid)
    pub id: DriverId,
    /// Full name
    pub name: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Vehicle description
    #[serde(default)]
    pub vehicle: Option<String>,
    /// Approval state
    pub approval_status: DriverApproval,
    /// Presence flag maintained by the delivery app
    #[serde(default)]
    pub online: bool,
    /// Client time of the last presence update
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last write
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Whether the driver can be assigned new orders.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.online && self.approval_status == DriverApproval::Approved
    }
}
