use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    None,
    Active,
    Expired,
    Revoked,
}

/// The single mutable license record per account.
///
/// `status` is stored but never authoritative on its own: readers derive the
/// effective status from `expires_at` and the current time (see
/// [`LicenseRecord::derived_status`]), and the stored value is lazily
/// corrected on read. `version` guards every write; a mutation carries the
/// version it read and fails if the row moved underneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub account_id: String,
    pub status: LicenseStatus,
    pub plan: Option<String>,
    pub expires_at: Option<i64>,
    pub hardware_id: Option<String>,
    pub last_hwid_reset_at: Option<i64>,
    pub version: i64,
    pub updated_at: i64,
}

impl LicenseRecord {
    /// Effective status as a pure function of the stored record and `now`.
    ///
    /// REVOKED is sticky and only cleared by an explicit admin action.
    pub fn derived_status(&self, now: i64) -> LicenseStatus {
        if self.status == LicenseStatus::Revoked {
            return LicenseStatus::Revoked;
        }
        match self.expires_at {
            None => LicenseStatus::None,
            Some(exp) if exp <= now => LicenseStatus::Expired,
            Some(_) => LicenseStatus::Active,
        }
    }
}

/// Read-only view returned by `evaluate` and the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseSnapshot {
    pub status: LicenseStatus,
    pub plan: Option<String>,
    pub expires_at: Option<i64>,
    pub days_remaining: i64,
    pub hwid: Option<String>,
}
