use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl PaymentStatus {
    /// Terminal payments ignore all further provider updates.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// One purchase attempt. `external_reference` doubles as the idempotency key
/// for the license extension an approval drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub external_reference: String,
    pub account_id: String,
    pub plan: String,
    pub duration_days: i64,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}
