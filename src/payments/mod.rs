mod pix;

pub use pix::*;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Charge status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderChargeStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

/// A normalized provider status update. Both delivery paths (webhook push
/// and polling) produce this shape and feed the same reconciliation gate;
/// neither is trusted over the other.
///
/// Everything here is untrusted input: the reference must resolve to a
/// stored payment record, and stored plan/duration/amount win over whatever
/// the payload claims.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderNotice {
    #[serde(alias = "externalReference")]
    pub external_reference: String,
    pub status: ProviderChargeStatus,
    #[serde(default, alias = "amount")]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default, alias = "durationDays")]
    pub duration_days: Option<i64>,
}
