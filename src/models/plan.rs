use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

/// Purchasable tiers. The plan id is informational on license and payment
/// records; only the duration matters structurally.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Plan {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Plan {
    pub fn duration_days(&self) -> i64 {
        match self {
            Plan::Weekly => 7,
            Plan::Monthly => 30,
            Plan::Quarterly => 90,
            Plan::Yearly => 365,
        }
    }

    /// Price in BRL cents.
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Weekly => 990,
            Plan::Monthly => 2990,
            Plan::Quarterly => 6990,
            Plan::Yearly => 19900,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Weekly => "Weekly",
            Plan::Monthly => "Monthly",
            Plan::Quarterly => "Quarterly",
            Plan::Yearly => "Yearly",
        }
    }
}
