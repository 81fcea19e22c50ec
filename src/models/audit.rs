use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Who requested a hardware reset. Audit-only; both actors share the same
/// cooldown gate unless the admin bypass is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResetActor {
    SelfService,
    Admin,
}

/// Append-only record of a hardware reset. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwidResetAudit {
    pub id: i64,
    pub account_id: String,
    pub actor: ResetActor,
    pub reason: String,
    pub created_at: i64,
}
