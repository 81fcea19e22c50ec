use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used in activation codes. Skips 0/O/1/I to keep manually
/// typed keys unambiguous.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUPS: usize = 4;
const CODE_GROUP_LEN: usize = 5;

/// A manually-issued, single-use activation key carrying a plan + duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationKey {
    pub id: String,
    pub key: String,
    pub plan: String,
    pub duration_days: i64,
    pub consumed_by: Option<String>,
    pub consumed_at: Option<i64>,
    pub created_at: i64,
}

impl ActivationKey {
    /// Generate a fresh activation code, e.g. `Q7MHZ-K2PFA-X9RNB-D4WTC`.
    pub fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        let mut groups = Vec::with_capacity(CODE_GROUPS);
        for _ in 0..CODE_GROUPS {
            let group: String = (0..CODE_GROUP_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            groups.push(group);
        }
        groups.join("-")
    }

    /// Cheap format check applied before any lookup, so malformed input is
    /// rejected without touching the ledger.
    pub fn code_is_well_formed(code: &str) -> bool {
        let groups: Vec<&str> = code.split('-').collect();
        groups.len() == CODE_GROUPS
            && groups.iter().all(|g| {
                g.len() == CODE_GROUP_LEN && g.bytes().all(|b| CODE_ALPHABET.contains(&b))
            })
    }
}
