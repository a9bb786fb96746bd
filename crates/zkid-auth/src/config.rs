//! Session configuration.

use serde::{Deserialize, Serialize};
use zkid_zkp::DecimalScale;

/// Settings shared by the sessions of one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a challenge whose request carries no `expires_time`,
    /// in seconds. `None` means such challenges never expire.
    pub default_challenge_ttl_secs: Option<i64>,
    /// Decimal scale of query values.
    pub decimal_scale: DecimalScale,
    /// Profile nonce written to the auth witness.
    pub profile_nonce: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_challenge_ttl_secs: Some(300),
            decimal_scale: DecimalScale::default(),
            profile_nonce: 0,
        }
    }
}
