//! Exit codes the generated contract raises at runtime.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use sha2::{Digest, Sha256};

pub const NULL_REFERENCE: u32 = 128;
pub const INVALID_PREFIX: u32 = 129;
pub const INVALID_MESSAGE: u32 = 130;
pub const CODE_NOT_FOUND: u32 = 135;
pub const INVALID_ADDRESS: u32 = 136;
pub const NOT_BASECHAIN: u32 = 138;

/// Exit code of a failed `require(cond, message)`, derived from the message text.
pub fn require_exit_code(message: &str) -> u32 {
    let digest = Sha256::digest(message.as_bytes());
    let value = BigUint::from_bytes_be(&digest) % 63000u32;
    value.to_u32().unwrap_or_default() + 1000
}
