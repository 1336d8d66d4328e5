//! Provably-fair game generation.
//!
//! Each game hash is HMAC-SHA256'd with a fixed public salt; the first
//! 52 bits of the digest pick the crash point. The next game's hash is the
//! SHA-256 of the current hash's hex string.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::{CrashError, GameResult};

type HmacSha256 = Hmac<Sha256>;

/// Public salt mixed into every game hash.
pub const GAME_SALT: &str = "0000000000000000004d6ec16dafe9d8370958664c1dc422f452892264c59526";

/// Number of leading hex digits (52 bits) used from the digest.
const HEX_DIGITS: usize = 13;

/// Crash point for a single game hash.
pub fn crash_point(hash: &str) -> Result<f64, CrashError> {
    let bytes = hex::decode(hash).map_err(|e| CrashError::InvalidHash(format!("{hash}: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(GAME_SALT.as_bytes())
        .map_err(|e| CrashError::InvalidHash(e.to_string()))?;
    mac.update(&bytes);
    let digest = hex::encode(mac.finalize().into_bytes());

    let int = u64::from_str_radix(&digest[..HEX_DIGITS], 16)
        .map_err(|e| CrashError::InvalidHash(e.to_string()))?;
    let x = int as f64 / 2f64.powi(52);

    Ok(((100.0 / (1.0 - x)).floor() / 101.0).max(1.0))
}

/// Hash of the game following `hash` in the chain.
pub fn next_hash(hash: &str) -> String {
    hex::encode(Sha256::digest(hash.as_bytes()))
}

/// Generate `count` games starting at `seed`.
pub fn generate_games(seed: &str, count: usize) -> Result<Vec<GameResult>, CrashError> {
    let mut games = Vec::with_capacity(count);
    let mut hash = seed.to_lowercase();

    for _ in 0..count {
        let bust = crash_point(&hash)?;
        let next = next_hash(&hash);
        games.push(GameResult { hash, bust });
        hash = next;
    }

    Ok(games)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
