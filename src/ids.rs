//! Identifier generation: push keys, user ids and session tokens.
//!
//! Push keys are 20 characters: 8 characters encoding the millisecond
//! timestamp followed by 12 random characters, all drawn from a 64-symbol
//! alphabet whose ASCII order matches its numeric order.  Keys generated in
//! the same millisecond increment the random tail, so lexicographic order of
//! keys is creation order within a process.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const UID_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const PUSH_ID_LEN: usize = 20;
pub const UID_LEN: usize = 28;

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    last_millis: u64,
    last_rand: [u8; 12],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next key for `now_millis`.
    pub fn next_id(&mut self, now_millis: u64) -> String {
        // Never go backwards: a clock step back reuses the previous
        // millisecond and bumps the random tail instead.
        let millis = now_millis.max(self.last_millis);
        if millis == self.last_millis && self.last_millis != 0 {
            increment(&mut self.last_rand);
        } else {
            let mut rng = OsRng;
            for slot in self.last_rand.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        }
        self.last_millis = millis;

        let mut out = [0u8; PUSH_ID_LEN];
        let mut ts = millis;
        for i in (0..8).rev() {
            out[i] = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        for (i, r) in self.last_rand.iter().enumerate() {
            out[8 + i] = PUSH_CHARS[*r as usize];
        }
        out.iter().map(|&b| b as char).collect()
    }
}

fn increment(digits: &mut [u8; 12]) {
    for d in digits.iter_mut().rev() {
        if *d < 63 {
            *d += 1;
            return;
        }
        *d = 0;
    }
}

/// A fresh alphanumeric user id, shaped like an identity provider uid.
pub fn new_uid() -> String {
    let mut rng = OsRng;
    (0..UID_LEN)
        .map(|_| UID_CHARS[rng.gen_range(0..UID_CHARS.len())] as char)
        .collect()
}

/// 32 random bytes, hex encoded.
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 16 random bytes, hex encoded, used as a password salt.
pub fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_ids_have_fixed_length_and_alphabet() {
        let mut gen = PushIdGenerator::new();
        let id = gen.next_id(1_700_000_000_000);
        assert_eq!(id.len(), PUSH_ID_LEN);
        assert!(id.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn push_ids_sort_in_creation_order() {
        let mut gen = PushIdGenerator::new();
        let a = gen.next_id(1_700_000_000_000);
        let b = gen.next_id(1_700_000_000_000);
        let c = gen.next_id(1_700_000_000_001);
        let d = gen.next_id(1_699_999_999_000);
        assert!(a < b, "{a} !< {b}");
        assert!(b < c, "{b} !< {c}");
        assert!(c < d, "clock step back must not reorder: {c} !< {d}");
    }

    #[test]
    fn uids_are_alphanumeric() {
        let uid = new_uid();
        assert_eq!(uid.len(), UID_LEN);
        assert!(uid.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(uid, new_uid());
    }

    #[test]
    fn tokens_are_hex() {
        let t = new_token();
        assert_eq!(t.len(), 64);
        assert!(hex::decode(&t).is_ok());
    }
}
