//! Deterministic hashing: snapshot lookup digests and salted user bucketing.
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Name-hashing algorithm applied by the server to the keys of a snapshot.
///
/// The snapshot response declares which algorithm was used (`hashUsed`), and
/// lookups digest the client-facing name with the same algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, base64-encoded.
    #[default]
    Sha256,
    /// 32-bit DJB2, rendered as a decimal string.
    Djb2,
    /// Keys are plain names (possibly carrying a rule-versioning qualifier).
    None,
}

/// Digest `input` the way snapshot keys are digested.
///
/// Deterministic and stable across platforms and process restarts: lookup
/// keys computed on the client must match keys computed by the server.
pub fn hashed_name(input: &str, algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => BASE64_STANDARD.encode(Sha256::digest(input.as_bytes())),
        HashAlgorithm::Djb2 => djb2(input),
        HashAlgorithm::None => input.to_owned(),
    }
}

// 32-bit DJB2 variant over UTF-16 code units, matching the digests produced
// by the server and by SDKs on JS-like runtimes.
fn djb2(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    (hash as u32).to_string()
}

/// Deterministic string-to-`u64` digest used for bucketing decisions.
///
/// `hash` is a pure function: identical input always produces an identical
/// digest, on every platform, so bucketing decisions agree between the client
/// and any server-side recomputation. The empty string is a valid input.
pub trait HashProvider {
    /// Digest `input` into a fixed-width integer.
    fn hash(&self, input: &str) -> u64;

    /// Bucket `input` into `[0, 10_000)`.
    fn bucket(&self, input: &str) -> u64 {
        self.hash(input) % TOTAL_BUCKETS
    }

    /// Bucket `input` into the unit interval `[0, 1)`.
    fn unit(&self, input: &str) -> f64 {
        self.bucket(input) as f64 / TOTAL_BUCKETS as f64
    }
}

const TOTAL_BUCKETS: u64 = 10_000;

/// The default [`HashProvider`]: first 8 bytes of the SHA-256 digest,
/// big-endian.
pub struct Sha256HashProvider;

impl HashProvider for Sha256HashProvider {
    fn hash(&self, input: &str) -> u64 {
        let digest = Sha256::digest(input.as_bytes());
        u64::from_be_bytes(digest[0..8].try_into().unwrap())
    }
}

/// Composite bucketing key: `"{salt}.{rule_salt}.{unit_id}"`.
///
/// A rule passes a percentage rollout when
/// `bucket(bucket_key(..)) < percentage * 100`.
pub fn bucket_key(salt: &str, rule_salt: &str, unit_id: &str) -> String {
    format!("{salt}.{rule_salt}.{unit_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_name_digest_is_stable() {
        // echo -n "true_gate" | openssl dgst -sha256 -binary | base64
        assert_eq!(
            hashed_name("true_gate", HashAlgorithm::Sha256),
            "gLZpXc53IbbV/RJJf2J9KZh1VsBfuTsFyIPbxrTv2Ns="
        );
        assert_eq!(
            hashed_name("true_gate", HashAlgorithm::Sha256),
            hashed_name("true_gate", HashAlgorithm::Sha256),
        );
    }

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(hashed_name("", HashAlgorithm::Djb2), "0");
        assert_eq!(hashed_name("a", HashAlgorithm::Djb2), "97");
        assert_eq!(hashed_name("true_gate", HashAlgorithm::Djb2), "1346754780");
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(hashed_name("a_config!", HashAlgorithm::None), "a_config!");
    }

    #[test]
    fn digest_is_deterministic_and_defined_for_empty_input() {
        let hasher = Sha256HashProvider;
        assert_eq!(hasher.hash(""), hasher.hash(""));
        assert_eq!(hasher.hash("user-1.salt"), hasher.hash("user-1.salt"));
        assert_ne!(hasher.hash("user-1.salt"), hasher.hash("user-2.salt"));
    }

    #[test]
    fn buckets_are_in_range() {
        let hasher = Sha256HashProvider;
        for i in 0..100 {
            let key = bucket_key("layer_salt", "rule_salt", &format!("user-{i}"));
            assert!(hasher.bucket(&key) < 10_000);
            let unit = hasher.unit(&key);
            assert!((0.0..1.0).contains(&unit));
        }
    }

    #[test]
    fn hash_algorithm_parses_from_wire() {
        assert_eq!(
            serde_json::from_str::<HashAlgorithm>("\"djb2\"").unwrap(),
            HashAlgorithm::Djb2
        );
        assert_eq!(
            serde_json::from_str::<HashAlgorithm>("\"none\"").unwrap(),
            HashAlgorithm::None
        );
    }
}
