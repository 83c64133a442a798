//! VRF output and proof computation.
//!
//! Evaluates the oracle's ECVRF over `request_id || seed`, where `seed` is
//! the value stored on the request account (already mixed with the
//! requester and slot on-chain). The output is deterministic for a given
//! key and input, and the proof lets the program check it without the key.

use vrf_core::vrf::{Proof, Randomness, SecretKey};

/// Output and proof for one request, ready to submit.
#[derive(Debug, Clone)]
pub struct Fulfillment {
    pub randomness: Randomness,
    pub proof: Proof,
}

/// Compute the fulfillment for a randomness request.
///
/// ```text
/// (randomness, proof) = ECVRF_prove(secret, request_id_le || seed)
/// ```
pub fn compute_fulfillment(secret: &SecretKey, seed: &[u8; 32], request_id: u64) -> Fulfillment {
    let (randomness, proof) = secret.prove(seed, request_id);
    Fulfillment { randomness, proof }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrf_core::vrf::verify;

    fn secret() -> SecretKey {
        SecretKey::from_bytes(&[0x11; 32])
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let seed = [1u8; 32];

        let f1 = compute_fulfillment(&secret(), &seed, 1);
        let f2 = compute_fulfillment(&secret(), &seed, 1);
        assert_eq!(f1.randomness, f2.randomness);
        assert_eq!(f1.proof, f2.proof);
    }

    #[test]
    fn different_for_different_seeds() {
        let f1 = compute_fulfillment(&secret(), &[1u8; 32], 1);
        let f2 = compute_fulfillment(&secret(), &[2u8; 32], 1);
        assert_ne!(f1.randomness, f2.randomness);
    }

    #[test]
    fn different_for_different_ids() {
        let seed = [1u8; 32];

        let f1 = compute_fulfillment(&secret(), &seed, 1);
        let f2 = compute_fulfillment(&secret(), &seed, 2);
        assert_ne!(f1.randomness, f2.randomness);
    }

    #[test]
    fn proof_verifies_against_public_key() {
        let sk = secret();
        let seed = [9u8; 32];
        let f = compute_fulfillment(&sk, &seed, 42);
        assert!(verify(&sk.verifying_key(), &seed, 42, &f.randomness, f.proof.as_bytes()));
    }
}
