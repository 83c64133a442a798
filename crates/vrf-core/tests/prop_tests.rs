use proptest::prelude::*;

use vrf_core::vrf::{self, PROOF_LENGTH};
use vrf_core::{
    Address, EntropyConsumer, OracleCore, OracleError, ReceiverDirectory, RequestState, SecretKey,
};

const ORACLE: Address = Address([1u8; 32]);
const OPERATOR: Address = Address([3u8; 32]);
const CONSUMER: Address = Address([4u8; 32]);

fn deploy(secret: [u8; 32]) -> (SecretKey, OracleCore, ReceiverDirectory<EntropyConsumer>) {
    let sk = SecretKey::from_bytes(&secret);
    let oracle = OracleCore::new(ORACLE, OPERATOR, OPERATOR, &sk.verifying_key().to_bytes()).unwrap();
    let mut directory = ReceiverDirectory::new();
    directory.insert(CONSUMER, EntropyConsumer::new(CONSUMER, ORACLE));
    (sk, oracle, directory)
}

proptest! {
    /// Request ids are distinct and strictly increasing, whatever the seeds.
    #[test]
    fn request_ids_are_unique(seeds in prop::collection::vec(any::<[u8; 32]>(), 1..40)) {
        let (_, mut oracle, _) = deploy([11u8; 32]);
        let mut last = 0u64;
        for seed in seeds {
            let id = oracle.request_randomness(CONSUMER, seed).unwrap();
            prop_assert!(id > last, "id {} not above previous {}", id, last);
            last = id;
        }
    }

    /// Honest proofs verify for any seed and id.
    #[test]
    fn honest_proofs_verify(secret in any::<[u8; 32]>(), seed in any::<[u8; 32]>(), id in any::<u64>()) {
        let sk = SecretKey::from_bytes(&secret);
        let (randomness, proof) = sk.prove(&seed, id);
        prop_assert!(vrf::verify(&sk.verifying_key(), &seed, id, &randomness, proof.as_bytes()));
    }

    /// Arbitrary bytes are never accepted as a proof.
    #[test]
    fn forged_proofs_are_rejected(
        forged in prop::collection::vec(any::<u8>(), PROOF_LENGTH),
        randomness in any::<[u8; 32]>(),
    ) {
        let (_, mut oracle, mut directory) = deploy([11u8; 32]);
        let id = directory
            .get_mut(&CONSUMER)
            .unwrap()
            .request_entropy(&mut oracle, [2u8; 32])
            .unwrap();

        let result = oracle.fulfill_randomness(OPERATOR, id, randomness, &forged, &mut directory);
        prop_assert_eq!(result, Err(OracleError::VerificationFailed(id)));
        prop_assert_eq!(oracle.request_status(id), RequestState::Pending);
        prop_assert_eq!(directory.get(&CONSUMER).unwrap().randomness(id), None);
    }

    /// An honest `Gamma` and output with any other `(c, s)` fail the
    /// verification equation itself, not the decoding checks.
    #[test]
    fn random_challenge_and_response_are_rejected(
        seed in any::<[u8; 32]>(),
        id in any::<u64>(),
        challenge in any::<[u8; 16]>(),
        response in any::<[u8; 32]>(),
    ) {
        let sk = SecretKey::from_bytes(&[11u8; 32]);
        let (randomness, proof) = sk.prove(&seed, id);
        // Below 2^252, so always a canonical scalar.
        let mut response = response;
        response[31] &= 0x0f;

        let mut forged = *proof.as_bytes();
        forged[32..48].copy_from_slice(&challenge);
        forged[48..].copy_from_slice(&response);
        prop_assume!(forged != *proof.as_bytes());

        prop_assert!(!vrf::verify(&sk.verifying_key(), &seed, id, &randomness, &forged));
    }

    /// A valid `Gamma` and output taken from another key's evaluation of the
    /// same input do not verify under the oracle key.
    #[test]
    fn foreign_gamma_is_rejected(
        other_secret in any::<[u8; 32]>(),
        seed in any::<[u8; 32]>(),
        id in any::<u64>(),
    ) {
        prop_assume!(other_secret != [11u8; 32]);
        let sk = SecretKey::from_bytes(&[11u8; 32]);
        let other = SecretKey::from_bytes(&other_secret);
        let (_, proof) = sk.prove(&seed, id);
        let (other_randomness, other_proof) = other.prove(&seed, id);

        let mut forged = *proof.as_bytes();
        forged[..32].copy_from_slice(&other_proof.as_bytes()[..32]);

        prop_assert!(!vrf::verify(&sk.verifying_key(), &seed, id, &other_randomness, &forged));
        prop_assert!(vrf::verify(&other.verifying_key(), &seed, id, &other_randomness, other_proof.as_bytes()));
    }

    /// Replaying a valid fulfillment never delivers twice.
    #[test]
    fn fulfillment_is_at_most_once(seed in any::<[u8; 32]>(), replays in 1usize..5) {
        let (sk, mut oracle, mut directory) = deploy([11u8; 32]);
        let id = directory
            .get_mut(&CONSUMER)
            .unwrap()
            .request_entropy(&mut oracle, seed)
            .unwrap();
        let stored = oracle.request(id).unwrap().seed;
        let (randomness, proof) = sk.prove(&stored, id);

        oracle
            .fulfill_randomness(OPERATOR, id, randomness, proof.as_bytes(), &mut directory)
            .unwrap();
        for _ in 0..replays {
            let replay = oracle.fulfill_randomness(OPERATOR, id, randomness, proof.as_bytes(), &mut directory);
            prop_assert_eq!(replay, Err(OracleError::AlreadyFulfilled(id)));
        }
        let fulfilled = oracle
            .events()
            .iter()
            .filter(|event| matches!(event, vrf_core::OracleEvent::RandomnessFulfilled { .. }))
            .count();
        prop_assert_eq!(fulfilled, 1);
    }
}
