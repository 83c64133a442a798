//! ECVRF over ristretto255 with SHA-512.
//!
//! Follows the RFC 9381 structure (hash-to-group, Chaum-Pedersen DLEQ proof,
//! 16-byte challenge) on the prime-order ristretto255 group, so there is no
//! cofactor handling and every valid public key has exactly one output per
//! input.
//!
//! ```text
//! alpha = request_id (8 LE) || seed (32)
//! H     = hash_to_group(Y, alpha)
//! Gamma = x * H
//! proof = Gamma (32) || c (16) || s (32)
//! beta  = SHA-512(SUITE || "output" || Gamma)[..32]
//! ```
//!
//! Verification recomputes `U = s*B - c*Y` and `V = s*H - c*Gamma` and
//! accepts only if the challenge over `(Y, H, Gamma, U, V)` equals `c` and
//! the submitted randomness equals `beta`.
//!
//! With the `solana-syscalls` feature the two multiscalar multiplications
//! run through the runtime's curve25519 syscalls when built for SBF. Off
//! chain the same calls fall back to curve25519-dalek.

use std::fmt;

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
#[cfg(not(feature = "solana-syscalls"))]
use curve25519_dalek::traits::VartimeMultiscalarMul;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroize;

/// Domain tag shared by every hash in the construction.
const SUITE: &[u8] = b"vrf-oracle/ecvrf-ristretto255-sha512/v1";

/// Encoded proof length: `Gamma (32) || c (16) || s (32)`.
pub const PROOF_LENGTH: usize = 80;

/// Length of the challenge scalar encoding.
const CHALLENGE_LENGTH: usize = 16;

/// The 32-byte VRF output delivered to consumers.
pub type Randomness = [u8; 32];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VrfError {
    #[error("verifying key is not a valid ristretto255 point")]
    InvalidVerifyingKey,

    #[error("proof must be 80 bytes, got {0}")]
    InvalidProofLength(usize),
}

/// The oracle's public key `Y = x * B`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey {
    point: RistrettoPoint,
    bytes: [u8; 32],
}

impl VerifyingKey {
    /// Decode a compressed ristretto point. The identity is rejected: a
    /// zero key would let anyone produce accepted proofs.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, VrfError> {
        let point = CompressedRistretto(*bytes)
            .decompress()
            .ok_or(VrfError::InvalidVerifyingKey)?;
        if point.is_identity() {
            return Err(VrfError::InvalidVerifyingKey);
        }
        Ok(Self {
            point,
            bytes: *bytes,
        })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.bytes))
    }
}

/// The operator's secret key. Only the off-chain operator and tests hold one.
pub struct SecretKey {
    scalar: Scalar,
    nonce_key: [u8; 32],
    public: VerifyingKey,
}

impl SecretKey {
    /// Expand a 32-byte secret seed into the signing scalar and the nonce key.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        let scalar = Scalar::from_bytes_mod_order_wide(&hash_wide(&[SUITE, b"scalar", secret]));

        let mut nonce_key = [0u8; 32];
        nonce_key.copy_from_slice(
            &Sha256::new()
                .chain_update(SUITE)
                .chain_update(b"nonce")
                .chain_update(secret)
                .finalize(),
        );

        let point = RISTRETTO_BASEPOINT_POINT * scalar;
        let public = VerifyingKey {
            point,
            bytes: point.compress().to_bytes(),
        };

        Self {
            scalar,
            nonce_key,
            public,
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.public
    }

    /// Evaluate the VRF for `(request_id, seed)` and return the output with
    /// its proof. Deterministic: the nonce is derived from the secret and `H`.
    pub fn prove(&self, seed: &[u8; 32], request_id: u64) -> (Randomness, Proof) {
        let alpha = vrf_input(request_id, seed);
        let h = hash_to_group(&self.public.bytes, &alpha);
        let gamma = h * self.scalar;

        let k = Scalar::from_bytes_mod_order_wide(&hash_wide(&[
            SUITE,
            b"nonce",
            &self.nonce_key,
            h.compress().as_bytes(),
        ]));
        let u = RISTRETTO_BASEPOINT_POINT * k;
        let v = h * k;

        let gamma = gamma.compress().to_bytes();
        let c = challenge(
            &self.public.bytes,
            &h.compress().to_bytes(),
            &gamma,
            &u.compress().to_bytes(),
            &v.compress().to_bytes(),
        );
        let s = k + challenge_scalar(&c) * self.scalar;

        let mut bytes = [0u8; PROOF_LENGTH];
        bytes[..32].copy_from_slice(&gamma);
        bytes[32..48].copy_from_slice(&c);
        bytes[48..].copy_from_slice(s.as_bytes());

        (proof_to_hash(&gamma), Proof(bytes))
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.scalar.zeroize();
        self.nonce_key.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// An encoded VRF proof.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Proof(pub [u8; PROOF_LENGTH]);

impl Proof {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VrfError> {
        let bytes: [u8; PROOF_LENGTH] = bytes
            .try_into()
            .map_err(|_| VrfError::InvalidProofLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PROOF_LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    fn gamma(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[..32]);
        out
    }

    fn challenge(&self) -> [u8; CHALLENGE_LENGTH] {
        let mut out = [0u8; CHALLENGE_LENGTH];
        out.copy_from_slice(&self.0[32..48]);
        out
    }

    fn response(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[48..]);
        out
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({})", hex::encode(self.0))
    }
}

/// Check that `randomness` is the VRF output of `(request_id, seed)` under
/// `key` and that `proof` proves it.
///
/// Pure and deterministic. Returns `false` for every malformed input
/// (wrong proof length, undecodable or identity `Gamma`, non-canonical `s`)
/// as well as for proofs that fail the verification equation.
pub fn verify(
    key: &VerifyingKey,
    seed: &[u8; 32],
    request_id: u64,
    randomness: &Randomness,
    proof: &[u8],
) -> bool {
    let Ok(proof) = Proof::from_slice(proof) else {
        return false;
    };

    // Ristretto encodings are canonical, so the identity is exactly the
    // all-zero encoding.
    let gamma = proof.gamma();
    if gamma == [0u8; 32] {
        return false;
    }
    if proof_to_hash(&gamma) != *randomness {
        return false;
    }

    let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(proof.response())) else {
        return false;
    };
    let c_bytes = proof.challenge();
    let c = challenge_scalar(&c_bytes);

    let alpha = vrf_input(request_id, seed);
    let h = hash_to_group(&key.bytes, &alpha).compress().to_bytes();

    let Some((u, v)) = commitments(key, &h, &gamma, &s, &c) else {
        return false;
    };
    challenge(&key.bytes, &h, &gamma, &u, &v) == c_bytes
}

/// Compressed `U = s*B - c*Y` and `V = s*H - c*Gamma`, or `None` if `H` or
/// `Gamma` does not decode.
#[cfg(not(feature = "solana-syscalls"))]
fn commitments(
    key: &VerifyingKey,
    h: &[u8; 32],
    gamma: &[u8; 32],
    s: &Scalar,
    c: &Scalar,
) -> Option<([u8; 32], [u8; 32])> {
    let h = CompressedRistretto(*h).decompress()?;
    let gamma = CompressedRistretto(*gamma).decompress()?;
    let neg_c = -c;

    let u = RistrettoPoint::vartime_double_scalar_mul_basepoint(&neg_c, &key.point, s);
    let v = RistrettoPoint::vartime_multiscalar_mul([*s, neg_c], [h, gamma]);
    Some((u.compress().to_bytes(), v.compress().to_bytes()))
}

#[cfg(feature = "solana-syscalls")]
fn commitments(
    key: &VerifyingKey,
    h: &[u8; 32],
    gamma: &[u8; 32],
    s: &Scalar,
    c: &Scalar,
) -> Option<([u8; 32], [u8; 32])> {
    use curve25519_dalek::constants::RISTRETTO_BASEPOINT_COMPRESSED;
    use solana_curve25519::ristretto::{
        multiscalar_multiply_ristretto, validate_ristretto, PodRistrettoPoint,
    };
    use solana_curve25519::scalar::PodScalar;

    let gamma = PodRistrettoPoint(*gamma);
    if !validate_ristretto(&gamma) {
        return None;
    }
    let scalars = [PodScalar(s.to_bytes()), PodScalar((-c).to_bytes())];

    let u = multiscalar_multiply_ristretto(
        &scalars,
        &[
            PodRistrettoPoint(RISTRETTO_BASEPOINT_COMPRESSED.to_bytes()),
            PodRistrettoPoint(key.bytes),
        ],
    )?;
    let v = multiscalar_multiply_ristretto(&scalars, &[PodRistrettoPoint(*h), gamma])?;
    Some((u.0, v.0))
}

/// Serialize the VRF input for a request: `request_id (8 LE) || seed (32)`.
pub fn vrf_input(request_id: u64, seed: &[u8; 32]) -> [u8; 40] {
    let mut alpha = [0u8; 40];
    alpha[..8].copy_from_slice(&request_id.to_le_bytes());
    alpha[8..].copy_from_slice(seed);
    alpha
}

/// Derive the seed stored with a request from the caller's seed, the
/// requester identity and the slot the request was created in.
///
/// ```text
/// seed = SHA-256(SUITE || "seed" || caller_seed || requester || slot (8 LE))
/// ```
pub fn derive_seed(caller_seed: &[u8; 32], requester: &[u8; 32], slot: u64) -> [u8; 32] {
    let digest = Sha256::new()
        .chain_update(SUITE)
        .chain_update(b"seed")
        .chain_update(caller_seed)
        .chain_update(requester)
        .chain_update(slot.to_le_bytes())
        .finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    seed
}

fn hash_wide(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn hash_to_group(key: &[u8; 32], alpha: &[u8]) -> RistrettoPoint {
    RistrettoPoint::from_uniform_bytes(&hash_wide(&[SUITE, b"h2c", key, alpha]))
}

fn challenge(
    key: &[u8; 32],
    h: &[u8; 32],
    gamma: &[u8; 32],
    u: &[u8; 32],
    v: &[u8; 32],
) -> [u8; CHALLENGE_LENGTH] {
    let digest = hash_wide(&[SUITE, b"challenge", key, h, gamma, u, v]);
    let mut c = [0u8; CHALLENGE_LENGTH];
    c.copy_from_slice(&digest[..CHALLENGE_LENGTH]);
    c
}

fn challenge_scalar(c: &[u8; CHALLENGE_LENGTH]) -> Scalar {
    let mut bytes = [0u8; 32];
    bytes[..CHALLENGE_LENGTH].copy_from_slice(c);
    Scalar::from_bytes_mod_order(bytes)
}

fn proof_to_hash(gamma: &[u8; 32]) -> Randomness {
    let digest = hash_wide(&[SUITE, b"output", gamma]);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}
