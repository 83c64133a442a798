//! Application configuration loaded from environment variables.
//!
//! Required: `VRF_SECRET_KEY`, `PROGRAM_ID`
//! Optional: `RPC_URL`, `WS_URL`, `OPERATOR_KEYPAIR_PATH`, `DICE_PROGRAM_ID`,
//!           `CLUSTER`, `HTTP_PORT`, `MAX_RETRIES`, `INITIAL_RETRY_DELAY_MS`,
//!           `PRIORITY_FEE_MICRO_LAMPORTS`, `COMPUTE_UNIT_LIMIT`,
//!           `FULFILLMENT_CONCURRENCY`

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::str::FromStr;
use std::sync::Arc;
use vrf_core::vrf::SecretKey;

/// Compute units requested for a fulfillment. Proof verification runs
/// ristretto255 arithmetic on-chain, so the default is the runtime maximum.
const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Application configuration for the oracle operator.
#[derive(Clone)]
pub struct AppConfig {
    /// Solana JSON-RPC endpoint (HTTP).
    pub rpc_url: String,
    /// Solana PubSub endpoint (WebSocket) for log subscriptions.
    pub ws_url: String,
    /// Keypair that signs and pays for fulfillment transactions. Must match
    /// the oracle's configured operator.
    pub operator_keypair: Arc<Keypair>,
    /// ECVRF secret key. Its verifying key is fixed in the oracle config.
    pub vrf_secret: Arc<SecretKey>,
    /// The deployed oracle program ID.
    pub program_id: Pubkey,
    /// The roll-dice consumer program ID (for deriving callback accounts).
    pub dice_program_id: Option<Pubkey>,
    /// Cluster name for explorer URLs.
    pub cluster: String,
    /// HTTP server port.
    pub http_port: u16,
    /// Maximum retry attempts per fulfillment.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Priority fee in micro-lamports per compute unit.
    pub priority_fee_micro_lamports: u64,
    /// Compute unit limit requested for each fulfillment transaction.
    pub compute_unit_limit: u32,
    /// Maximum concurrent fulfillment tasks.
    pub fulfillment_concurrency: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8899".into());
        let ws_url = std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8900".into());

        let keypair_path = std::env::var("OPERATOR_KEYPAIR_PATH")
            .unwrap_or_else(|_| "~/.config/solana/id.json".into());
        let keypair_path = shellexpand::tilde(&keypair_path).to_string();
        let operator_keypair = read_keypair_file(&keypair_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to read keypair from {keypair_path}"))?;

        let secret_hex =
            std::env::var("VRF_SECRET_KEY").context("VRF_SECRET_KEY env var must be set")?;
        let vrf_secret = SecretKey::from_bytes(&parse_secret_key(&secret_hex)?);

        let program_id_str = std::env::var("PROGRAM_ID").context("PROGRAM_ID env var must be set")?;
        let program_id = Pubkey::from_str(&program_id_str)
            .with_context(|| format!("invalid PROGRAM_ID: {program_id_str}"))?;

        let dice_program_id = std::env::var("DICE_PROGRAM_ID")
            .ok()
            .and_then(|s| Pubkey::from_str(&s).ok());

        let cluster =
            std::env::var("CLUSTER").unwrap_or_else(|_| "devnet".into());

        Ok(Self {
            rpc_url,
            ws_url,
            operator_keypair: Arc::new(operator_keypair),
            vrf_secret: Arc::new(vrf_secret),
            program_id,
            dice_program_id,
            cluster,
            http_port: env_or("HTTP_PORT", 8080),
            max_retries: env_or("MAX_RETRIES", 5),
            initial_retry_delay_ms: env_or("INITIAL_RETRY_DELAY_MS", 500),
            priority_fee_micro_lamports: env_or("PRIORITY_FEE_MICRO_LAMPORTS", 0),
            compute_unit_limit: env_or("COMPUTE_UNIT_LIMIT", DEFAULT_COMPUTE_UNIT_LIMIT),
            fulfillment_concurrency: env_or("FULFILLMENT_CONCURRENCY", 4),
        })
    }

    /// Return the Solscan explorer URL for a given transaction signature.
    pub fn explorer_url(&self, signature: &str) -> String {
        match self.cluster.as_str() {
            "mainnet-beta" => format!("https://solscan.io/tx/{signature}"),
            cluster => format!("https://solscan.io/tx/{signature}?cluster={cluster}"),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
/// or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Decode the 32-byte VRF secret from 64 hex characters.
fn parse_secret_key(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value.trim()).context("VRF_SECRET_KEY is not valid hex")?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("VRF_SECRET_KEY must be 32 bytes, got {}", b.len()))?;
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_secret() {
        let secret = parse_secret_key(&"ab".repeat(32)).unwrap();
        assert_eq!(secret, [0xab; 32]);
        assert!(parse_secret_key(&format!(" {} \n", "01".repeat(32))).is_ok());
    }

    #[test]
    fn rejects_bad_secret() {
        assert!(parse_secret_key("zz").is_err());
        assert!(parse_secret_key(&"ab".repeat(31)).is_err());
    }

    #[test]
    fn missing_numeric_var_uses_default() {
        assert_eq!(env_or("VRF_OPERATOR_TEST_UNSET_VARIABLE", 7u32), 7);
    }
}
