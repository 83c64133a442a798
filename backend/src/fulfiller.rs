//! Fulfillment engine: consumes randomness request events and submits
//! on-chain fulfillment transactions carrying an ECVRF proof.
//!
//! Each fulfillment transaction contains:
//! 1. A `set_compute_unit_limit` instruction (on-chain proof verification
//!    needs far more than the default budget).
//! 2. (Optional) A `set_compute_unit_price` instruction for priority fees.
//! 3. The `fulfill_randomness` oracle instruction (verifies the proof, flips
//!    the request to `Fulfilled`, CPIs the consumer callback).
//!
//! Every transaction is simulated before it is sent. The simulation reports
//! the compute units the proof check consumed and, on failure, the logs used
//! to attribute the error to the oracle or to the consumer callback.

use anyhow::{Context, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::consumer_accounts::derive_callback_accounts;
use crate::listener::RandomnessRequestedEvent;
use crate::metrics::Metrics;
use crate::prover::{compute_fulfillment, Fulfillment};

const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ComputeBudget111111111111111111111111111111");

/// Oracle error codes after which resubmitting the same fulfillment can never
/// succeed.
const NON_RETRYABLE_CODES: [(u32, &str); 5] = [
    (6000, "RequestNotFound"),
    (6001, "AlreadyFulfilled"),
    (6002, "Unauthorized"),
    (6003, "VerificationFailed"),
    (6004, "InvalidCallbackProgram"),
];

const FAILED_MARKER: &str = " failed: custom program error: 0x";

/// The oracle program itself rejected the fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OracleRejection {
    code: u32,
}

impl OracleRejection {
    fn name(&self) -> Option<&'static str> {
        NON_RETRYABLE_CODES
            .iter()
            .find(|(code, _)| *code == self.code)
            .map(|(_, name)| *name)
    }

    fn is_terminal(&self) -> bool {
        self.name().is_some()
    }
}

impl fmt::Display for OracleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "oracle rejected fulfillment: {name} ({})", self.code),
            None => write!(f, "oracle rejected fulfillment: error {}", self.code),
        }
    }
}

impl std::error::Error for OracleRejection {}

/// The first program in the logs that failed with a custom error, and the
/// code. Outer invocations repeat the inner error on their own `failed`
/// line, so the first one is the program that raised it.
fn first_custom_failure(logs: &[String]) -> Option<(Pubkey, u32)> {
    logs.iter().find_map(|line| {
        let (program, code) = line.strip_prefix("Program ")?.split_once(FAILED_MARKER)?;
        let program = Pubkey::from_str(program).ok()?;
        let code = u32::from_str_radix(code.trim(), 16).ok()?;
        Some((program, code))
    })
}

/// Turn failed simulation logs into an error, keeping oracle rejections
/// distinguishable from consumer callback failures.
fn attribute_failure(program_id: &Pubkey, logs: &[String], fallback: String) -> anyhow::Error {
    match first_custom_failure(logs) {
        Some((program, code)) if program == *program_id => OracleRejection { code }.into(),
        Some((program, code)) => {
            anyhow::anyhow!("callback program {program} failed with custom error {code}")
        }
        None => anyhow::anyhow!("simulation failed: {fallback}"),
    }
}

/// Compute the Anchor instruction discriminator for `fulfill_randomness`.
fn fulfill_discriminator() -> [u8; 8] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"global:fulfill_randomness");
    let hash = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..8]);
    disc
}

/// Main fulfiller loop.
pub async fn run_fulfiller(
    config: AppConfig,
    mut rx: mpsc::Receiver<RandomnessRequestedEvent>,
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
) {
    let rpc_client = Arc::new(RpcClient::new_with_commitment(
        config.rpc_url.clone(),
        CommitmentConfig::confirmed(),
    ));

    let semaphore = Arc::new(Semaphore::new(config.fulfillment_concurrency));

    while let Some(event) = rx.recv().await {
        metrics.record_request();
        pending_count.fetch_add(1, Ordering::Relaxed);

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                error!("Semaphore closed, stopping fulfiller");
                break;
            }
        };
        let rpc = rpc_client.clone();
        let cfg = config.clone();
        let pending = pending_count.clone();
        let met = metrics.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let start = Instant::now();

            info!(
                request_id = event.request_id,
                requester = %event.requester,
                callback = %event.callback_program,
                slot = event.request_slot,
                "Fulfilling randomness request"
            );

            match fulfill_request(&rpc, &cfg, &event).await {
                Ok(sig) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    met.record_fulfillment(latency_ms);
                    info!(
                        request_id = event.request_id,
                        signature = %sig,
                        latency_ms,
                        explorer = %cfg.explorer_url(&sig),
                        "Fulfilled successfully"
                    );
                }
                Err(e) => handle_fulfillment_error(event.request_id, e, &met),
            }

            pending.fetch_sub(1, Ordering::Relaxed);
        });
    }

    info!("Fulfiller channel closed, shutting down");
}

fn handle_fulfillment_error(request_id: u64, error: anyhow::Error, metrics: &Metrics) {
    let err_str = format!("{error:#}");
    let terminal = error
        .downcast_ref::<OracleRejection>()
        .is_some_and(OracleRejection::is_terminal);
    if terminal {
        metrics.record_skip();
        warn!(
            request_id,
            reason = %err_str,
            "Skipping request (non-retryable)"
        );
    } else {
        metrics.record_failure();
        error!(
            request_id,
            error = %err_str,
            "Failed to fulfill"
        );
    }
}

/// Prove, build, sign, and submit a fulfillment transaction.
#[instrument(skip_all, fields(request_id = event.request_id))]
async fn fulfill_request(
    rpc_client: &RpcClient,
    config: &AppConfig,
    event: &RandomnessRequestedEvent,
) -> Result<String> {
    let fulfillment = compute_fulfillment(&config.vrf_secret, &event.seed, event.request_id);

    let callback_remaining = derive_callback_accounts(config.dice_program_id.as_ref(), event);

    let fulfill_ix = build_fulfill_instruction(
        &config.program_id,
        &config.operator_keypair.pubkey(),
        event,
        &fulfillment,
        &callback_remaining,
    );

    let mut instructions = Vec::with_capacity(3);
    instructions.push(build_set_compute_unit_limit_instruction(
        config.compute_unit_limit,
    ));
    if config.priority_fee_micro_lamports > 0 {
        instructions.push(build_set_compute_unit_price_instruction(
            config.priority_fee_micro_lamports,
        ));
    }
    instructions.push(fulfill_ix);

    send_with_retries(rpc_client, config, &instructions, event.request_id).await
}

/// Send a transaction with exponential backoff on BlockhashNotFound.
async fn send_with_retries(
    rpc_client: &RpcClient,
    config: &AppConfig,
    instructions: &[Instruction],
    request_id: u64,
) -> Result<String> {
    let mut retry_delay = Duration::from_millis(config.initial_retry_delay_ms);

    for attempt in 0..config.max_retries {
        let blockhash = rpc_client
            .get_latest_blockhash()
            .await
            .context("failed to fetch latest blockhash")?;

        let tx = Transaction::new_signed_with_payer(
            instructions,
            Some(&config.operator_keypair.pubkey()),
            &[config.operator_keypair.as_ref()],
            blockhash,
        );

        let simulation = rpc_client
            .simulate_transaction(&tx)
            .await
            .context("failed to simulate fulfillment")?
            .value;
        if let Some(err) = simulation.err {
            let logs = simulation.logs.unwrap_or_default();
            return Err(attribute_failure(&config.program_id, &logs, format!("{err:?}")));
        }
        info!(
            units_consumed = ?simulation.units_consumed,
            limit = config.compute_unit_limit,
            "Simulated fulfillment"
        );

        match rpc_client.send_and_confirm_transaction(&tx).await {
            Ok(sig) => return Ok(sig.to_string()),
            Err(e)
                if e.to_string().contains("BlockhashNotFound")
                    && attempt + 1 < config.max_retries =>
            {
                warn!(
                    attempt = attempt + 1,
                    delay = ?retry_delay,
                    "BlockhashNotFound, retrying"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2).min(Duration::from_secs(60));
            }
            Err(e) => return Err(e).context("send_and_confirm_transaction failed"),
        }
    }

    anyhow::bail!(
        "max retries ({}) exceeded for request_id={}",
        config.max_retries,
        request_id
    )
}

/// Build a `SetComputeUnitLimit` instruction.
fn build_set_compute_unit_limit_instruction(units: u32) -> Instruction {
    let mut data = Vec::with_capacity(5);
    data.push(2u8);
    data.extend_from_slice(&units.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// Build a `SetComputeUnitPrice` instruction.
fn build_set_compute_unit_price_instruction(micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(3u8);
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// Build the `fulfill_randomness` oracle instruction.
fn build_fulfill_instruction(
    program_id: &Pubkey,
    operator: &Pubkey,
    event: &RandomnessRequestedEvent,
    fulfillment: &Fulfillment,
    callback_remaining: &[AccountMeta],
) -> Instruction {
    let (config_pda, _) = Pubkey::find_program_address(&[b"oracle-config"], program_id);
    let (request_pda, _) =
        Pubkey::find_program_address(&[b"request", &event.request_id.to_le_bytes()], program_id);

    // Instruction data: discriminator + request_id + randomness + proof (Borsh Vec<u8>)
    let proof = fulfillment.proof.as_bytes();
    let mut data = Vec::with_capacity(8 + 8 + 32 + 4 + proof.len());
    data.extend_from_slice(&fulfill_discriminator());
    data.extend_from_slice(&event.request_id.to_le_bytes());
    data.extend_from_slice(&fulfillment.randomness);
    data.extend_from_slice(&(proof.len() as u32).to_le_bytes());
    data.extend_from_slice(proof);

    let mut accounts = vec![
        AccountMeta::new(*operator, true),                         // operator (signer, fee payer)
        AccountMeta::new_readonly(config_pda, false),              // oracle config PDA
        AccountMeta::new(request_pda, false),                      // randomness request PDA
        AccountMeta::new_readonly(event.callback_program, false),  // callback program
    ];

    accounts.extend_from_slice(callback_remaining);

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}
