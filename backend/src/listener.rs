//! On-chain event listener for the oracle program.
//!
//! Two complementary strategies ensure no requests are missed:
//!
//! 1. **Catch-up scan** ([`catch_up_pending_requests`]): on startup, queries
//!    `getProgramAccounts` for any existing `Pending` requests that arrived
//!    while the operator was offline.
//!
//! 2. **Live stream** ([`listen_for_events`]): subscribes to program log
//!    events via WebSocket, parses `RandomnessRequested` Anchor events in
//!    real-time, and auto-reconnects on disconnection.
//!
//! A request seen by both paths is submitted twice; the second attempt fails
//! with `AlreadyFulfilled` and is skipped by the fulfiller.

use base64::Engine;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionLogsConfig,
    RpcTransactionLogsFilter,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;

/// Parsed representation of the on-chain `RandomnessRequested` Anchor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessRequestedEvent {
    pub request_id: u64,
    pub requester: Pubkey,
    pub callback_program: Pubkey,
    pub seed: [u8; 32],
    pub request_slot: u64,
}

/// Compute an Anchor discriminator: `sha256("<namespace>:<Name>")[..8]`.
fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(format!("{namespace}:{name}"));
    let hash = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&hash[..8]);
    disc
}

/// Delay before reconnecting to the WebSocket after a disconnect or error.
const WS_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Borsh body of `RandomnessRequested`:
/// request_id (8) + requester (32) + callback_program (32) + seed (32) + request_slot (8).
const EVENT_BODY_LEN: usize = 112;

/// Offset of the status byte in a `RandomnessRequest` account.
const STATUS_OFFSET: usize = 120;

/// Status byte of a pending request.
const STATUS_PENDING: u8 = 0;

/// Scan for any existing unfulfilled (Pending) requests on startup.
///
/// Uses `getProgramAccounts` with Memcmp filters to find request PDAs where:
/// - The account discriminator matches `RandomnessRequest`.
/// - The status byte at offset 120 is `0` (Pending).
///
/// Each found request is sent through the channel for fulfillment.
pub async fn catch_up_pending_requests(
    config: &AppConfig,
    tx: &mpsc::Sender<RandomnessRequestedEvent>,
) {
    info!("Scanning for pending requests");

    let client = solana_client::nonblocking::rpc_client::RpcClient::new(config.rpc_url.clone());

    let disc = discriminator("account", "RandomnessRequest");

    let filters = vec![
        RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, disc.to_vec())),
        RpcFilterType::Memcmp(Memcmp::new_raw_bytes(STATUS_OFFSET, vec![STATUS_PENDING])),
    ];

    let account_config = RpcProgramAccountsConfig {
        filters: Some(filters),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            ..Default::default()
        },
        ..Default::default()
    };

    let accounts = match client
        .get_program_ui_accounts_with_config(&config.program_id, account_config)
        .await
    {
        Ok(accounts) => accounts,
        Err(e) => {
            error!(error = %e, "Failed to fetch program accounts");
            return;
        }
    };

    info!(count = accounts.len(), "Found pending requests");
    for (pubkey, ui_account) in accounts {
        let Some(data) = ui_account.data.decode() else {
            warn!(account = %pubkey, "Failed to decode account data, skipping");
            continue;
        };

        let Some(event) = parse_request_account(&data) else {
            warn!(account = %pubkey, len = data.len(), "Malformed request account, skipping");
            continue;
        };

        info!(
            request_id = event.request_id,
            requester = %event.requester,
            slot = event.request_slot,
            "Queued pending request"
        );

        if tx.send(event).await.is_err() {
            error!("Channel closed while catching up pending requests");
            return;
        }
    }
}

/// Subscribe to program logs via WebSocket and forward `RandomnessRequested`
/// events to the fulfiller. Automatically reconnects on disconnection.
pub async fn listen_for_events(config: AppConfig, tx: mpsc::Sender<RandomnessRequestedEvent>) {
    let discriminator = discriminator("event", "RandomnessRequested");

    loop {
        info!(url = %config.ws_url, "Connecting to WebSocket");

        match PubsubClient::new(&config.ws_url).await {
            Ok(pubsub) => {
                info!("WebSocket connected");

                let filter =
                    RpcTransactionLogsFilter::Mentions(vec![config.program_id.to_string()]);
                let logs_config = RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::confirmed()),
                };

                match pubsub.logs_subscribe(filter, logs_config).await {
                    Ok((mut stream, _unsub)) => {
                        use futures_util::StreamExt;
                        while let Some(log_result) = stream.next().await {
                            // Failed transactions still carry their logs.
                            if log_result.value.err.is_some() {
                                continue;
                            }
                            let events = parse_log_lines(
                                &log_result.value.logs,
                                &config.program_id,
                                &discriminator,
                            );
                            for event in events {
                                info!(
                                    request_id = event.request_id,
                                    requester = %event.requester,
                                    slot = event.request_slot,
                                    "Received RandomnessRequested event"
                                );
                                if tx.send(event).await.is_err() {
                                    error!("Channel closed, stopping listener");
                                    return;
                                }
                            }
                        }
                        warn!("WebSocket stream ended, reconnecting");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to subscribe to logs");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to WebSocket");
            }
        }

        info!(delay = ?WS_RECONNECT_DELAY, "Reconnecting");
        tokio::time::sleep(WS_RECONNECT_DELAY).await;
    }
}

/// Collect `RandomnessRequested` events from transaction log lines.
///
/// Anchor emits events as base64-encoded `Program data:` log entries. The
/// invoke stack is tracked from the `invoke` / `success` / `failed` lines so
/// that only entries written while `program_id` is executing are accepted;
/// any other program in the transaction can log the same bytes. Accepted
/// entries are decoded, the first 8 bytes are compared against the expected
/// discriminator, and matching entries are parsed into events.
fn parse_log_lines(
    logs: &[String],
    program_id: &Pubkey,
    discriminator: &[u8; 8],
) -> Vec<RandomnessRequestedEvent> {
    let program_id = program_id.to_string();
    let mut stack: Vec<&str> = Vec::new();
    let mut events = Vec::new();
    for log_line in logs {
        let Some(data_str) = log_line.strip_prefix("Program data: ") else {
            if let Some((program, tail)) = log_line
                .strip_prefix("Program ")
                .and_then(|rest| rest.split_once(' '))
            {
                if tail.starts_with("invoke [") {
                    stack.push(program);
                } else if tail == "success" || tail.starts_with("failed") {
                    stack.pop();
                }
            }
            continue;
        };
        if stack.last() != Some(&program_id.as_str()) {
            debug!("Ignoring program data emitted by another program");
            continue;
        }

        let decoded = match base64::engine::general_purpose::STANDARD.decode(data_str.trim()) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "Failed to decode base64 log data");
                continue;
            }
        };

        if decoded.len() < 8 || decoded[..8] != *discriminator {
            continue;
        }

        match parse_randomness_requested_event(&decoded[8..]) {
            Some(event) => events.push(event),
            None => warn!("Failed to parse RandomnessRequested event payload"),
        }
    }
    events
}

/// Deserialize a `RandomnessRequested` event from its Borsh-encoded body
/// (after the 8-byte discriminator has been stripped).
fn parse_randomness_requested_event(data: &[u8]) -> Option<RandomnessRequestedEvent> {
    if data.len() < EVENT_BODY_LEN {
        return None;
    }

    Some(RandomnessRequestedEvent {
        request_id: u64::from_le_bytes(data[0..8].try_into().ok()?),
        requester: Pubkey::try_from(&data[8..40]).ok()?,
        callback_program: Pubkey::try_from(&data[40..72]).ok()?,
        seed: data[72..104].try_into().ok()?,
        request_slot: u64::from_le_bytes(data[104..112].try_into().ok()?),
    })
}

/// Rebuild the request event from a `RandomnessRequest` account.
///
/// Account data layout (offsets include the 8-byte discriminator):
/// ```text
/// [0..8]     discriminator
/// [8..16]    request_id       (u64)
/// [16..48]   requester        (Pubkey)
/// [48..80]   callback_program (Pubkey)
/// [80..112]  seed             ([u8; 32])
/// [112..120] request_slot     (u64)
/// [120]      status           (u8), 0 = Pending
/// ```
/// The first 112 bytes after the discriminator match the event body.
fn parse_request_account(data: &[u8]) -> Option<RandomnessRequestedEvent> {
    if data.len() <= STATUS_OFFSET {
        return None;
    }
    parse_randomness_requested_event(&data[8..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Vec<u8> {
        let mut body = Vec::with_capacity(EVENT_BODY_LEN);
        body.extend_from_slice(&7u64.to_le_bytes());
        body.extend_from_slice(&[1u8; 32]);
        body.extend_from_slice(&[2u8; 32]);
        body.extend_from_slice(&[3u8; 32]);
        body.extend_from_slice(&99u64.to_le_bytes());
        body
    }

    fn expected() -> RandomnessRequestedEvent {
        RandomnessRequestedEvent {
            request_id: 7,
            requester: Pubkey::new_from_array([1u8; 32]),
            callback_program: Pubkey::new_from_array([2u8; 32]),
            seed: [3u8; 32],
            request_slot: 99,
        }
    }

    #[test]
    fn parses_event_body() {
        assert_eq!(parse_randomness_requested_event(&sample_body()), Some(expected()));
        assert_eq!(parse_randomness_requested_event(&sample_body()[..111]), None);
    }

    #[test]
    fn parses_request_account() {
        let mut data = discriminator("account", "RandomnessRequest").to_vec();
        data.extend_from_slice(&sample_body());
        data.push(STATUS_PENDING);
        data.extend_from_slice(&0u64.to_le_bytes());
        data.push(254);
        assert_eq!(data[STATUS_OFFSET], STATUS_PENDING);
        assert_eq!(parse_request_account(&data), Some(expected()));
        assert_eq!(parse_request_account(&data[..STATUS_OFFSET]), None);
    }

    #[test]
    fn extracts_matching_program_data() {
        let disc = discriminator("event", "RandomnessRequested");
        let mut payload = disc.to_vec();
        payload.extend_from_slice(&sample_body());
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);

        let mut other = discriminator("event", "RandomnessFulfilled").to_vec();
        other.extend_from_slice(&[0u8; 40]);
        let other = base64::engine::general_purpose::STANDARD.encode(&other);

        let oracle = Pubkey::new_unique();
        let logs = vec![
            format!("Program {oracle} invoke [1]"),
            "Program log: Instruction: RequestRandomness".to_string(),
            format!("Program data: {other}"),
            format!("Program data: {encoded}"),
            "Program data: not-base64!".to_string(),
            format!("Program {oracle} consumed 9000 of 200000 compute units"),
            format!("Program {oracle} success"),
        ];
        assert_eq!(parse_log_lines(&logs, &oracle, &disc), vec![expected()]);
    }

    #[test]
    fn ignores_event_bytes_logged_by_other_programs() {
        let disc = discriminator("event", "RandomnessRequested");
        let mut payload = disc.to_vec();
        payload.extend_from_slice(&sample_body());
        let data = format!(
            "Program data: {}",
            base64::engine::general_purpose::STANDARD.encode(&payload)
        );

        let oracle = Pubkey::new_unique();
        let impostor = Pubkey::new_unique();
        let logs = vec![
            format!("Program {impostor} invoke [1]"),
            data.clone(),
            format!("Program {oracle} invoke [2]"),
            format!("Program {oracle} success"),
            data.clone(),
            format!("Program {impostor} success"),
            data,
        ];
        assert!(parse_log_lines(&logs, &oracle, &disc).is_empty());
    }

    #[test]
    fn accepts_oracle_events_emitted_under_a_cpi() {
        let disc = discriminator("event", "RandomnessRequested");
        let mut payload = disc.to_vec();
        payload.extend_from_slice(&sample_body());
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);

        let oracle = Pubkey::new_unique();
        let consumer = Pubkey::new_unique();
        let logs = vec![
            format!("Program {consumer} invoke [1]"),
            format!("Program {oracle} invoke [2]"),
            format!("Program data: {encoded}"),
            format!("Program {oracle} success"),
            format!("Program {consumer} success"),
        ];
        assert_eq!(parse_log_lines(&logs, &oracle, &disc), vec![expected()]);
    }
}
