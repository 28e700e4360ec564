//! # Engine Configuration & Constants
//!
//! Every magic number the shielded-balance engine relies on lives here,
//! together with the small amount of runtime configuration a client needs
//! (which cluster it talks to, how hard it retries the prover, how long it
//! waits for confirmations).
//!
//! Changing a domain-separation string after users have derived seeds from
//! it orphans every shielded balance ever created with the old value. Treat
//! the `*_CONTEXT` and `SEED_MESSAGE` constants as frozen.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Base units per whole token. Amounts everywhere in the engine are `u64`
/// base units; this constant is for display and for the demo flow only.
pub const BASE_UNITS_PER_TOKEN: u64 = 1_000_000_000;

/// Default airdrop requested by the wallet demo: one whole token.
pub const DEFAULT_AIRDROP_AMOUNT: u64 = BASE_UNITS_PER_TOKEN;

// ---------------------------------------------------------------------------
// Seed derivation
// ---------------------------------------------------------------------------

/// The fixed message a key holder signs to derive its shielded seed.
///
/// Anyone who can make a user sign this exact message can reconstruct that
/// user's private balance, so wallets should present it verbatim and only
/// to applications the user trusts.
pub const SEED_MESSAGE: &str = "Sign this message to derive your Umbra shielded-balance seed.\n\n\
IMPORTANT: only sign this message in applications you trust. The signature \
grants read and spend access to your private balance.";

/// Seed length in bytes. The seed is an Ed25519 signature, so 64.
pub const SEED_LENGTH: usize = 64;

/// `blake3::derive_key` context for the blinding-factor key.
pub const BLINDING_KEY_CONTEXT: &str = "umbra 2026-01 blinding key";

/// `blake3::derive_key` context for the owner-tag key.
pub const TAG_KEY_CONTEXT: &str = "umbra 2026-01 owner tag key";

/// `blake3::derive_key` context for the note-encryption key.
pub const NOTE_KEY_CONTEXT: &str = "umbra 2026-01 note encryption key";

/// `blake3::derive_key` context for per-note blinding factors.
pub const BLINDING_CONTEXT: &str = "umbra 2026-01 note blinding";

/// `blake3::derive_key` context for nullifiers.
pub const NULLIFIER_CONTEXT: &str = "umbra 2026-01 nullifier";

/// `blake3::derive_key` context for the transaction binding that ties a
/// spend proof to its nullifiers and destination.
pub const BINDING_CONTEXT: &str = "umbra 2026-01 spend binding";

/// `blake3::derive_key` context for proof-request sealing keys.
pub const SEAL_CONTEXT: &str = "umbra 2026-01 prover request seal";

/// `blake3::derive_key` context for the digest of a spend statement. The
/// digest is the AAD of a sealed proof request and the message a prover
/// signs when it attests to a spend.
pub const STATEMENT_CONTEXT: &str = "umbra 2026-01 spend statement";

/// `blake3::derive_key` context for top-up opening-proof challenges.
pub const OPENING_CONTEXT: &str = "umbra 2026-01 top-up opening";

// ---------------------------------------------------------------------------
// Cryptographic parameters
// ---------------------------------------------------------------------------

/// Ed25519 signature length.
pub const SIGNATURE_LENGTH: usize = 64;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve, always.
pub const AES_NONCE_LENGTH: usize = 12;

/// Number of bits in the range check on the change amount. A full `u64`.
pub const RANGE_BITS: usize = 64;

/// Salt length for note blinding derivation.
pub const NOTE_SALT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Upper bound on search nodes visited while looking for an exact-match
/// subset. Past this the store falls back to greedy largest-first.
pub const EXACT_MATCH_SEARCH_BUDGET: usize = 200_000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Proof request attempts before a transient failure is surfaced.
pub const PROOF_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt. Doubles on every further attempt.
pub const PROOF_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Per-attempt timeout on the remote prover.
pub const PROOF_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `submit` waits for a confirmation before giving up.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval while waiting for a confirmation.
pub const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// Which network the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Mainnet,
    Testnet,
    Devnet,
    /// In-process ledger; never leaves the machine.
    Local,
}

impl Cluster {
    /// Default RPC endpoint for the cluster.
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Cluster::Mainnet => "https://api.mainnet-beta.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Local => "memory://local",
        }
    }

    /// Airdrops only exist on test clusters.
    pub fn supports_airdrop(&self) -> bool {
        !matches!(self, Cluster::Mainnet)
    }

    /// Block-explorer link for a transaction signature.
    pub fn explorer_tx_url(&self, signature: &str) -> String {
        match self {
            Cluster::Mainnet => format!("https://solscan.io/tx/{}", signature),
            other => format!("https://solscan.io/tx/{}?cluster={}", signature, other),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Mainnet => write!(f, "mainnet"),
            Cluster::Testnet => write!(f, "testnet"),
            Cluster::Devnet => write!(f, "devnet"),
            Cluster::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "testnet" => Ok(Cluster::Testnet),
            "devnet" => Ok(Cluster::Devnet),
            "local" | "localnet" => Ok(Cluster::Local),
            other => Err(format!("unknown cluster: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Bounded retry with exponential backoff for remote prover calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep before the second attempt.
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,
    /// Timeout applied to each individual attempt.
    #[serde(with = "duration_millis")]
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Backoff to sleep after the given zero-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Attempts actually made, never fewer than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: PROOF_MAX_ATTEMPTS,
            initial_backoff: PROOF_INITIAL_BACKOFF,
            attempt_timeout: PROOF_ATTEMPT_TIMEOUT,
        }
    }
}

/// Client-side configuration for a [`crate::engine::ShieldedClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cluster: Cluster,
    pub retry: RetryPolicy,
    #[serde(with = "duration_millis")]
    pub confirmation_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub confirmation_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            retry: RetryPolicy::default(),
            confirmation_timeout: CONFIRMATION_TIMEOUT,
            confirmation_poll_interval: CONFIRMATION_POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Durations travel as integer milliseconds in config files.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
