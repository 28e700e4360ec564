//! End-to-end tests for the shielded-balance engine.
//!
//! Each test stands up its own in-process cluster: a `MemoryLedger`, a
//! `LocalProver` trusted by that ledger, and one or more `ShieldedClient`s.
//! Nothing is shared between tests.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use umbra_protocol::config::{Cluster, EngineConfig, RetryPolicy, BASE_UNITS_PER_TOKEN};
use umbra_protocol::crypto::{Keypair, PublicKey};
use umbra_protocol::prover::LocalProver;
use umbra_protocol::rpc::{LedgerRpc, MemoryLedger, RpcError};
use umbra_protocol::transaction::{TxKind, TxState};
use umbra_protocol::zkp::{PedersenParams, SpendProver};
use umbra_protocol::{EngineError, ShieldedClient};

const HALF: u64 = BASE_UNITS_PER_TOKEN / 2;
const FOUR_TENTHS: u64 = BASE_UNITS_PER_TOKEN * 4 / 10;
const TENTH: u64 = BASE_UNITS_PER_TOKEN / 10;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Devnet {
    params: PedersenParams,
    ledger: Arc<MemoryLedger>,
    prover: Arc<LocalProver>,
    config: EngineConfig,
}

fn devnet() -> Devnet {
    let mut rng = StdRng::seed_from_u64(2026);
    let params = PedersenParams::setup(&mut rng);
    let (spend_prover, verifier) = SpendProver::setup(params.clone(), &mut rng).expect("circuit setup");
    let attester = Keypair::from_seed(&[0xA7; 32]);
    let ledger = Arc::new(MemoryLedger::new(verifier, attester.public_key()));
    let prover = Arc::new(LocalProver::new(spend_prover, attester, ledger.clone()));

    let config = EngineConfig {
        cluster: Cluster::Local,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(120),
        },
        confirmation_timeout: Duration::from_secs(5),
        confirmation_poll_interval: Duration::from_millis(5),
    };

    Devnet {
        params,
        ledger,
        prover,
        config,
    }
}

impl Devnet {
    async fn client(&self, owner: &Keypair) -> ShieldedClient {
        self.client_with(owner, self.config.clone()).await
    }

    async fn client_with(&self, owner: &Keypair, config: EngineConfig) -> ShieldedClient {
        ShieldedClient::connect(
            owner,
            self.ledger.clone(),
            self.prover.clone(),
            self.params.clone(),
            config,
        )
        .await
        .expect("client connects")
    }

    /// A one-token public account with a connected client.
    async fn funded(&self, id: u8) -> (Keypair, ShieldedClient) {
        let owner = Keypair::from_seed(&[id; 32]);
        self.ledger.credit(owner.public_key(), BASE_UNITS_PER_TOKEN);
        let client = self.client(&owner).await;
        (owner, client)
    }

    /// A funded client that has already moved half a token into the pool.
    async fn topped_up(&self, id: u8) -> (Keypair, ShieldedClient) {
        let (owner, client) = self.funded(id).await;
        client.top_up(HALF, &owner).await.expect("top-up confirms");
        (owner, client)
    }
}

fn recipient() -> PublicKey {
    Keypair::from_seed(&[0xD5; 32]).public_key()
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn top_up_then_private_send() {
    let net = devnet();
    let (owner, client) = net.funded(1).await;
    assert_eq!(client.private_balance(), 0);

    let top_up = client.top_up(HALF, &owner).await.unwrap();
    assert_eq!(top_up.kind, TxKind::TopUp);
    assert_eq!(top_up.amount, HALF);
    assert_eq!(top_up.change, None);
    assert_eq!(client.private_balance(), HALF);
    assert_eq!(client.public_balance().await.unwrap(), HALF);

    let send = client.send(FOUR_TENTHS, recipient()).await.unwrap();
    assert_eq!(send.kind, TxKind::Send);
    assert_eq!(send.change, Some(TENTH));
    assert!(send.confirmed_at >= send.submitted_at);

    assert_eq!(client.private_balance(), TENTH);
    assert_eq!(client.available_balance(), TENTH);
    assert_eq!(net.ledger.balance_of(&recipient()), FOUR_TENTHS);
    // The sender's public balance is untouched by a private send.
    assert_eq!(client.public_balance().await.unwrap(), HALF);
}

#[tokio::test]
async fn airdrop_confirms_like_any_transaction() {
    let net = devnet();
    let owner = Keypair::from_seed(&[2; 32]);
    let signature = net
        .ledger
        .request_airdrop(&owner.public_key(), BASE_UNITS_PER_TOKEN)
        .await
        .unwrap();
    assert_eq!(
        net.ledger.confirm_transaction(&signature).await.unwrap(),
        umbra_protocol::rpc::ConfirmationStatus::Confirmed
    );

    let client = net.client(&owner).await;
    assert_eq!(client.public_balance().await.unwrap(), BASE_UNITS_PER_TOKEN);
}

#[tokio::test]
async fn exact_send_leaves_no_change_note() {
    let net = devnet();
    let (_, client) = net.topped_up(3).await;

    let send = client.send(HALF, recipient()).await.unwrap();
    assert_eq!(send.change, Some(0));
    assert_eq!(client.private_balance(), 0);

    let state = net.ledger.get_shielded_state().await.unwrap();
    assert_eq!(state.notes.len(), 1);
    assert_eq!(state.nullifiers.len(), 1);
}

#[tokio::test]
async fn fresh_client_recovers_balance_from_seed() {
    let net = devnet();
    let (owner, client) = net.topped_up(4).await;
    client.send(FOUR_TENTHS, recipient()).await.unwrap();

    let restored = net.client(&owner).await;
    assert_eq!(restored.private_balance(), TENTH);
    assert_eq!(restored.store().lock().len(), 2);

    let report = restored.reconcile().await.unwrap();
    assert_eq!(report.discovered, 0);
    assert_eq!(report.newly_spent, 0);
}

#[tokio::test]
async fn other_owners_notes_are_invisible() {
    let net = devnet();
    let (_, alice) = net.topped_up(5).await;
    let (_, bob) = net.funded(6).await;

    assert_eq!(alice.private_balance(), HALF);
    assert_eq!(bob.private_balance(), 0);
    assert_eq!(bob.reconcile().await.unwrap().discovered, 0);
}

// ---------------------------------------------------------------------------
// Local refusals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overspend_fails_before_any_remote_call() {
    let net = devnet();
    let (_, client) = net.topped_up(7).await;
    let submissions = net.ledger.submissions();

    let err = client.send(HALF + 1, recipient()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientPrivateBalance { requested, available }
            if requested == HALF + 1 && available == HALF
    ));
    assert_eq!(net.prover.requests_served(), 0);
    assert_eq!(net.ledger.submissions(), submissions);
    assert_eq!(client.available_balance(), HALF);
}

#[tokio::test]
async fn zero_amounts_are_refused() {
    let net = devnet();
    let (owner, client) = net.topped_up(8).await;

    assert!(matches!(client.top_up(0, &owner).await, Err(EngineError::ZeroAmount)));
    assert!(matches!(client.send(0, recipient()).await, Err(EngineError::ZeroAmount)));
    assert_eq!(net.prover.requests_served(), 0);
}

#[tokio::test]
async fn unsigned_top_up_is_not_submitted() {
    let net = devnet();
    let (_, client) = net.funded(9).await;
    let submissions = net.ledger.submissions();

    let pending = client.build_top_up(HALF).unwrap();
    assert_eq!(pending.state(), TxState::Built);
    assert!(matches!(client.send_tx(pending).await, Err(EngineError::InvalidState(_))));
    assert_eq!(net.ledger.submissions(), submissions);
    assert_eq!(client.private_balance(), 0);
}

#[tokio::test]
async fn only_the_owner_can_sign_a_top_up() {
    let net = devnet();
    let (_, client) = net.funded(10).await;
    let stranger = Keypair::from_seed(&[0xEE; 32]);

    let mut pending = client.build_top_up(HALF).unwrap();
    assert!(matches!(
        client.sign_top_up(&mut pending, &stranger),
        Err(EngineError::SigningUnavailable(_))
    ));
    assert_eq!(pending.state(), TxState::Built);
}

#[tokio::test]
async fn overlapping_sends_reserve_disjoint_inputs() {
    let net = devnet();
    let (_, client) = net.topped_up(11).await;

    let (first, second) = tokio::join!(
        client.send(FOUR_TENTHS, recipient()),
        client.send(FOUR_TENTHS, recipient()),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(EngineError::InsufficientPrivateBalance { available: 0, .. })
    )));

    assert_eq!(net.prover.requests_served(), 1);
    assert_eq!(client.private_balance(), TENTH);
    assert_eq!(net.ledger.balance_of(&recipient()), FOUR_TENTHS);
}

// ---------------------------------------------------------------------------
// Remote failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prover_hiccups_are_retried() {
    let net = devnet();
    let (_, client) = net.topped_up(12).await;

    net.prover.fail_transiently(2);
    client.send(FOUR_TENTHS, recipient()).await.unwrap();
    assert_eq!(net.prover.requests_served(), 3);
    assert_eq!(client.private_balance(), TENTH);
}

#[tokio::test]
async fn prover_outage_releases_the_reservation() {
    let net = devnet();
    let (_, client) = net.topped_up(13).await;
    let submissions = net.ledger.submissions();

    net.prover.fail_transiently(3);
    assert!(matches!(
        client.send(FOUR_TENTHS, recipient()).await,
        Err(EngineError::TransientNetworkFailure(_))
    ));
    assert_eq!(net.prover.requests_served(), 3);
    assert_eq!(net.ledger.submissions(), submissions);
    assert_eq!(client.available_balance(), HALF);
    assert_eq!(client.store().lock().reservation_count(), 0);

    client.send(FOUR_TENTHS, recipient()).await.unwrap();
}

#[tokio::test]
async fn lost_submission_releases_the_reservation() {
    let net = devnet();
    let (_, client) = net.topped_up(14).await;

    let pending = client.build_send(FOUR_TENTHS, recipient()).await.unwrap();
    assert_eq!(client.available_balance(), 0);
    let submissions = net.ledger.submissions();

    net.ledger.inject_transport_failures(1);
    let err = client.send_tx(pending).await.unwrap_err();
    assert!(matches!(err, EngineError::SubmissionFailed(RpcError::Transport(_))));
    // Attempted once, never resubmitted.
    assert_eq!(net.ledger.submissions(), submissions);
    assert_eq!(client.available_balance(), HALF);
    assert_eq!(net.ledger.balance_of(&recipient()), 0);
}

#[tokio::test]
async fn abandoned_send_frees_its_inputs() {
    let net = devnet();
    let (_, client) = net.topped_up(15).await;

    let pending = client.build_send(FOUR_TENTHS, recipient()).await.unwrap();
    assert!(pending.reservation().is_some());
    assert_eq!(pending.change_amount(), Some(TENTH));
    client.abandon(pending);

    assert_eq!(client.available_balance(), HALF);
    assert_eq!(client.private_balance(), HALF);
}

#[tokio::test]
async fn dropped_send_returns_its_inputs() {
    let net = devnet();
    let (_, client) = net.topped_up(21).await;

    let pending = client.build_send(FOUR_TENTHS, recipient()).await.unwrap();
    assert_eq!(client.available_balance(), 0);
    drop(pending);

    assert_eq!(client.available_balance(), HALF);
    assert_eq!(client.store().lock().reservation_count(), 0);
    client.send(FOUR_TENTHS, recipient()).await.unwrap();
}

#[tokio::test]
async fn cancelled_send_returns_its_inputs() {
    let net = devnet();
    let (_, client) = net.topped_up(22).await;

    // The prover stalls, so the send is cut off mid-flight.
    net.prover.set_latency(Some(Duration::from_secs(10)));
    let cut_off = tokio::time::timeout(Duration::from_millis(50), client.send(FOUR_TENTHS, recipient())).await;
    assert!(cut_off.is_err());

    assert_eq!(client.available_balance(), HALF);
    assert_eq!(client.store().lock().reservation_count(), 0);
    assert_eq!(net.ledger.balance_of(&recipient()), 0);

    net.prover.set_latency(None);
    client.send(FOUR_TENTHS, recipient()).await.unwrap();
    assert_eq!(client.private_balance(), TENTH);
}

#[tokio::test]
async fn confirmed_send_spends_inputs_whose_reservation_vanished() {
    let net = devnet();
    let (_, client) = net.topped_up(24).await;

    let pending = client.build_send(FOUR_TENTHS, recipient()).await.unwrap();
    let reservation = pending.reservation().unwrap();
    client.store().lock().release(reservation).unwrap();
    assert_eq!(client.available_balance(), HALF);

    client.send_tx(pending).await.unwrap();
    // Inputs are marked spent one by one, and the change still lands.
    assert_eq!(client.private_balance(), TENTH);
    assert_eq!(client.available_balance(), TENTH);
    assert_eq!(client.store().lock().reservation_count(), 0);
}

#[tokio::test]
async fn top_up_beyond_public_balance_is_refused() {
    let net = devnet();
    let (owner, client) = net.funded(16).await;

    let err = client.top_up(BASE_UNITS_PER_TOKEN + 1, &owner).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SubmissionFailed(RpcError::InsufficientFunds { available, .. })
            if available == BASE_UNITS_PER_TOKEN
    ));
    assert_eq!(client.private_balance(), 0);
    assert_eq!(client.public_balance().await.unwrap(), BASE_UNITS_PER_TOKEN);
}

#[tokio::test]
async fn slow_confirmation_is_awaited() {
    let net = devnet();
    let (owner, client) = net.funded(17).await;

    net.ledger.delay_confirmations(4);
    client.top_up(HALF, &owner).await.unwrap();
    assert_eq!(client.private_balance(), HALF);
}

#[tokio::test]
async fn unconfirmed_top_up_is_recovered_by_reconcile() {
    let net = devnet();
    let owner = Keypair::from_seed(&[18; 32]);
    net.ledger.credit(owner.public_key(), BASE_UNITS_PER_TOKEN);
    let config = EngineConfig {
        confirmation_timeout: Duration::from_millis(30),
        ..net.config.clone()
    };
    let client = net.client_with(&owner, config).await;

    net.ledger.delay_confirmations(u32::MAX);
    let err = client.top_up(HALF, &owner).await.unwrap_err();
    assert!(matches!(err, EngineError::SubmissionFailed(RpcError::Transport(_))));
    // Outcome unknown locally, so nothing was applied.
    assert_eq!(client.private_balance(), 0);

    let report = client.reconcile().await.unwrap();
    assert_eq!(report.discovered, 1);
    assert_eq!(client.private_balance(), HALF);
}

// ---------------------------------------------------------------------------
// Two devices, one seed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_device_is_refused_by_the_prover() {
    let net = devnet();
    let (owner, phone) = net.topped_up(19).await;
    let laptop = net.client(&owner).await;
    assert_eq!(laptop.private_balance(), HALF);

    phone.send(FOUR_TENTHS, recipient()).await.unwrap();

    // The laptop still believes the note is unspent.
    assert!(matches!(
        laptop.send(FOUR_TENTHS, recipient()).await,
        Err(EngineError::ProverRejected(_))
    ));
    assert_eq!(laptop.available_balance(), HALF);

    let report = laptop.reconcile().await.unwrap();
    assert_eq!(report.newly_spent, 1);
    assert_eq!(report.discovered, 1);
    assert_eq!(laptop.private_balance(), TENTH);
}

#[tokio::test]
async fn racing_devices_cannot_double_spend() {
    let net = devnet();
    let (owner, phone) = net.topped_up(20).await;
    let laptop = net.client(&owner).await;

    let from_phone = phone.build_send(FOUR_TENTHS, recipient()).await.unwrap();
    let from_laptop = laptop.build_send(FOUR_TENTHS, recipient()).await.unwrap();

    phone.send_tx(from_phone).await.unwrap();
    let err = laptop.send_tx(from_laptop).await.unwrap_err();
    assert!(matches!(err, EngineError::SubmissionFailed(RpcError::DoubleSpend(_))));
    assert_eq!(net.ledger.balance_of(&recipient()), FOUR_TENTHS);

    laptop.reconcile().await.unwrap();
    assert_eq!(laptop.private_balance(), TENTH);
    assert_eq!(phone.private_balance(), TENTH);
}

// ---------------------------------------------------------------------------
// Conservation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conservation_holds_across_random_histories() {
    let net = devnet();
    let owner = Keypair::from_seed(&[23; 32]);
    net.ledger.credit(owner.public_key(), 10 * BASE_UNITS_PER_TOKEN);
    let client = net.client(&owner).await;

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut public = 10 * BASE_UNITS_PER_TOKEN;
    let mut expected = 0u64;
    let mut sent = 0u64;

    for step in 0..10 {
        let available = client.available_balance();
        match rng.gen_range(0..4) {
            0 | 1 if public > 0 => {
                let amount = rng.gen_range(1..=HALF.min(public));
                client.top_up(amount, &owner).await.unwrap();
                public -= amount;
                expected += amount;
            }
            2 if available > 0 => {
                // Spend everything: exact match, no change note.
                let receipt = client.send(available, recipient()).await.unwrap();
                assert_eq!(receipt.change, Some(0));
                expected -= available;
                sent += available;
            }
            3 if available > 1 => {
                let amount = rng.gen_range(1..available);
                client.send(amount, recipient()).await.unwrap();
                expected -= amount;
                sent += amount;
            }
            _ => {
                client.reconcile().await.unwrap();
            }
        }

        client.reconcile().await.unwrap();
        assert_eq!(client.private_balance(), expected, "live client after step {step}");
        assert_eq!(client.available_balance(), expected, "nothing reserved after step {step}");

        let restored = net.client(&owner).await;
        restored.reconcile().await.unwrap();
        assert_eq!(restored.private_balance(), expected, "restored client after step {step}");
    }

    assert_eq!(net.ledger.balance_of(&recipient()), sent);
    assert_eq!(net.ledger.balance_of(&owner.public_key()), public);
}
