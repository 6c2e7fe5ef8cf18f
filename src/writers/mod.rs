//! Relay worker: turns unprocessed deposits into `distribute` calls
//!
//! Each deposit goes through validate -> claim -> submit -> confirm -> mark
//! processed. A row is only marked processed after its destination
//! transaction has a successful receipt, and the claim keeps a second
//! attempt from submitting the same deposit while one is in flight.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::{self, BridgeEvent};
use crate::metrics;
use crate::schedule::{PeriodicJob, RunGuard, TickOutcome};

pub mod evm;

pub use evm::EvmDistributor;

/// Why a stored deposit cannot be relayed
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DepositError {
    #[error("deposit {id} is missing {field}")]
    MissingField { id: i64, field: &'static str },
    #[error("deposit {id} has invalid amount {amount:?}")]
    InvalidAmount { id: i64, amount: String },
    #[error("deposit {id} has invalid {field} address {value:?}")]
    InvalidAddress {
        id: i64,
        field: &'static str,
        value: String,
    },
    #[error("deposit id {0} cannot be used as a nonce")]
    InvalidId(i64),
    #[error("event {0} is not a deposit")]
    NotADeposit(i64),
}

/// Parse a stored amount into `U256` exactly.
///
/// Accepts only base-10 digits (no sign, decimal point, exponent or
/// whitespace) and rejects values that overflow `uint256`. The stored value
/// is already in the token's smallest unit, so no scaling is applied.
pub fn parse_amount(raw: &str) -> Option<U256> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

/// A deposit whose fields have all been parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDeposit {
    pub id: i64,
    pub tx_hash: String,
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
}

impl ValidatedDeposit {
    /// The `distribute` call for this deposit; the row id is the deposit nonce
    pub fn distribute_request(&self) -> DistributeRequest {
        DistributeRequest {
            token: self.token,
            recipient: self.recipient,
            amount: self.amount,
            deposit_nonce: U256::from(self.id as u64),
        }
    }
}

fn required_field<'a>(
    id: i64,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, DepositError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DepositError::MissingField { id, field }),
    }
}

fn parse_address(id: i64, field: &'static str, value: &str) -> Result<Address, DepositError> {
    Address::from_str(value).map_err(|_| DepositError::InvalidAddress {
        id,
        field,
        value: value.to_string(),
    })
}

/// Check that a stored deposit has everything `distribute` needs
pub fn validate_deposit(event: &BridgeEvent) -> Result<ValidatedDeposit, DepositError> {
    let id = event.id;
    if !event.is_deposit() {
        return Err(DepositError::NotADeposit(id));
    }
    if id <= 0 {
        return Err(DepositError::InvalidId(id));
    }

    let recipient = required_field(id, "recipient", &event.recipient)?;
    let token = required_field(id, "token", &event.token)?;
    // Amounts are parsed as stored, so padded values are rejected
    let amount = match event.amount.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return Err(DepositError::MissingField { id, field: "amount" }),
    };

    let amount = parse_amount(amount).ok_or_else(|| DepositError::InvalidAmount {
        id,
        amount: amount.to_string(),
    })?;

    Ok(ValidatedDeposit {
        id,
        tx_hash: event.tx_hash.clone(),
        token: parse_address(id, "token", token)?,
        recipient: parse_address(id, "recipient", recipient)?,
        amount,
    })
}

/// Arguments of one `distribute(token, recipient, amount, depositNonce)` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributeRequest {
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
    pub deposit_nonce: U256,
}

/// Sends `distribute` transactions to the destination bridge
#[async_trait]
pub trait DistributionSubmitter: Send + Sync {
    /// Sign and broadcast the call, returning the transaction hash
    async fn submit_distribute(&self, request: &DistributeRequest) -> Result<B256>;

    /// Resolve once the transaction has a receipt. The caller bounds the wait.
    ///
    /// An `Err` means the outcome is unknown, not that the call failed.
    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<ReceiptStatus>;
}

/// Execution status of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Why a claimed deposit was not distributed
#[derive(Debug, thiserror::Error)]
enum DistributeError {
    #[error("failed to submit distribute: {0:#}")]
    NotSent(eyre::Report),
    #[error("distribute 0x{0:x} reverted")]
    Reverted(B256),
    #[error("distribute 0x{tx_hash:x} not confirmed: {error:#}")]
    Unconfirmed { tx_hash: B256, error: eyre::Report },
}

impl DistributeError {
    /// Whether the destination transaction may still land
    fn may_be_pending(&self) -> bool {
        matches!(self, DistributeError::Unconfirmed { .. })
    }
}

/// Relay worker tuning
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub confirmation_timeout: Duration,
    pub claim_lease: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(120),
            claim_lease: Duration::from_secs(600),
        }
    }
}

/// Outcome counts for one relay cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub relayed: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    /// Rows another attempt currently holds
    pub not_claimed: usize,
}

/// Relays unprocessed deposits to the destination chain
pub struct RelayWorker {
    db: SqlitePool,
    submitter: Arc<dyn DistributionSubmitter>,
    settings: RelaySettings,
    running: AtomicBool,
}

impl RelayWorker {
    pub fn new(
        db: SqlitePool,
        submitter: Arc<dyn DistributionSubmitter>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            db,
            submitter,
            settings,
            running: AtomicBool::new(false),
        }
    }

    /// Run one relay cycle over every unprocessed deposit.
    ///
    /// Returns `Ok(None)` when the previous cycle is still running. Per-row
    /// failures are counted in the report; only failing to read the pending
    /// set is an error.
    pub async fn run_once(&self) -> Result<Option<RelayReport>> {
        let Some(_guard) = RunGuard::try_acquire(&self.running) else {
            debug!("Previous relay cycle still running, skipping tick");
            metrics::record_skipped_tick("relay");
            return Ok(None);
        };

        let deposits = db::get_unprocessed_deposits(&self.db).await?;
        metrics::set_pending_deposits(deposits.len());

        let mut report = RelayReport::default();
        if deposits.is_empty() {
            debug!("No unprocessed deposits");
            return Ok(Some(report));
        }

        info!(count = deposits.len(), "Relaying unprocessed deposits");

        for deposit in &deposits {
            self.relay_one(deposit, &mut report).await;
        }

        info!(
            relayed = report.relayed,
            skipped_invalid = report.skipped_invalid,
            failed = report.failed,
            not_claimed = report.not_claimed,
            "Relay cycle complete"
        );

        Ok(Some(report))
    }

    async fn relay_one(&self, deposit: &BridgeEvent, report: &mut RelayReport) {
        let validated = match validate_deposit(deposit) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    id = deposit.id,
                    tx_hash = %deposit.tx_hash,
                    error = %e,
                    "Skipping invalid deposit"
                );
                metrics::record_distribution("invalid");
                report.skipped_invalid += 1;
                return;
            }
        };

        match db::claim_deposit(&self.db, validated.id, self.settings.claim_lease).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    "Deposit already claimed by another attempt"
                );
                metrics::record_distribution("not_claimed");
                report.not_claimed += 1;
                return;
            }
            Err(e) => {
                error!(id = validated.id, error = ?e, "Failed to claim deposit");
                metrics::record_distribution("failed");
                report.failed += 1;
                return;
            }
        }

        let dest_tx_hash = match self.distribute(&validated).await {
            Ok(hash) => hash,
            Err(e) if e.may_be_pending() => {
                // Keep the claim so no retry happens before the lease expires
                error!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    error = %e,
                    lease = ?self.settings.claim_lease,
                    "Distribution unconfirmed, retrying after the claim lease"
                );
                metrics::record_distribution("unconfirmed");
                report.failed += 1;
                return;
            }
            Err(e) => {
                error!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    error = %e,
                    "Distribution failed, will retry next cycle"
                );
                if let Err(release_err) = db::release_claim(&self.db, validated.id).await {
                    error!(
                        id = validated.id,
                        error = ?release_err,
                        "Failed to release claim; it expires after the lease"
                    );
                }
                metrics::record_distribution("failed");
                report.failed += 1;
                return;
            }
        };

        // The destination transaction is confirmed. If this write fails the
        // claim is kept so the row is not resubmitted before the lease expires.
        match db::mark_processed(&self.db, &validated.tx_hash).await {
            Ok(true) => {
                info!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    dest_tx_hash = %format!("0x{:x}", dest_tx_hash),
                    recipient = %validated.recipient,
                    amount = %validated.amount,
                    "Deposit relayed"
                );
                metrics::record_distribution("relayed");
                report.relayed += 1;
            }
            Ok(false) => {
                warn!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    "Deposit was already marked processed"
                );
                metrics::record_distribution("relayed");
                report.relayed += 1;
            }
            Err(e) => {
                error!(
                    id = validated.id,
                    tx_hash = %validated.tx_hash,
                    dest_tx_hash = %format!("0x{:x}", dest_tx_hash),
                    error = ?e,
                    "Distribution confirmed but marking processed failed"
                );
                metrics::record_distribution("failed");
                report.failed += 1;
            }
        }
    }

    /// Submit and wait for a successful receipt, returning the destination tx hash
    async fn distribute(&self, deposit: &ValidatedDeposit) -> Result<B256, DistributeError> {
        let request = deposit.distribute_request();
        debug!(
            id = deposit.id,
            token = %request.token,
            recipient = %request.recipient,
            amount = %request.amount,
            deposit_nonce = %request.deposit_nonce,
            "Submitting distribute"
        );

        let tx_hash = self
            .submitter
            .submit_distribute(&request)
            .await
            .map_err(DistributeError::NotSent)?;
        info!(
            id = deposit.id,
            dest_tx_hash = %format!("0x{:x}", tx_hash),
            "Distribute sent, waiting for confirmation"
        );

        let status = tokio::time::timeout(
            self.settings.confirmation_timeout,
            self.submitter.wait_for_confirmation(tx_hash),
        )
        .await
        .map_err(|_| DistributeError::Unconfirmed {
            tx_hash,
            error: eyre!(
                "timed out after {:?} waiting for a receipt",
                self.settings.confirmation_timeout
            ),
        })?
        .map_err(|error| DistributeError::Unconfirmed { tx_hash, error })?;

        match status {
            ReceiptStatus::Success => Ok(tx_hash),
            ReceiptStatus::Reverted => Err(DistributeError::Reverted(tx_hash)),
        }
    }
}

#[async_trait]
impl PeriodicJob for RelayWorker {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn tick(&self) -> TickOutcome {
        match self.run_once().await {
            Ok(Some(_)) => TickOutcome::Completed,
            Ok(None) => TickOutcome::Skipped,
            Err(e) => {
                error!(error = ?e, "Relay cycle failed");
                TickOutcome::Completed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewBridgeEvent;
    use crate::types::EventKind;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000bb";
    const TOKEN: &str = "0x00000000000000000000000000000000000000cc";

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn store_deposit(pool: &SqlitePool, tx_hash: &str, amount: &str) -> i64 {
        db::insert_event_if_absent(
            pool,
            &NewBridgeEvent {
                chain: "Holesky".to_string(),
                event_kind: EventKind::Deposit,
                tx_hash: tx_hash.to_string(),
                sender: Some("0x00000000000000000000000000000000000000aa".to_string()),
                recipient: Some(RECIPIENT.to_string()),
                token: Some(TOKEN.to_string()),
                amount: Some(amount.to_string()),
                event_nonce: Some("0".to_string()),
                block_number: Some(1),
            },
        )
        .await
        .unwrap();
        db::get_event_by_tx_hash(pool, tx_hash).await.unwrap().unwrap().id
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Behaviour {
        Confirm,
        FailSubmit,
        Revert,
        NeverConfirm,
        ReceiptError,
    }

    struct MockSubmitter {
        behaviour: Behaviour,
        gate: Option<Arc<Notify>>,
        submitted: Mutex<Vec<DistributeRequest>>,
    }

    impl MockSubmitter {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                gate: None,
                submitted: Mutex::new(vec![]),
            }
        }

        fn submitted(&self) -> Vec<DistributeRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DistributionSubmitter for MockSubmitter {
        async fn submit_distribute(&self, request: &DistributeRequest) -> Result<B256> {
            self.submitted.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.behaviour == Behaviour::FailSubmit {
                return Err(eyre!("insufficient funds for gas"));
            }
            Ok(B256::repeat_byte(0x42))
        }

        async fn wait_for_confirmation(&self, _tx_hash: B256) -> Result<ReceiptStatus> {
            match self.behaviour {
                Behaviour::Revert => Ok(ReceiptStatus::Reverted),
                Behaviour::NeverConfirm => std::future::pending().await,
                Behaviour::ReceiptError => Err(eyre!("connection refused")),
                _ => Ok(ReceiptStatus::Success),
            }
        }
    }

    fn worker(pool: &SqlitePool, submitter: Arc<MockSubmitter>) -> RelayWorker {
        RelayWorker::new(
            pool.clone(),
            submitter,
            RelaySettings {
                confirmation_timeout: Duration::from_millis(100),
                claim_lease: Duration::from_secs(600),
            },
        )
    }

    fn event(id: i64, amount: Option<&str>) -> BridgeEvent {
        BridgeEvent {
            id,
            chain: "Holesky".to_string(),
            event_kind: "Deposit".to_string(),
            tx_hash: "0xabc".to_string(),
            sender: None,
            recipient: Some(RECIPIENT.to_string()),
            token: Some(TOKEN.to_string()),
            amount: amount.map(str::to_string),
            event_nonce: None,
            block_number: None,
            observed_at: Utc::now(),
            processed: false,
            claimed_at: None,
        }
    }

    #[test]
    fn test_parse_amount_is_exact() {
        assert_eq!(
            parse_amount("1000000000000000000"),
            Some(U256::from(1_000_000_000_000_000_000u128))
        );
        assert_eq!(parse_amount("0"), Some(U256::ZERO));
        assert_eq!(parse_amount(&U256::MAX.to_string()), Some(U256::MAX));
    }

    #[test]
    fn test_parse_amount_rejects_non_integers() {
        for raw in ["", "abc", "-1", "1.5", "1e18", " 1", "0x10", "+7"] {
            assert_eq!(parse_amount(raw), None, "accepted {:?}", raw);
        }
        // 2^256 overflows
        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert_eq!(parse_amount(too_big), None);
    }

    #[test]
    fn test_validate_deposit() {
        let v = validate_deposit(&event(7, Some("2000000000000000000"))).unwrap();
        assert_eq!(v.recipient, Address::from_str(RECIPIENT).unwrap());
        assert_eq!(v.distribute_request().deposit_nonce, U256::from(7u64));
        assert_eq!(
            v.distribute_request().amount,
            U256::from(2_000_000_000_000_000_000u128)
        );

        assert_eq!(
            validate_deposit(&event(7, None)),
            Err(DepositError::MissingField {
                id: 7,
                field: "amount"
            })
        );
        assert!(matches!(
            validate_deposit(&event(7, Some("abc"))),
            Err(DepositError::InvalidAmount { .. })
        ));
        assert_eq!(
            validate_deposit(&event(0, Some("1"))),
            Err(DepositError::InvalidId(0))
        );

        let mut bad_recipient = event(7, Some("1"));
        bad_recipient.recipient = Some("0xnothex".to_string());
        assert!(matches!(
            validate_deposit(&bad_recipient),
            Err(DepositError::InvalidAddress {
                field: "recipient",
                ..
            })
        ));

        let mut distribution = event(7, Some("1"));
        distribution.event_kind = "Distribution".to_string();
        assert_eq!(
            validate_deposit(&distribution),
            Err(DepositError::NotADeposit(7))
        );

        for padded in [" 5", "5 ", "5\n"] {
            assert_eq!(
                validate_deposit(&event(7, Some(padded))),
                Err(DepositError::InvalidAmount {
                    id: 7,
                    amount: padded.to_string()
                }),
                "accepted {:?}",
                padded
            );
        }
        assert_eq!(
            validate_deposit(&event(7, Some(""))),
            Err(DepositError::MissingField {
                id: 7,
                field: "amount"
            })
        );

        let mut no_token = event(7, Some("1"));
        no_token.token = Some("  ".to_string());
        assert!(matches!(
            validate_deposit(&no_token),
            Err(DepositError::MissingField { field: "token", .. })
        ));
    }

    #[tokio::test]
    async fn test_amount_submitted_exactly_with_row_id_nonce() {
        let pool = test_pool().await;
        let id = store_deposit(&pool, "0x01", "1000000000000000000").await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::Confirm));

        let report = worker(&pool, submitter.clone()).run_once().await.unwrap().unwrap();

        assert_eq!(report.relayed, 1);
        let submitted = submitter.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].amount, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(submitted[0].deposit_nonce, U256::from(id as u64));
        assert_eq!(submitted[0].token, Address::from_str(TOKEN).unwrap());
        assert!(db::get_event_by_tx_hash(&pool, "0x01").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn test_invalid_amount_makes_no_call() {
        let pool = test_pool().await;
        store_deposit(&pool, "0x01", "abc").await;
        store_deposit(&pool, "0x02", "5").await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::Confirm));

        let report = worker(&pool, submitter.clone()).run_once().await.unwrap().unwrap();

        assert_eq!(report.skipped_invalid, 1);
        assert_eq!(report.relayed, 1);
        assert_eq!(submitter.submitted().len(), 1);
        assert_eq!(submitter.submitted()[0].amount, U256::from(5u64));

        let bad = db::get_event_by_tx_hash(&pool, "0x01").await.unwrap().unwrap();
        assert!(!bad.processed);
        assert_eq!(bad.claimed_at, None);
    }

    #[tokio::test]
    async fn test_submit_failure_releases_claim() {
        let pool = test_pool().await;
        store_deposit(&pool, "0x01", "5").await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::FailSubmit));
        let worker = worker(&pool, submitter.clone());

        let report = worker.run_once().await.unwrap().unwrap();
        assert_eq!(report.failed, 1);

        let row = db::get_event_by_tx_hash(&pool, "0x01").await.unwrap().unwrap();
        assert!(!row.processed);
        assert_eq!(row.claimed_at, None);

        // Retried on the next cycle
        worker.run_once().await.unwrap();
        assert_eq!(submitter.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_reverted_and_unconfirmed_stay_unprocessed() {
        for (behaviour, claim_kept) in [
            (Behaviour::Revert, false),
            (Behaviour::NeverConfirm, true),
            (Behaviour::ReceiptError, true),
        ] {
            let pool = test_pool().await;
            store_deposit(&pool, "0x01", "5").await;
            let submitter = Arc::new(MockSubmitter::new(behaviour));

            let report = worker(&pool, submitter).run_once().await.unwrap().unwrap();

            assert_eq!(report.failed, 1, "{:?}", behaviour);
            let row = db::get_event_by_tx_hash(&pool, "0x01").await.unwrap().unwrap();
            assert!(!row.processed, "{:?}", behaviour);
            assert_eq!(row.claimed_at.is_some(), claim_kept, "{:?}", behaviour);
            assert_eq!(db::count_unprocessed_deposits(&pool).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_distribute_not_resent_within_lease() {
        let pool = test_pool().await;
        store_deposit(&pool, "0x01", "5").await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::NeverConfirm));
        let worker = RelayWorker::new(
            pool.clone(),
            submitter.clone(),
            RelaySettings {
                confirmation_timeout: Duration::from_millis(50),
                claim_lease: Duration::from_secs(600),
            },
        );

        let first = worker.run_once().await.unwrap().unwrap();
        assert_eq!(first.failed, 1);

        let second = worker.run_once().await.unwrap().unwrap();
        assert_eq!(second.not_claimed, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(submitter.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_distribute_is_retried_next_cycle() {
        let pool = test_pool().await;
        store_deposit(&pool, "0x01", "5").await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::Revert));
        let worker = worker(&pool, submitter.clone());

        worker.run_once().await.unwrap();
        let report = worker.run_once().await.unwrap().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(submitter.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_claimed_deposit_is_not_resubmitted() {
        let pool = test_pool().await;
        let id = store_deposit(&pool, "0x01", "5").await;
        assert!(db::claim_deposit(&pool, id, Duration::from_secs(600)).await.unwrap());
        let submitter = Arc::new(MockSubmitter::new(Behaviour::Confirm));

        let report = worker(&pool, submitter.clone()).run_once().await.unwrap().unwrap();

        assert_eq!(report.not_claimed, 1);
        assert!(submitter.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let pool = test_pool().await;
        store_deposit(&pool, "0x01", "5").await;
        let gate = Arc::new(Notify::new());
        let submitter = Arc::new(MockSubmitter {
            gate: Some(gate.clone()),
            ..MockSubmitter::new(Behaviour::Confirm)
        });
        let worker = Arc::new(worker(&pool, submitter.clone()));

        let first = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run_once().await }
        });
        while submitter.submitted().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(worker.run_once().await.unwrap(), None);
        assert_eq!(worker.tick().await, TickOutcome::Skipped);

        gate.notify_one();
        let report = first.await.unwrap().unwrap().unwrap();
        assert_eq!(report.relayed, 1);
        assert_eq!(submitter.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pending_set() {
        let pool = test_pool().await;
        let submitter = Arc::new(MockSubmitter::new(Behaviour::Confirm));

        let report = worker(&pool, submitter.clone()).run_once().await.unwrap().unwrap();

        assert_eq!(report, RelayReport::default());
        assert!(submitter.submitted().is_empty());
    }
}
