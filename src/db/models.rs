use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::EventKind;

// Note: amounts are decimal strings in the token's smallest unit and are
// only converted to U256 when building the contract call.

/// A stored bridge event row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub id: i64,
    pub chain: String,
    pub event_kind: String,
    pub tx_hash: String,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub token: Option<String>,
    pub amount: Option<String>,
    pub event_nonce: Option<String>,
    pub block_number: Option<i64>,
    pub observed_at: DateTime<Utc>,
    pub processed: bool,
    /// Unix seconds of the active relay claim, if any
    pub claimed_at: Option<i64>,
}

impl BridgeEvent {
    pub fn kind(&self) -> Option<EventKind> {
        self.event_kind.parse().ok()
    }

    pub fn is_deposit(&self) -> bool {
        self.kind() == Some(EventKind::Deposit)
    }
}

/// For inserting newly observed events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBridgeEvent {
    pub chain: String,
    pub event_kind: EventKind,
    pub tx_hash: String,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub token: Option<String>,
    pub amount: Option<String>,
    pub event_nonce: Option<String>,
    pub block_number: Option<i64>,
}

/// Last fully scanned block for a chain
#[derive(Debug, Clone, FromRow)]
pub struct ChainCheckpoint {
    pub chain: String,
    pub last_scanned_block: i64,
    pub updated_at: DateTime<Utc>,
}
