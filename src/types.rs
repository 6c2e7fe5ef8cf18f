//! Common types shared by the indexer and the relay worker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sender recorded for `Distribution` rows; the contract emits no sender.
pub const DISTRIBUTION_SENDER: &str = "Bridge";

/// Kind of bridge event, stored as text in `bridge_events.event_kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Deposit,
    Distribution,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Deposit => "Deposit",
            EventKind::Distribution => "Distribution",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(EventKind::Deposit),
            "Distribution" => Ok(EventKind::Distribution),
            other => Err(eyre::eyre!("Unknown event kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_as_str() {
        assert_eq!(EventKind::Deposit.as_str(), "Deposit");
        assert_eq!(EventKind::Distribution.as_str(), "Distribution");
    }

    #[test]
    fn test_event_kind_from_str() {
        assert_eq!("Deposit".parse::<EventKind>().unwrap(), EventKind::Deposit);
        assert_eq!(
            "Distribution".parse::<EventKind>().unwrap(),
            EventKind::Distribution
        );
        assert!("deposit".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(format!("{}", EventKind::Deposit), "Deposit");
    }
}
