//! Bridge contract ABI definition
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the two
//! events the indexer reads and the `distribute` call the relay submits.

use alloy::sol;

sol! {
    /// Bridge contract interface deployed on both chains
    #[sol(rpc)]
    contract BridgeContract {
        /// Release tokens on this chain for a deposit observed on the other chain
        ///
        /// # Arguments
        /// * `token` - Token address on this chain
        /// * `recipient` - Address receiving the funds
        /// * `amount` - Amount in the token's smallest unit
        /// * `depositNonce` - Relay-assigned deposit identifier (contract-level replay guard)
        function distribute(
            address token,
            address recipient,
            uint256 amount,
            uint256 depositNonce
        ) external;

        /// Emitted when a user locks tokens to be relayed
        event Deposit(
            address indexed token,
            address indexed from,
            address indexed to,
            uint256 amount,
            uint256 nonce
        );

        /// Emitted when a relayed transfer completes
        event Distribution(
            address indexed token,
            address indexed to,
            uint256 amount,
            uint256 nonce
        );
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeContract;
    use alloy::primitives::keccak256;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            BridgeContract::Deposit::SIGNATURE_HASH,
            keccak256(b"Deposit(address,address,address,uint256,uint256)")
        );
        assert_eq!(
            BridgeContract::Distribution::SIGNATURE_HASH,
            keccak256(b"Distribution(address,address,uint256,uint256)")
        );
    }

    #[test]
    fn test_distribute_selector() {
        let hash = keccak256(b"distribute(address,address,uint256,uint256)");
        assert_eq!(&BridgeContract::distributeCall::SELECTOR[..], &hash[..4]);
    }
}
