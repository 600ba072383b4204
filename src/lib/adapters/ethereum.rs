use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use alloy_primitives::{Address, B256, Bytes, U256};

use crate::{
    domain::{
        commitment::Commitment,
        nullifier::Nullifier,
        order::{InstrumentRef, OrderParameters, OrderState},
    },
    ports::{
        ledger::{LedgerError, OrderLedger},
        CommitmentInfo, InstrumentStats, RevealProof, TxReceipt,
    },
};

sol! {
    #[sol(rpc)]
    interface IDarkPool {
        struct OrderParams {
            address instrument;
            uint256 instrumentId;
            uint8 kind;
            uint8 side;
            uint256 quantity;
            uint256 limitPrice;
            uint256 minimumFill;
            uint64 expiry;
        }

        function commitOrder(bytes32 commitment) external payable;

        function revealOrder(
            bytes calldata proof,
            bytes32[2] calldata publicInputs,
            OrderParams calldata params
        ) external;

        function cancelCommitment(bytes32 commitment) external;

        function commitments(bytes32 commitment) external view returns (
            address trader,
            uint64 timestamp,
            uint256 escrow,
            bool revealed,
            bool cancelled
        );

        function orderStatus(bytes32 orderHash) external view returns (bool exists, uint8 state);

        function nullifierUsed(bytes32 nullifier) external view returns (bool);

        function activeOrderCount(address trader) external view returns (uint256);

        function instrumentStats(address instrument, uint256 instrumentId) external view returns (
            uint256 totalOrders,
            uint256 activeOrders,
            uint256 filledVolume
        );
    }
}

impl From<&OrderParameters> for IDarkPool::OrderParams {
    fn from(params: &OrderParameters) -> Self {
        Self {
            instrument: params.instrument.contract,
            instrumentId: params.instrument.instance_id,
            kind: params.kind.as_u8(),
            side: params.side.as_u8(),
            quantity: params.quantity,
            limitPrice: params.limit_price,
            minimumFill: params.minimum_fill,
            expiry: params.expiry,
        }
    }
}

fn to_u64(value: U256, what: &str) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::Decode(format!("{what} out of range: {value}")))
}

/// Ethereum RPC adapter for the dark-pool contract.
#[derive(Clone)]
pub struct EthereumLedger {
    provider: DynProvider,
    dark_pool: Address,
    trader: Address,
}

impl EthereumLedger {
    pub async fn new(
        rpc_url: &str,
        private_key: &str,
        dark_pool: Address,
    ) -> Result<Self, LedgerError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| LedgerError::Rpc(format!("Invalid private key: {}", e)))?;
        let trader = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = DynProvider::new(
            ProviderBuilder::new().wallet(wallet).connect_http(
                rpc_url
                    .parse()
                    .map_err(|e| LedgerError::Rpc(format!("Invalid RPC URL: {}", e)))?,
            ),
        );

        Ok(Self {
            provider,
            dark_pool,
            trader,
        })
    }

    /// Address transactions are signed with; the trader identity for commitments.
    pub fn trader(&self) -> Address {
        self.trader
    }

    fn convert_receipt(receipt: &alloy::rpc::types::TransactionReceipt) -> TxReceipt {
        TxReceipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
        }
    }
}

impl OrderLedger for EthereumLedger {
    async fn broadcast_commit(&self, commitment: Commitment, escrow: U256) -> Result<B256, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let pending = pool
            .commitOrder(commitment.0)
            .value(escrow)
            .send()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: B256) -> Result<TxReceipt, LedgerError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(LedgerError::Reverted(format!("tx {tx_hash} reverted")));
        }

        Ok(Self::convert_receipt(&receipt))
    }

    async fn reveal_order(
        &self,
        proof: &RevealProof,
        params: &OrderParameters,
    ) -> Result<TxReceipt, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let receipt = pool
            .revealOrder(
                Bytes::copy_from_slice(&proof.proof),
                proof.public_inputs.to_array(),
                params.into(),
            )
            .send()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(LedgerError::Reverted("revealOrder reverted".into()));
        }

        Ok(Self::convert_receipt(&receipt))
    }

    async fn cancel_commitment(&self, commitment: Commitment) -> Result<TxReceipt, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let receipt = pool
            .cancelCommitment(commitment.0)
            .send()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(LedgerError::Reverted("cancelCommitment reverted".into()));
        }

        Ok(Self::convert_receipt(&receipt))
    }

    async fn commitment_info(&self, commitment: Commitment) -> Result<Option<CommitmentInfo>, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let result = pool
            .commitments(commitment.0)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        // Unset mapping slot: the commitment was never published.
        if result.trader == Address::ZERO {
            return Ok(None);
        }

        Ok(Some(CommitmentInfo {
            trader: result.trader,
            timestamp: result.timestamp,
            escrow: result.escrow,
            revealed: result.revealed,
            cancelled: result.cancelled,
        }))
    }

    async fn order_state(&self, order_hash: B256) -> Result<Option<OrderState>, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let result = pool
            .orderStatus(order_hash)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        if !result.exists {
            return Ok(None);
        }

        OrderState::try_from(result.state)
            .map(Some)
            .map_err(|raw| LedgerError::Decode(format!("unknown order state {raw}")))
    }

    async fn is_nullifier_spent(&self, nullifier: Nullifier) -> Result<bool, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let result = pool
            .nullifierUsed(nullifier.0)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(result)
    }

    async fn active_order_count(&self, trader: Address) -> Result<u64, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let result = pool
            .activeOrderCount(trader)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        to_u64(result, "active order count")
    }

    async fn instrument_stats(&self, instrument: &InstrumentRef) -> Result<InstrumentStats, LedgerError> {
        let pool = IDarkPool::new(self.dark_pool, &self.provider);
        let result = pool
            .instrumentStats(instrument.contract, instrument.instance_id)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        Ok(InstrumentStats {
            total_orders: to_u64(result.totalOrders, "total orders")?,
            active_orders: to_u64(result.activeOrders, "active orders")?,
            filled_volume: result.filledVolume,
        })
    }
}
