pub mod bb_prover;
pub mod ethereum;
pub mod file_store;
pub mod memory_store;
pub mod mock_ledger;
