//! Client-side commit-reveal workflow for dark-pool orders.
//!
//! A trader commits to a hidden order (optionally escrowing value), waits out
//! the reveal delay, then discloses the order together with a zero-knowledge
//! proof that it matches the published commitment. The pending secret is kept
//! in a durable local store until the ledger confirms the reveal or a
//! cancellation.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod prover;
pub mod simulation;
