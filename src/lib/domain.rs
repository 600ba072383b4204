pub mod commitment;
pub mod nullifier;
pub mod order;
pub mod reveal;
pub mod secret;
