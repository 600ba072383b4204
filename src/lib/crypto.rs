pub mod encoding;
pub mod poseidon;
pub mod salt;
