pub mod anchor;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod merkle;
pub mod pipeline;
pub mod proof;
pub mod storage;
pub mod verify;

#[cfg(test)]
mod testing;
