//! Subcommand implementations

pub mod issue;
pub mod jwks;
pub mod keygen;
pub mod serve;
pub mod verify;
