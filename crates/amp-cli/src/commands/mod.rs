//! CLI command implementations.

pub mod export;
pub mod info;
pub mod process;
pub mod verify;
