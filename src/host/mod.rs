//! Host-facing contract and the JSON-lines bridge for UI shells.

pub mod channel;
pub mod contract;
pub mod stdio;
