//! Library crate for subnet-scan-rs exposing the scan engine modules.
pub mod addrspace;
pub mod aggregate;
pub mod error;
pub mod netdetect;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod types;
