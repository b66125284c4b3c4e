//! Core type definitions for the Banknote protocol
//!
//! Account addresses are opaque 32-byte identifiers. Protocol-owned accounts
//! (node vaults, staking pools, the unused-funds venue) derive their address
//! deterministically from a label so that ledger state is reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential bank node identifier. Assigned starting at 1, never reused.
pub type BankNodeId = u32;

/// Per-node sequential loan request identifier.
pub type LoanRequestId = u64;

/// Per-node sequential loan identifier.
pub type LoanId = u64;

/// Address - 32-byte account identifier for ledger balances
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// Create an address from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive a protocol-owned address from a label using BLAKE3
    pub fn derive(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            bytes: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Zero address (burn/null sink)
    pub const ZERO: Self = Self { bytes: [0u8; 32] };
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// TokenId - index of a fungible token ledger in the token bank
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}
