//! The EBICS protocol version in use, which selects both the wire envelope
//! namespace (handled in `nexus-ebics`) and the pain.001 schema version
//! emitted here.

use serde::{Deserialize, Serialize};

/// EBICS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// EBICS 2.5, order-type based (`urn:org:ebics:H004`).
    H004,
    /// EBICS 3.0, BTF-service based (`urn:org:ebics:H005`).
    H005,
}

impl Dialect {
    /// The pain.001 schema version this dialect's banks expect.
    pub fn pain001_namespace(self) -> &'static str {
        match self {
            Dialect::H004 => "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03",
            Dialect::H005 => "urn:iso:std:iso:20022:tech:xsd:pain.001.001.09",
        }
    }
}
