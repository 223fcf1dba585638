//! # nexus-ebics
//!
//! The EBICS H004/H005 client protocol engine: key-management transactions
//! (INI/HIA/HPB), download transactions (C52/C53/C54), upload transactions
//! (CCT/CCC/pain.001), and the per-subscriber serialization that keeps at
//! most one transaction in flight at a time.
//!
//! [`transaction::run_download`] and [`transaction::run_upload`] are the
//! entry points most callers want; [`keymgmt`] covers the one-shot
//! key-management exchanges that happen once per connection.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod accountinfo;
pub mod envelope;
pub mod error;
pub mod keymgmt;
pub mod order;
pub mod subscriber;
pub mod transaction;
pub mod transport;

pub use error::{Error, Result};
pub use subscriber::{EbicsSubscriber, KeyManagementState, SubscriberKeys};
pub use transport::EbicsTransport;
