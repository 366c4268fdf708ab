//! # gdpr-ledger
//!
//! In-memory personal-data ledger for GDPR compliance.
//!
//! The crate records personal data with its legal basis, purpose and retention window,
//! keeps consent records in sync with the data they cover, and fulfils data subject
//! rights requests (access, erasure, portability) under statutory deadlines.

pub mod compliance;
pub mod config;
pub mod error;
pub mod logging;

pub use compliance::PersonalDataStore;
pub use error::{Error, Result};
