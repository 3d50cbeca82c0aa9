//! Signing key lifecycle for instance identity documents.
//!
//! Two key slots, one used for signing and one held in reserve, rotated on a
//! schedule and persisted to a single JSON file.

pub mod algorithm;
pub mod clock;
pub mod config;
pub mod error;
pub mod key_type;
pub mod keypair;
pub mod manager;
pub mod ring;
pub mod rotation;
pub mod store;

pub use algorithm::{Curve, KeyAlgorithm, PrivateKey, PublicKey, PublicKeyComponents, algorithm_for};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KeyManagerConfig;
pub use error::{KeyError, Result};
pub use key_type::KeyType;
pub use keypair::{KeyPair, key_id};
pub use manager::{DiskKeyManager, KeyManager, TickOutcome};
pub use ring::{KeyRing, Slot};
pub use store::KeyStore;
