//! # Signing service transaction requests
//!
//! Typesafe construction, checking and authentication of the requests sent to a remote signing
//! service in order to have it create and sign transactions out of a vault.
//!
//! The main use is signing a pre-built PSBT: the request carries the raw PSBT (which we never
//! decode), which inputs to sign and how, and the vault to sign from. A signed request also
//! carries an ECDSA signature over `path|timestamp|body` and the timestamp it was made at.
//!
//! Vaults can also be configured to vest an EVM asset daily, see [vesting].

pub mod envelope;
pub mod error;
pub mod fixtures;
pub mod psbt;
pub mod request;
pub mod signer;
pub mod vesting;

pub use miniscript;

pub use envelope::{RequestSignature, SignedRequest};
pub use error::Error;
pub use psbt::PsbtRawData;
pub use request::{CreateTransactionRequest, TransactionDetails};
pub use signer::{EcdsaSigner, RequestSigner};
pub use vesting::{first_vesting_time, VestingConfig};
