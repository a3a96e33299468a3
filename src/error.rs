use miniscript::bitcoin::secp256k1;

use std::{convert::From, error, fmt};

/// An error specific to the creation, checking and signing of transaction requests.
#[derive(PartialEq, Eq, Debug)]
pub enum Error {
    /// The raw PSBT string is not a `0x`-prefixed hex encoded BIP174 blob.
    PsbtData(String),
    /// An input signing instruction is insane (duplicated index, bad sighash code, ..).
    InputInstruction(String),
    /// An address or public key does not parse, or is not of the expected type.
    Address(String),
    /// The signature envelope (timestamp, signature, idempotence id) is invalid.
    Envelope(String),
    /// Signing the request, or verifying its signature, failed.
    Signing(String),
    /// The serialization or deserialization of the request failed.
    Serialisation(String),
    /// An amount could not be converted to base units.
    Amount(String),
    /// No known token for this chain.
    UnsupportedAsset(String),
    /// The request tags are inconsistent with its details.
    RequestMismatch(String),
    /// A vesting configuration is invalid, or its schedule cannot be computed.
    Vesting(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::PsbtData(ref e) => write!(f, "Raw PSBT data error: {}", e),
            Error::InputInstruction(ref e) => write!(f, "Input signing instruction error: {}", e),
            Error::Address(ref e) => write!(f, "Address error: {}", e),
            Error::Envelope(ref e) => write!(f, "Request envelope error: {}", e),
            Error::Signing(ref e) => write!(f, "Request signing error: {}", e),
            Error::Serialisation(ref e) => write!(f, "Request serialisation error: {}", e),
            Error::Amount(ref e) => write!(f, "Amount error: {}", e),
            Error::UnsupportedAsset(ref e) => write!(f, "Unsupported asset: {}", e),
            Error::RequestMismatch(ref e) => write!(f, "Inconsistent request: {}", e),
            Error::Vesting(ref e) => write!(f, "Vesting schedule error: {}", e),
        }
    }
}

impl error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialisation(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Envelope(e.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Signing(e.to_string())
    }
}
