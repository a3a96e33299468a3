//! Request signers
//!
//! The signing service authenticates a request by an ECDSA signature over the SHA256 of the
//! signing payload (see [crate::envelope::signing_payload]), DER-encoded.

use crate::error::Error;

use miniscript::bitcoin::{
    hashes::{sha256, Hash},
    secp256k1::{self, ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey},
};

use std::{fmt, str::FromStr};

/// Something that can sign a request payload.
pub trait RequestSigner {
    /// Sign this payload, returning the DER-encoded signature.
    fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>, Error>;
}

fn payload_message(payload: &[u8]) -> Result<Message, Error> {
    let digest = sha256::Hash::hash(payload);
    Ok(Message::from_slice(digest.as_byte_array())?)
}

/// Sign request payloads with a secp256k1 key.
pub struct EcdsaSigner {
    secp: Secp256k1<secp256k1::All>,
    key: SecretKey,
}

impl EcdsaSigner {
    pub fn new(key: SecretKey) -> EcdsaSigner {
        EcdsaSigner {
            secp: Secp256k1::new(),
            key,
        }
    }

    /// Create a signer from a hex encoded 32 bytes secret key.
    pub fn from_hex(hex_key: &str) -> Result<EcdsaSigner, Error> {
        let key = SecretKey::from_str(hex_key)
            .map_err(|e| Error::Signing(format!("invalid secret key: {}", e)))?;
        Ok(EcdsaSigner::new(key))
    }

    /// The public key the service should be configured with.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&self.secp, &self.key)
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("public_key", &self.public_key())
            .finish()
    }
}

impl RequestSigner for EcdsaSigner {
    fn sign_payload(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let msg = payload_message(payload)?;
        let sig = self.secp.sign_ecdsa(&msg, &self.key);
        tracing::trace!(payload_len = payload.len(), "Signed request payload");
        Ok(sig.serialize_der().to_vec())
    }
}

/// Check a DER-encoded signature over this payload.
pub fn verify_payload<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    pubkey: &PublicKey,
    payload: &[u8],
    der_sig: &[u8],
) -> Result<(), Error> {
    let msg = payload_message(payload)?;
    let sig = Signature::from_der(der_sig)
        .map_err(|e| Error::Signing(format!("invalid DER signature: {}", e)))?;
    secp.verify_ecdsa(&msg, &sig, pubkey)?;
    Ok(())
}
