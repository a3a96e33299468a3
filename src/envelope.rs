//! Signed requests
//!
//! A request body along with the headers authenticating it: the signature over
//! `path|timestamp|body` and the timestamp it was made at.

use crate::{
    error::Error,
    request::CreateTransactionRequest,
    signer::{verify_payload, RequestSigner},
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use miniscript::bitcoin::secp256k1::{self, PublicKey, Secp256k1};
use serde::{
    de::{self, Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use std::{
    fmt, str,
    time::{SystemTime, UNIX_EPOCH},
};

/// Endpoint creating a transaction.
pub const TRANSACTIONS_PATH: &str = "/api/v1/transactions";

/// Endpoint creating a transaction and waiting for it to reach a given state.
pub const CREATE_AND_WAIT_PATH: &str = "/api/v1/transactions/create-and-wait";

/// The string actually signed to authenticate a request.
pub fn signing_payload(path: &str, timestamp: u64, body: &str) -> String {
    format!("{}|{}|{}", path, timestamp, body)
}

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> Result<u64, Error> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Envelope(format!("system clock before UNIX epoch: {}", e)))?;
    Ok(elapsed.as_millis() as u64)
}

/// Check `signature` was made by `pubkey` over the raw `body` sent to `path` at `timestamp`.
pub fn verify_body<C: secp256k1::Verification>(
    secp: &Secp256k1<C>,
    path: &str,
    timestamp: u64,
    body: &str,
    signature: &RequestSignature,
    pubkey: &PublicKey,
) -> Result<(), Error> {
    let payload = signing_payload(path, timestamp, body);
    let der_sig = signature.decode()?;
    verify_payload(secp, pubkey, payload.as_bytes(), &der_sig).map_err(|e| {
        tracing::warn!(path, timestamp, "Invalid request signature");
        e
    })
}

/// A base64-encoded request signature.
///
/// The string is kept as received so it is forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature(String);

impl RequestSignature {
    pub fn from_der(der_sig: &[u8]) -> RequestSignature {
        RequestSignature(BASE64.encode(der_sig))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The raw signature bytes.
    pub fn decode(&self) -> Result<Vec<u8>, Error> {
        Ok(BASE64.decode(&self.0)?)
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl str::FromStr for RequestSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sig = RequestSignature(s.to_string());
        sig.decode()?;
        Ok(sig)
    }
}

impl Serialize for RequestSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RequestSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// A transaction creation request, authenticated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub create_transaction_with_wait_request: CreateTransactionRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_idempotence_id: Option<String>,
    pub x_signature: RequestSignature,
    /// Milliseconds since the UNIX epoch.
    pub x_timestamp: u64,
}

fn request_body(request: &CreateTransactionRequest) -> Result<String, Error> {
    Ok(serde_json::to_string(request)?)
}

impl SignedRequest {
    /// Sanity check the request and sign it for being sent to `path` at `timestamp`.
    pub fn sign(
        request: CreateTransactionRequest,
        path: &str,
        timestamp: u64,
        idempotence_id: Option<String>,
        signer: &impl RequestSigner,
    ) -> Result<SignedRequest, Error> {
        request.sanity_check()?;
        if timestamp == 0 {
            return Err(Error::Envelope("null timestamp".to_string()));
        }

        let body = request_body(&request)?;
        let payload = signing_payload(path, timestamp, &body);
        let der_sig = signer.sign_payload(payload.as_bytes())?;
        tracing::debug!(path, timestamp, body_len = body.len(), "Signed request");

        Ok(SignedRequest {
            create_transaction_with_wait_request: request,
            x_idempotence_id: idempotence_id,
            x_signature: RequestSignature::from_der(&der_sig),
            x_timestamp: timestamp,
        })
    }

    /// The JSON body of the request, as signed.
    pub fn request_body(&self) -> Result<String, Error> {
        request_body(&self.create_transaction_with_wait_request)
    }

    /// The payload the signature of this request commits to.
    pub fn signing_payload(&self, path: &str) -> Result<String, Error> {
        Ok(signing_payload(path, self.x_timestamp, &self.request_body()?))
    }

    /// Check the signature of this request was made by `pubkey` for `path`.
    ///
    /// The body is re-serialised from the typed request, so this only holds for requests
    /// signed by this crate. A request signed over a body serialised elsewhere (different key
    /// order, whitespace or explicit nulls) must be checked against the body as received, see
    /// [SignedRequest::verify_raw].
    pub fn verify<C: secp256k1::Verification>(
        &self,
        secp: &Secp256k1<C>,
        path: &str,
        pubkey: &PublicKey,
    ) -> Result<(), Error> {
        let body = self.request_body()?;
        verify_body(
            secp,
            path,
            self.x_timestamp,
            &body,
            &self.x_signature,
            pubkey,
        )
    }

    /// Check the signature of this request was made by `pubkey` over `body`, the JSON body
    /// exactly as it was sent to `path`, and that `body` is this request.
    pub fn verify_raw<C: secp256k1::Verification>(
        &self,
        secp: &Secp256k1<C>,
        path: &str,
        body: &str,
        pubkey: &PublicKey,
    ) -> Result<(), Error> {
        verify_body(secp, path, self.x_timestamp, body, &self.x_signature, pubkey)?;
        let signed: CreateTransactionRequest = serde_json::from_str(body)?;
        if signed != self.create_transaction_with_wait_request {
            return Err(Error::RequestMismatch(
                "signed body is not the request it authenticates".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the envelope is well-formed and the inner request sane. Does not check the
    /// signature, see [SignedRequest::verify].
    pub fn sanity_check(&self) -> Result<(), Error> {
        if self.x_timestamp == 0 {
            return Err(Error::Envelope("null timestamp".to_string()));
        }
        if let Some(ref id) = self.x_idempotence_id {
            if id.is_empty() {
                return Err(Error::Envelope("empty idempotence id".to_string()));
            }
        }
        self.x_signature.decode()?;
        self.create_transaction_with_wait_request.sanity_check()
    }
}
