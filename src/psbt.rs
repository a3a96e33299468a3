//! Raw PSBT data
//!
//! The PSBT to be signed is handed to the signing service as a `0x`-prefixed hex string. We
//! never decode it: the exact string we were given is the one we serialize back.

use crate::error::Error;

use serde::{
    de::{self, Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use std::{fmt, str};

/// The BIP174 magic bytes (`psbt` followed by the `0xff` separator), hex encoded.
pub const PSBT_MAGIC_HEX: &str = "70736274ff";

const HEX_PREFIX: &str = "0x";

/// A hex encoded BIP174-serialized PSBT, kept as an opaque string.
///
/// Only lexical checks are performed on creation: the `0x` prefix, an even number of hex digits
/// and the leading BIP174 magic. The content is forwarded byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PsbtRawData(String);

impl PsbtRawData {
    pub fn new(raw: String) -> Result<PsbtRawData, Error> {
        let digits = raw
            .strip_prefix(HEX_PREFIX)
            .ok_or_else(|| Error::PsbtData(format!("missing '{}' prefix", HEX_PREFIX)))?;

        if digits.is_empty() {
            return Err(Error::PsbtData("empty PSBT".to_string()));
        }
        if digits.len() % 2 != 0 {
            return Err(Error::PsbtData(format!(
                "odd number of hex digits ({})",
                digits.len()
            )));
        }
        if let Some(pos) = digits.find(|c: char| !c.is_ascii_hexdigit()) {
            return Err(Error::PsbtData(format!(
                "invalid hex character at position {}",
                pos + HEX_PREFIX.len()
            )));
        }
        if !digits
            .get(..PSBT_MAGIC_HEX.len())
            .map(|magic| magic.eq_ignore_ascii_case(PSBT_MAGIC_HEX))
            .unwrap_or(false)
        {
            return Err(Error::PsbtData("missing BIP174 magic".to_string()));
        }

        Ok(PsbtRawData(raw))
    }

    /// The exact string this was created from, prefix included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Size of the encoded PSBT, in bytes.
    pub fn byte_len(&self) -> usize {
        (self.0.len() - HEX_PREFIX.len()) / 2
    }
}

impl fmt::Display for PsbtRawData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl str::FromStr for PsbtRawData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PsbtRawData::new(s.to_string())
    }
}

impl Serialize for PsbtRawData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PsbtRawData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        PsbtRawData::new(String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}
