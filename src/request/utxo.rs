//! UTXO transaction details
//!
//! Signing instructions for a pre-built PSBT. The service is told which inputs to sign, with
//! which sighash types and which of the vault's addresses (or keys), and who the sender is.

use crate::{error::Error, psbt::PsbtRawData};

use miniscript::bitcoin::{
    address::{AddressType as BitcoinAddressType, NetworkUnchecked},
    secp256k1::XOnlyPublicKey,
    sighash::{EcdsaSighashType, TapSighashType},
    Address, Network, PublicKey,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::{collections::HashSet, str::FromStr};

/// Who should sign a given input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignerIdentity {
    /// The vault key controlling this address.
    #[serde(rename_all = "camelCase")]
    Address { address: String },
    /// The vault key with this public key, hex encoded (compressed or x-only).
    #[serde(rename_all = "camelCase")]
    PublicKey { public_key: String },
}

/// Instructions to sign a single input of the PSBT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSigningInstruction {
    /// Zero-based index of the input in the PSBT.
    pub index: u32,
    /// Allowed sighash types, as consensus codes.
    pub sighash_types: Vec<u8>,
    pub signer_identity: SignerIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_tweak_signer: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Utxo,
    Evm,
}

/// Identifies a chain to the signing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRef {
    pub unique_id: String,
    pub chain_type: ChainType,
}

impl ChainRef {
    pub fn bitcoin(network: Network) -> ChainRef {
        let unique_id = match network {
            Network::Bitcoin => "bitcoin_mainnet",
            Network::Testnet => "bitcoin_testnet",
            Network::Signet => "bitcoin_signet",
            _ => "bitcoin_regtest",
        };
        ChainRef {
            unique_id: unique_id.to_string(),
            chain_type: ChainType::Utxo,
        }
    }

    /// The Bitcoin network this chain refers to, if it is a Bitcoin chain we know of.
    pub fn network(&self) -> Option<Network> {
        if self.chain_type != ChainType::Utxo {
            return None;
        }
        match self.unique_id.as_str() {
            "bitcoin_mainnet" => Some(Network::Bitcoin),
            "bitcoin_testnet" => Some(Network::Testnet),
            "bitcoin_signet" => Some(Network::Signet),
            "bitcoin_regtest" => Some(Network::Regtest),
            _ => None,
        }
    }
}

/// The address format of the sending address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Legacy,
    NestedSegwit,
    Segwit,
    Taproot,
}

impl AddressType {
    fn matches(&self, addr_type: Option<BitcoinAddressType>) -> bool {
        matches!(
            (self, addr_type),
            (AddressType::Legacy, Some(BitcoinAddressType::P2pkh))
                | (AddressType::NestedSegwit, Some(BitcoinAddressType::P2sh))
                | (AddressType::Segwit, Some(BitcoinAddressType::P2wpkh))
                | (AddressType::Segwit, Some(BitcoinAddressType::P2wsh))
                | (AddressType::Taproot, Some(BitcoinAddressType::P2tr))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub address: String,
    pub chain: ChainRef,
    pub address_type: AddressType,
}

/// Whether the service broadcasts the transaction once signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushMode {
    Auto,
    /// Don't broadcast, the caller will.
    Manual,
    Deferred,
}

/// Details of a request to sign a pre-built PSBT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsbtSigningDetails {
    pub inputs: Vec<InputSigningInstruction>,
    /// Have the service finalize the PSBT inputs once signed.
    pub auto_finalize: bool,
    pub psbt_raw_data: PsbtRawData,
    pub sender: Sender,
    pub push_mode: PushMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub vault_id: Uuid,
}

fn parse_address(address: &str, network: Network) -> Result<Address, Error> {
    Address::<NetworkUnchecked>::from_str(address)
        .and_then(|addr| addr.require_network(network))
        .map_err(|e| Error::Address(format!("'{}': {}", address, e)))
}

impl PsbtSigningDetails {
    /// Get the signing instruction for the PSBT input at this index, if any.
    pub fn input(&self, index: u32) -> Option<&InputSigningInstruction> {
        self.inputs.iter().find(|i| i.index == index)
    }

    /// Check the signing instructions are consistent, without looking into the PSBT.
    ///
    /// We don't check that the inputs actually exist in the PSBT, that's left to the service.
    pub fn sanity_check(&self) -> Result<(), Error> {
        if self.inputs.is_empty() {
            return Err(Error::InputInstruction("no input to sign".to_string()));
        }

        let mut seen_indexes = HashSet::with_capacity(self.inputs.len());
        for input in self.inputs.iter() {
            if !seen_indexes.insert(input.index) {
                return Err(Error::InputInstruction(format!(
                    "duplicated input index {}",
                    input.index
                )));
            }
            self.check_sighash_types(input)?;
        }

        let network = match self.sender.chain.network() {
            Some(network) => network,
            None => {
                tracing::debug!(
                    chain = %self.sender.chain.unique_id,
                    "Unknown chain, not checking addresses"
                );
                return Ok(());
            }
        };

        let sender = parse_address(&self.sender.address, network)?;
        if !self.sender.address_type.matches(sender.address_type()) {
            return Err(Error::Address(format!(
                "sender '{}' is not a {:?} address",
                self.sender.address, self.sender.address_type
            )));
        }

        for input in self.inputs.iter() {
            match input.signer_identity {
                SignerIdentity::Address { ref address } => {
                    parse_address(address, network)?;
                }
                SignerIdentity::PublicKey { ref public_key } => {
                    if PublicKey::from_str(public_key).is_err()
                        && XOnlyPublicKey::from_str(public_key).is_err()
                    {
                        return Err(Error::Address(format!(
                            "invalid signer public key '{}'",
                            public_key
                        )));
                    }
                }
            }
        }

        tracing::trace!(
            inputs = self.inputs.len(),
            psbt_size = self.psbt_raw_data.byte_len(),
            "PSBT signing details are sane"
        );
        Ok(())
    }

    fn check_sighash_types(&self, input: &InputSigningInstruction) -> Result<(), Error> {
        if input.sighash_types.is_empty() {
            return Err(Error::InputInstruction(format!(
                "no sighash type for input {}",
                input.index
            )));
        }

        let mut seen = HashSet::with_capacity(input.sighash_types.len());
        for code in input.sighash_types.iter().copied() {
            if !seen.insert(code) {
                return Err(Error::InputInstruction(format!(
                    "duplicated sighash type {} for input {}",
                    code, input.index
                )));
            }
            let valid = if self.sender.address_type == AddressType::Taproot {
                TapSighashType::from_consensus_u8(code).is_ok()
            } else {
                EcdsaSighashType::from_standard(code.into()).is_ok()
            };
            if !valid {
                return Err(Error::InputInstruction(format!(
                    "invalid sighash type {:#04x} for input {}",
                    code, input.index
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAPROOT_ADDR: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";
    const P2WPKH_ADDR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const TESTNET_P2WPKH_ADDR: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

    fn taproot_details() -> PsbtSigningDetails {
        PsbtSigningDetails {
            inputs: vec![InputSigningInstruction {
                index: 0,
                sighash_types: vec![1],
                signer_identity: SignerIdentity::Address {
                    address: TAPROOT_ADDR.to_string(),
                },
                disable_tweak_signer: None,
            }],
            auto_finalize: true,
            psbt_raw_data: PsbtRawData::new("0x70736274ff0100".to_string()).unwrap(),
            sender: Sender {
                address: TAPROOT_ADDR.to_string(),
                chain: ChainRef::bitcoin(Network::Bitcoin),
                address_type: AddressType::Taproot,
            },
            push_mode: PushMode::Manual,
            note: None,
            vault_id: Uuid::parse_str("9597e08a-32a8-4f96-a043-a3e7f1675f8d").unwrap(),
        }
    }

    #[test]
    fn chain_network() {
        assert_eq!(
            ChainRef::bitcoin(Network::Testnet).network(),
            Some(Network::Testnet)
        );
        let doge = ChainRef {
            unique_id: "dogecoin_mainnet".to_string(),
            chain_type: ChainType::Utxo,
        };
        assert_eq!(doge.network(), None);
        let evm = ChainRef {
            unique_id: "bitcoin_mainnet".to_string(),
            chain_type: ChainType::Evm,
        };
        assert_eq!(evm.network(), None);
    }

    #[test]
    fn sanity_check_inputs() {
        let details = taproot_details();
        details.sanity_check().unwrap();
        assert_eq!(details.input(0).unwrap().sighash_types, vec![1]);
        assert!(details.input(1).is_none());

        let mut details = taproot_details();
        details.inputs.clear();
        assert_eq!(
            details.sanity_check(),
            Err(Error::InputInstruction("no input to sign".to_string()))
        );

        let mut details = taproot_details();
        let dup = details.inputs[0].clone();
        details.inputs.push(dup);
        assert_eq!(
            details.sanity_check(),
            Err(Error::InputInstruction(
                "duplicated input index 0".to_string()
            ))
        );

        let mut details = taproot_details();
        details.inputs[0].sighash_types = vec![];
        assert!(details.sanity_check().is_err());

        let mut details = taproot_details();
        details.inputs[0].sighash_types = vec![1, 1];
        assert!(details.sanity_check().is_err());
    }

    #[test]
    fn sanity_check_sighash_codes() {
        // SIGHASH_DEFAULT is only valid for Taproot
        let mut details = taproot_details();
        details.inputs[0].sighash_types = vec![0x00, 0x81, 0x83];
        details.sanity_check().unwrap();
        details.inputs[0].sighash_types = vec![0x04];
        match details.sanity_check() {
            Err(Error::InputInstruction(e)) => assert!(e.contains("0x04")),
            r => panic!("unexpected {:?}", r),
        }

        let mut details = taproot_details();
        details.sender.address = P2WPKH_ADDR.to_string();
        details.sender.address_type = AddressType::Segwit;
        details.sanity_check().unwrap();
        details.inputs[0].sighash_types = vec![0x00];
        assert!(details.sanity_check().is_err());
    }

    #[test]
    fn sanity_check_addresses() {
        // Address type mismatch
        let mut details = taproot_details();
        details.sender.address = P2WPKH_ADDR.to_string();
        match details.sanity_check() {
            Err(Error::Address(e)) => assert!(e.contains("Taproot")),
            r => panic!("unexpected {:?}", r),
        }

        // Network mismatch
        let mut details = taproot_details();
        details.inputs[0].signer_identity = SignerIdentity::Address {
            address: TESTNET_P2WPKH_ADDR.to_string(),
        };
        assert!(matches!(details.sanity_check(), Err(Error::Address(_))));

        // Garbage
        let mut details = taproot_details();
        details.sender.address = "bc1pnotanaddress".to_string();
        assert!(matches!(details.sanity_check(), Err(Error::Address(_))));

        // Unknown chains are not checked
        let mut details = taproot_details();
        details.sender.chain.unique_id = "litecoin_mainnet".to_string();
        details.sender.address = "ltc1qgarbage".to_string();
        details.sanity_check().unwrap();
    }

    #[test]
    fn sanity_check_public_keys() {
        let mut details = taproot_details();
        details.inputs[0].signer_identity = SignerIdentity::PublicKey {
            public_key: "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
                .to_string(),
        };
        details.sanity_check().unwrap();
        details.inputs[0].signer_identity = SignerIdentity::PublicKey {
            public_key: "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
                .to_string(),
        };
        details.sanity_check().unwrap();
        details.inputs[0].signer_identity = SignerIdentity::PublicKey {
            public_key: "02deadbeef".to_string(),
        };
        assert!(matches!(details.sanity_check(), Err(Error::Address(_))));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let details = taproot_details();
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("note").is_none());
        assert!(json["inputs"][0].get("disableTweakSigner").is_none());
        assert_eq!(json["inputs"][0]["signerIdentity"]["type"], "address");
        assert_eq!(json["sender"]["chain"]["uniqueId"], "bitcoin_mainnet");
        assert_eq!(json["sender"]["chain"]["chainType"], "utxo");
        assert_eq!(json["sender"]["addressType"], "taproot");
        assert_eq!(json["pushMode"], "manual");

        let mut details = taproot_details();
        details.inputs[0].disable_tweak_signer = Some(true);
        details.inputs[0].signer_identity = SignerIdentity::PublicKey {
            public_key: "ab".to_string(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["inputs"][0]["disableTweakSigner"], true);
        assert_eq!(json["inputs"][0]["signerIdentity"]["type"], "public_key");
        assert_eq!(json["inputs"][0]["signerIdentity"]["publicKey"], "ab");
        let back: PsbtSigningDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }
}
