//! EVM transaction details
//!
//! Transfers out of a vault, of either the chain's native coin or an ERC-20 token. Only the few
//! tokens we know the contract of are supported.

use crate::{
    error::Error,
    request::{
        CreateTransactionRequest, SignerType, TransactionDetails, TransactionType, WaitForState,
    },
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::{fmt, str};

/// An EVM chain we know token contracts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvmChain {
    Bsc,
    Ethereum,
}

impl EvmChain {
    /// The service's identifier for this chain's mainnet.
    pub fn unique_id(&self) -> String {
        format!("evm_{}_mainnet", self)
    }
}

impl fmt::Display for EvmChain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvmChain::Bsc => write!(f, "bsc"),
            EvmChain::Ethereum => write!(f, "ethereum"),
        }
    }
}

impl str::FromStr for EvmChain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bsc" => Ok(EvmChain::Bsc),
            "ethereum" => Ok(EvmChain::Ethereum),
            _ => Err(Error::UnsupportedAsset(format!("unknown EVM chain '{}'", s))),
        }
    }
}

/// Decimals of the native coin of the EVM chains we support (BNB, ETH).
pub const NATIVE_DECIMALS: u32 = 18;

/// A known ERC-20 token deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20Token {
    pub ticker: &'static str,
    pub chain: EvmChain,
    pub contract: &'static str,
    pub decimals: u32,
}

/// The tokens we can transfer.
pub static KNOWN_TOKENS: [Erc20Token; 3] = [
    Erc20Token {
        ticker: "usdt",
        chain: EvmChain::Bsc,
        contract: "0x55d398326f99059fF775485246999027B3197955",
        decimals: 18,
    },
    Erc20Token {
        ticker: "usdt",
        chain: EvmChain::Ethereum,
        contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        decimals: 6,
    },
    Erc20Token {
        ticker: "pepe",
        chain: EvmChain::Ethereum,
        contract: "0x6982508145454Ce325dDbE47a25d4ec3d2311933",
        decimals: 18,
    },
];

/// Look up a token by its (case-insensitive) ticker on this chain.
pub fn find_token(chain: EvmChain, ticker: &str) -> Result<&'static Erc20Token, Error> {
    KNOWN_TOKENS
        .iter()
        .find(|t| t.chain == chain && t.ticker.eq_ignore_ascii_case(ticker))
        .ok_or_else(|| {
            Error::UnsupportedAsset(format!(
                "token '{}' is not supported for chain '{}'",
                ticker, chain
            ))
        })
}

/// Convert a decimal amount of tokens (eg "123.45") into an integer amount of base units.
///
/// Fractional digits beyond the token precision are truncated.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<String, Error> {
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::Amount(format!("invalid amount '{}'", amount)));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(Error::Amount(format!("invalid amount '{}'", amount)));
    }

    let overflow = || Error::Amount(format!("amount '{}' is too large", amount));
    let scale = 10u128.checked_pow(decimals).ok_or_else(overflow)?;
    let int_value = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<u128>().map_err(|_| overflow())?
    };

    let decimals = decimals as usize;
    let mut frac_digits: String = frac_part.chars().take(decimals).collect();
    while frac_digits.len() < decimals {
        frac_digits.push('0');
    }
    let frac_value = if frac_digits.is_empty() {
        0
    } else {
        frac_digits.parse::<u128>().map_err(|_| overflow())?
    };

    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .map(|v| v.to_string())
        .ok_or_else(overflow)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasPriorityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GasConfig {
    #[serde(rename_all = "camelCase")]
    Priority { priority_level: GasPriorityLevel },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferValue {
    /// An exact amount of base units, as a decimal integer string.
    Value { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub chain: String,
    pub hex_repr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvmAssetDetails {
    /// The coin of the chain, identified by the chain's unique id.
    Native { chain: String },
    Erc20 { token: TokenRef },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetIdentifier {
    Evm { details: EvmAssetDetails },
}

/// Details of a request to transfer a native coin or an ERC-20 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTransferDetails {
    pub gas: GasConfig,
    pub to: String,
    pub value: TransferValue,
    pub asset_identifier: AssetIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub vault_id: Uuid,
}

fn is_evm_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn is_evm_chain_id(s: &str) -> bool {
    s.starts_with("evm_") && s.len() > "evm_".len()
}

impl EvmTransferDetails {
    pub fn sanity_check(&self) -> Result<(), Error> {
        if !is_evm_address(&self.to) {
            return Err(Error::Address(format!(
                "invalid destination address '{}'",
                self.to
            )));
        }

        match self.value {
            TransferValue::Value { ref value } => {
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::Amount(format!("invalid transfer value '{}'", value)));
                }
            }
        }

        match self.asset_identifier {
            AssetIdentifier::Evm {
                details: EvmAssetDetails::Native { ref chain },
            } => {
                if !is_evm_chain_id(chain) {
                    return Err(Error::UnsupportedAsset(format!(
                        "invalid native coin chain '{}'",
                        chain
                    )));
                }
            }
            AssetIdentifier::Evm {
                details: EvmAssetDetails::Erc20 { ref token },
            } => {
                if !is_evm_chain_id(&token.chain) {
                    return Err(Error::UnsupportedAsset(format!(
                        "invalid token chain '{}'",
                        token.chain
                    )));
                }
                if !is_evm_address(&token.hex_repr) {
                    return Err(Error::Address(format!(
                        "invalid token contract '{}'",
                        token.hex_repr
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Create a request to transfer `amount` (in token units, eg "0.5") of the token `ticker` from
/// the vault to `destination`, signed by the API signer.
pub fn erc20_transfer(
    chain: EvmChain,
    ticker: &str,
    vault_id: Uuid,
    destination: &str,
    amount: &str,
    note: Option<String>,
) -> Result<CreateTransactionRequest, Error> {
    let token = find_token(chain, ticker)?;
    let value = to_base_units(amount, token.decimals)?;
    tracing::debug!(%chain, ticker, %value, "Building ERC-20 transfer request");

    transfer_request(
        EvmAssetDetails::Erc20 {
            token: TokenRef {
                chain: chain.unique_id(),
                hex_repr: token.contract.to_string(),
            },
        },
        vault_id,
        destination,
        value,
        note,
    )
}

/// Create a request to transfer `amount` (in coin units, eg "0.01") of the chain's native coin
/// from the vault to `destination`, signed by the API signer.
pub fn native_transfer(
    chain: EvmChain,
    vault_id: Uuid,
    destination: &str,
    amount: &str,
    note: Option<String>,
) -> Result<CreateTransactionRequest, Error> {
    let value = to_base_units(amount, NATIVE_DECIMALS)?;
    tracing::debug!(%chain, %value, "Building native transfer request");

    transfer_request(
        EvmAssetDetails::Native {
            chain: chain.unique_id(),
        },
        vault_id,
        destination,
        value,
        note,
    )
}

fn transfer_request(
    asset: EvmAssetDetails,
    vault_id: Uuid,
    destination: &str,
    value: String,
    note: Option<String>,
) -> Result<CreateTransactionRequest, Error> {
    let details = EvmTransferDetails {
        gas: GasConfig::Priority {
            priority_level: GasPriorityLevel::Medium,
        },
        to: destination.to_string(),
        value: TransferValue::Value { value },
        asset_identifier: AssetIdentifier::Evm { details: asset },
        note,
        vault_id,
    };
    details.sanity_check()?;

    Ok(CreateTransactionRequest {
        wait_for_state: WaitForState::Signed,
        transaction_type: TransactionType::EvmTransaction,
        signer_type: SignerType::ApiSigner,
        details: TransactionDetails::EvmTransfer(details),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEST: &str = "0xF659feEE62120Ce669A5C45Eb6616319D552dD93";

    fn vault_id() -> Uuid {
        Uuid::parse_str("652a2334-a673-4851-ad86-627781689592").unwrap()
    }

    #[test]
    fn base_units_conversion() {
        assert_eq!(to_base_units("123.45", 6).unwrap(), "123450000");
        assert_eq!(to_base_units("0.00001", 18).unwrap(), "10000000000000");
        assert_eq!(to_base_units("1", 18).unwrap(), "1000000000000000000");
        assert_eq!(to_base_units(".5", 6).unwrap(), "500000");
        assert_eq!(to_base_units("7.", 2).unwrap(), "700");
        assert_eq!(to_base_units("0", 6).unwrap(), "0");
        // Truncated, not rounded
        assert_eq!(to_base_units("1.0000019", 6).unwrap(), "1000001");
        assert_eq!(to_base_units("42", 0).unwrap(), "42");

        for invalid in &["", ".", "1.2.3", "-1", "1e6", "12a", " 1"] {
            match to_base_units(invalid, 6) {
                Err(Error::Amount(e)) => assert!(e.contains("invalid amount")),
                r => panic!("unexpected {:?} for '{}'", r, invalid),
            }
        }
        match to_base_units("340282366920938463463374607431768211455", 18) {
            Err(Error::Amount(e)) => assert!(e.contains("too large")),
            r => panic!("unexpected {:?}", r),
        }
        assert!(to_base_units("1", 40).is_err());
    }

    #[test]
    fn token_lookup() {
        assert_eq!(find_token(EvmChain::Ethereum, "USDT").unwrap().decimals, 6);
        assert_eq!(find_token(EvmChain::Bsc, "usdt").unwrap().decimals, 18);
        assert_eq!(
            find_token(EvmChain::Bsc, "pepe"),
            Err(Error::UnsupportedAsset(
                "token 'pepe' is not supported for chain 'bsc'".to_string()
            ))
        );
        assert_eq!(EvmChain::Bsc.unique_id(), "evm_bsc_mainnet");
    }

    #[test]
    fn erc20_transfer_request() {
        let req = erc20_transfer(
            EvmChain::Ethereum,
            "pepe",
            vault_id(),
            DEST,
            "2.5",
            Some("Daily PEPE vesting".to_string()),
        )
        .unwrap();
        req.sanity_check().unwrap();

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["transactionType"], "evm_transaction");
        assert_eq!(json["signerType"], "api_signer");
        assert_eq!(json["waitForState"], "signed");
        let details = &json["details"];
        assert_eq!(details["type"], "evm_transfer");
        assert_eq!(details["gas"]["type"], "priority");
        assert_eq!(details["gas"]["priorityLevel"], "medium");
        assert_eq!(details["to"], DEST);
        assert_eq!(details["value"]["type"], "value");
        assert_eq!(details["value"]["value"], "2500000000000000000");
        assert_eq!(details["assetIdentifier"]["type"], "evm");
        assert_eq!(details["assetIdentifier"]["details"]["type"], "erc20");
        assert_eq!(
            details["assetIdentifier"]["details"]["token"]["chain"],
            "evm_ethereum_mainnet"
        );
        assert_eq!(
            details["assetIdentifier"]["details"]["token"]["hexRepr"],
            "0x6982508145454Ce325dDbE47a25d4ec3d2311933"
        );
        assert_eq!(details["note"], "Daily PEPE vesting");
        assert_eq!(details["vaultId"], "652a2334-a673-4851-ad86-627781689592");

        let back: CreateTransactionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn native_transfer_request() {
        let req = native_transfer(
            EvmChain::Bsc,
            vault_id(),
            DEST,
            "0.000001",
            Some("Daily BNB vesting".to_string()),
        )
        .unwrap();
        req.sanity_check().unwrap();

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["transactionType"], "evm_transaction");
        let details = &json["details"];
        assert_eq!(details["type"], "evm_transfer");
        assert_eq!(details["value"]["value"], "1000000000000");
        assert_eq!(details["assetIdentifier"]["type"], "evm");
        assert_eq!(details["assetIdentifier"]["details"]["type"], "native");
        assert_eq!(
            details["assetIdentifier"]["details"]["chain"],
            "evm_bsc_mainnet"
        );
        assert!(details["assetIdentifier"]["details"].get("token").is_none());

        let back: CreateTransactionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);

        assert!(matches!(
            native_transfer(EvmChain::Ethereum, vault_id(), "0xdead", "1", None),
            Err(Error::Address(_))
        ));
        assert!(matches!(
            native_transfer(EvmChain::Ethereum, vault_id(), DEST, "-1", None),
            Err(Error::Amount(_))
        ));
    }

    #[test]
    fn chain_from_str() {
        assert_eq!("bsc".parse::<EvmChain>().unwrap(), EvmChain::Bsc);
        assert_eq!("ethereum".parse::<EvmChain>().unwrap(), EvmChain::Ethereum);
        assert!(matches!(
            "solana".parse::<EvmChain>(),
            Err(Error::UnsupportedAsset(_))
        ));
    }

    fn erc20_details(value: &str, hex_repr: &str) -> EvmTransferDetails {
        EvmTransferDetails {
            gas: GasConfig::Priority {
                priority_level: GasPriorityLevel::High,
            },
            to: DEST.to_string(),
            value: TransferValue::Value {
                value: value.to_string(),
            },
            asset_identifier: AssetIdentifier::Evm {
                details: EvmAssetDetails::Erc20 {
                    token: TokenRef {
                        chain: "evm_ethereum_mainnet".to_string(),
                        hex_repr: hex_repr.to_string(),
                    },
                },
            },
            note: None,
            vault_id: vault_id(),
        }
    }

    #[test]
    fn transfer_details_sanity() {
        let contract = KNOWN_TOKENS[1].contract;
        erc20_details("1", contract).sanity_check().unwrap();
        erc20_details("0", contract).sanity_check().unwrap();

        for value in &["", "1.5", "-1", "0x10", " 1", "1e18"] {
            assert_eq!(
                erc20_details(value, contract).sanity_check(),
                Err(Error::Amount(format!("invalid transfer value '{}'", value)))
            );
        }

        for hex_repr in &[
            "",
            "0x",
            "dAC17F958D2ee523a2206206994597C13D831ec7",
            "0xdAC17F958D2ee523a2206206994597C13D831ec",
            "0xdAC17F958D2ee523a2206206994597C13D831ec7a",
            "0xgAC17F958D2ee523a2206206994597C13D831ec7",
        ] {
            assert_eq!(
                erc20_details("1", hex_repr).sanity_check(),
                Err(Error::Address(format!("invalid token contract '{}'", hex_repr)))
            );
        }

        // The value is checked before the token
        assert!(matches!(
            erc20_details("", "0x").sanity_check(),
            Err(Error::Amount(_))
        ));

        let mut details = erc20_details("1", contract);
        details.to = "0xF659feEE62120Ce669A5C45Eb6616319D552dD9".to_string();
        assert!(matches!(details.sanity_check(), Err(Error::Address(_))));

        let mut details = erc20_details("1", contract);
        details.asset_identifier = AssetIdentifier::Evm {
            details: EvmAssetDetails::Erc20 {
                token: TokenRef {
                    chain: "bitcoin_mainnet".to_string(),
                    hex_repr: contract.to_string(),
                },
            },
        };
        assert!(matches!(
            details.sanity_check(),
            Err(Error::UnsupportedAsset(_))
        ));

        let mut details = erc20_details("1", contract);
        details.asset_identifier = AssetIdentifier::Evm {
            details: EvmAssetDetails::Native {
                chain: "evm_bsc_mainnet".to_string(),
            },
        };
        details.sanity_check().unwrap();
        details.asset_identifier = AssetIdentifier::Evm {
            details: EvmAssetDetails::Native {
                chain: "evm_".to_string(),
            },
        };
        assert!(matches!(
            details.sanity_check(),
            Err(Error::UnsupportedAsset(_))
        ));
    }

    #[test]
    fn erc20_transfer_insane() {
        assert!(matches!(
            erc20_transfer(EvmChain::Bsc, "usdt", vault_id(), "0xdead", "1", None),
            Err(Error::Address(_))
        ));
        assert!(matches!(
            erc20_transfer(EvmChain::Bsc, "usdt", vault_id(), DEST, "one", None),
            Err(Error::Amount(_))
        ));
        assert!(matches!(
            erc20_transfer(EvmChain::Bsc, "shib", vault_id(), DEST, "1", None),
            Err(Error::UnsupportedAsset(_))
        ));
    }
}
