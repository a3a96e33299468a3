//! Transaction requests
//!
//! Typesafe representation of the body of a "create transaction" call to the signing service.
//!
//! For UTXO chains the transaction is built by the caller and handed over as a PSBT (see
//! [bip-0174](https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki)), the service only
//! signs the inputs it is told to.

use crate::error::Error;

use serde::{Deserialize, Serialize};

mod evm;
mod utxo;

pub use evm::{
    erc20_transfer, find_token, native_transfer, to_base_units, AssetIdentifier, Erc20Token,
    EvmAssetDetails, EvmChain, EvmTransferDetails, GasConfig, GasPriorityLevel, TokenRef,
    TransferValue, KNOWN_TOKENS, NATIVE_DECIMALS,
};
pub use utxo::{
    AddressType, ChainRef, ChainType, InputSigningInstruction, PsbtSigningDetails, PushMode,
    Sender, SignerIdentity,
};

/// The state of the transaction the service should wait for before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitForState {
    Created,
    Approved,
    Signed,
    PushedToBlockchain,
    Mined,
    Completed,
}

/// The chain family of the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    UtxoTransaction,
    EvmTransaction,
}

/// Who signs the transaction on the service side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerType {
    ApiSigner,
    EndUser,
}

/// The type-specific part of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionDetails {
    #[serde(rename = "utxo_partially_signed_bitcoin_transaction")]
    UtxoPartiallySignedBitcoinTransaction(PsbtSigningDetails),
    EvmTransfer(EvmTransferDetails),
}

impl TransactionDetails {
    /// The transaction type these details are for.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionDetails::UtxoPartiallySignedBitcoinTransaction(_) => {
                TransactionType::UtxoTransaction
            }
            TransactionDetails::EvmTransfer(_) => TransactionType::EvmTransaction,
        }
    }
}

/// A request to create a transaction and wait for it to reach a given state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub wait_for_state: WaitForState,
    pub transaction_type: TransactionType,
    pub signer_type: SignerType,
    pub details: TransactionDetails,
}

impl CreateTransactionRequest {
    /// Get the PSBT signing details, if this is a request to sign a PSBT.
    pub fn psbt_details(&self) -> Option<&PsbtSigningDetails> {
        match self.details {
            TransactionDetails::UtxoPartiallySignedBitcoinTransaction(ref details) => {
                Some(details)
            }
            _ => None,
        }
    }

    /// Sanity check the request before sending it to the service.
    pub fn sanity_check(&self) -> Result<(), Error> {
        let details_type = self.details.transaction_type();
        if details_type != self.transaction_type {
            return Err(Error::RequestMismatch(format!(
                "transaction type is {:?} but details are for {:?}",
                self.transaction_type, details_type
            )));
        }

        match self.details {
            TransactionDetails::UtxoPartiallySignedBitcoinTransaction(ref details) => {
                details.sanity_check()
            }
            TransactionDetails::EvmTransfer(ref details) => details.sanity_check(),
        }
    }
}
