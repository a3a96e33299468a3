//! Sample requests
//!
//! A complete, signed request to have the API signer sign the first input of a Taproot PSBT.
//! It is available both as a Rust value and as the JSON body sent on the wire.

use crate::{
    envelope::SignedRequest,
    psbt::PsbtRawData,
    request::{
        AddressType, ChainRef, CreateTransactionRequest, InputSigningInstruction,
        PsbtSigningDetails, PushMode, Sender, SignerIdentity, SignerType, TransactionDetails,
        TransactionType, WaitForState,
    },
};

use miniscript::bitcoin::Network;
use uuid::Uuid;

/// The JSON form of [utxo_psbt_request].
pub const UTXO_PSBT_REQUEST_JSON: &str = include_str!("../fixtures/utxo_psbt_request.json");

/// The vault's Taproot address, both sender and signer of the input.
pub const VAULT_ADDRESS: &str = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";

pub const VAULT_ID: Uuid = Uuid::from_u128(0x9597e08a_32a8_4f96_a043_a3e7f1675f8d);

/// A 2-inputs 2-outputs Taproot PSBT, spending to a Taproot output with change.
pub const PSBT_RAW_DATA: &str = "0x70736274ff0100b202000000023c4be07bddda8be2e4bd60bebded5b463e83cf32e2b3943fa630f8dfe983a6f10000000000fdfffffff2e7e25bb30dddd86ef876bcc381a49b65aba881c515d1ce3073c78b3a09f6d10100000000fdffffff02c0d4010000000000225120c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee53c7300000000000022512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798000000000001012ba08601000000000022512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179801172079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f817980001012b50c300000000000022512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179801172079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798000000";

/// Secret key the sample request is signed with. It is the scalar `0x0101..01`, for tests only.
pub const FIXTURE_SIGNING_KEY_HEX: &str =
    "0101010101010101010101010101010101010101010101010101010101010101";

/// Signature of the sample request body by [FIXTURE_SIGNING_KEY_HEX], on
/// [crate::envelope::CREATE_AND_WAIT_PATH] at [X_TIMESTAMP].
pub const X_SIGNATURE: &str = "MEUCIQCyKb9jSkQ1BNgkApIE86wwKLJNxg1WTHQUlycVzNnppwIgS4d1wsq+LDwxpvt/bNZvPmqNp+T/+5h9Y5YwQFiGPTA=";

pub const X_TIMESTAMP: u64 = 1_739_455_024_331;

/// Build the sample request.
pub fn utxo_psbt_request() -> SignedRequest {
    SignedRequest {
        create_transaction_with_wait_request: CreateTransactionRequest {
            wait_for_state: WaitForState::Signed,
            transaction_type: TransactionType::UtxoTransaction,
            signer_type: SignerType::ApiSigner,
            details: TransactionDetails::UtxoPartiallySignedBitcoinTransaction(
                PsbtSigningDetails {
                    inputs: vec![InputSigningInstruction {
                        index: 0,
                        sighash_types: vec![1],
                        signer_identity: SignerIdentity::Address {
                            address: VAULT_ADDRESS.to_string(),
                        },
                        disable_tweak_signer: None,
                    }],
                    auto_finalize: true,
                    psbt_raw_data: PsbtRawData::new(PSBT_RAW_DATA.to_string())
                        .expect("Hardcoded PSBT is well-formed"),
                    sender: Sender {
                        address: VAULT_ADDRESS.to_string(),
                        chain: ChainRef::bitcoin(Network::Bitcoin),
                        address_type: AddressType::Taproot,
                    },
                    push_mode: PushMode::Manual,
                    note: None,
                    vault_id: VAULT_ID,
                },
            ),
        },
        x_idempotence_id: None,
        x_signature: X_SIGNATURE
            .parse()
            .expect("Hardcoded signature is valid base64"),
        x_timestamp: X_TIMESTAMP,
    }
}
