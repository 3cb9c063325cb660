//! # Conditional Transaction Commitment
//!
//! The transfer that, upon dispute resolution, pays out an app's outcome
//! through its interpreter. Signed at install time, before the app's
//! funding is debited from free balance.

use shared_crypto::abi::{self, Token};
use shared_types::{
    Address, Bytes32, ConditionalTransactionCommitmentJson, InterpreterParams, MultisigOperation,
    MultisigTransaction, NetworkContext, SignatureBytes, U256,
};

use super::errors::CommitmentError;
use super::multisig_commitment::MultisigTxCommitment;

/// ABI-encode interpreter parameters per their outcome shape.
#[must_use]
pub fn encode_interpreter_params(params: &InterpreterParams) -> Vec<u8> {
    match params {
        InterpreterParams::TwoPartyFixedOutcome {
            player_addrs,
            amount,
        } => abi::encode(&[
            Token::AddressArray(player_addrs.clone()),
            Token::Uint(*amount),
        ]),
        InterpreterParams::SingleAssetTwoPartyCoinTransfer {
            limit,
            token_address,
        } => abi::encode(&[Token::Uint(*limit), Token::Address(*token_address)]),
        InterpreterParams::MultiAssetMultiPartyCoinTransfer {
            limit,
            token_addresses,
        } => abi::encode(&[
            Token::UintArray(limit.clone()),
            Token::AddressArray(token_addresses.clone()),
        ]),
    }
}

/// The conditional payout transaction for one installed app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalTransactionCommitment {
    commitment: MultisigTxCommitment,
    app_identity_hash: Bytes32,
    free_balance_app_identity_hash: Bytes32,
    interpreter_addr: Address,
    interpreter_params: InterpreterParams,
    multisig_owners: Vec<Address>,
}

impl ConditionalTransactionCommitment {
    pub fn new(
        network: &NetworkContext,
        multisig_address: Address,
        multisig_owners: &[Address],
        app_identity_hash: Bytes32,
        free_balance_app_identity_hash: Bytes32,
        interpreter_params: InterpreterParams,
    ) -> Result<Self, CommitmentError> {
        let interpreter_addr = network.interpreter_address(interpreter_params.outcome_type());
        let data = abi::encode_call(
            "executeEffectOfInterpretedAppOutcome(address,bytes32,bytes32,address,bytes)",
            &[
                Token::Address(network.challenge_registry),
                Token::FixedBytes(free_balance_app_identity_hash),
                Token::FixedBytes(app_identity_hash),
                Token::Address(interpreter_addr),
                Token::Bytes(encode_interpreter_params(&interpreter_params)),
            ],
        );
        let inner = MultisigTransaction {
            to: network.conditional_transaction_delegate,
            value: U256::zero(),
            data: data.into(),
            operation: MultisigOperation::DelegateCall,
        };
        Ok(Self {
            commitment: MultisigTxCommitment::new(multisig_address, multisig_owners, inner)?,
            app_identity_hash,
            free_balance_app_identity_hash,
            interpreter_addr,
            interpreter_params,
            multisig_owners: multisig_owners.to_vec(),
        })
    }

    #[must_use]
    pub fn app_identity_hash(&self) -> Bytes32 {
        self.app_identity_hash
    }

    #[must_use]
    pub fn interpreter_addr(&self) -> Address {
        self.interpreter_addr
    }

    #[must_use]
    pub fn hash_to_sign(&self) -> Bytes32 {
        self.commitment.hash_to_sign()
    }

    pub fn add_signature(&mut self, signature: SignatureBytes) -> Result<Address, CommitmentError> {
        self.commitment.add_signature(signature)
    }

    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.commitment.signatures().is_fully_signed()
    }

    #[must_use]
    pub fn signatures(&self) -> Vec<SignatureBytes> {
        self.commitment.signatures().to_vec()
    }

    /// Re-verify both stored signatures; used on rehydrated commitments.
    pub fn verify_signatures(&self) -> Result<(), CommitmentError> {
        self.commitment
            .signatures()
            .verify_full(&self.hash_to_sign(), self.commitment.multisig_address())
    }

    /// The broadcastable transaction; fails unless fully signed.
    pub fn signed_transaction(&self) -> Result<MultisigTransaction, CommitmentError> {
        self.commitment.signed_transaction()
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    #[must_use]
    pub fn to_json(&self) -> ConditionalTransactionCommitmentJson {
        ConditionalTransactionCommitmentJson {
            app_identity_hash: self.app_identity_hash,
            free_balance_app_identity_hash: self.free_balance_app_identity_hash,
            interpreter_addr: self.interpreter_addr,
            interpreter_params: self.interpreter_params.clone(),
            multisig_address: self.commitment.multisig_address(),
            multisig_owners: self.multisig_owners.clone(),
            signatures: self.signatures(),
        }
    }

    /// Rehydrate from a persisted or counterparty-supplied document,
    /// re-deriving the calldata from the network context and re-verifying
    /// every included signature.
    pub fn from_json(
        network: &NetworkContext,
        json: ConditionalTransactionCommitmentJson,
    ) -> Result<Self, CommitmentError> {
        let mut commitment = Self::new(
            network,
            json.multisig_address,
            &json.multisig_owners,
            json.app_identity_hash,
            json.free_balance_app_identity_hash,
            json.interpreter_params,
        )?;
        for signature in json.signatures {
            commitment.add_signature(signature)?;
        }
        Ok(commitment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::ChannelKeypair;

    fn network() -> NetworkContext {
        NetworkContext {
            proxy_factory: Address([0x01; 20]),
            multisig_mastercopy: Address([0x02; 20]),
            identity_app: Address([0x03; 20]),
            challenge_registry: Address([0x04; 20]),
            conditional_transaction_delegate: Address([0x05; 20]),
            two_party_fixed_outcome_interpreter: Address([0x06; 20]),
            single_asset_two_party_coin_transfer_interpreter: Address([0x07; 20]),
            multi_asset_multi_party_coin_transfer_interpreter: Address([0x08; 20]),
        }
    }

    fn params() -> InterpreterParams {
        InterpreterParams::SingleAssetTwoPartyCoinTransfer {
            limit: U256::from(7u64),
            token_address: Address([0x77; 20]),
        }
    }

    #[test]
    fn test_interpreter_resolved_from_outcome_type() {
        let a = ChannelKeypair::generate();
        let b = ChannelKeypair::generate();
        let commitment = ConditionalTransactionCommitment::new(
            &network(),
            Address([0x20; 20]),
            &[a.address(), b.address()],
            Bytes32([0x11; 32]),
            Bytes32([0x22; 32]),
            params(),
        )
        .unwrap();
        assert_eq!(commitment.interpreter_addr(), Address([0x07; 20]));
    }

    #[test]
    fn test_json_round_trip_with_signatures() {
        let a = ChannelKeypair::generate();
        let b = ChannelKeypair::generate();
        let mut commitment = ConditionalTransactionCommitment::new(
            &network(),
            Address([0x20; 20]),
            &[a.address(), b.address()],
            Bytes32([0x11; 32]),
            Bytes32([0x22; 32]),
            params(),
        )
        .unwrap();
        let digest = commitment.hash_to_sign();
        commitment.add_signature(a.sign_digest(&digest).unwrap()).unwrap();
        commitment.add_signature(b.sign_digest(&digest).unwrap()).unwrap();

        let rehydrated =
            ConditionalTransactionCommitment::from_json(&network(), commitment.to_json()).unwrap();
        rehydrated.verify_signatures().unwrap();
        assert_eq!(rehydrated, commitment);
    }

    #[test]
    fn test_interpreter_params_encoding_varies_by_shape() {
        let single = encode_interpreter_params(&params());
        let multi = encode_interpreter_params(&InterpreterParams::MultiAssetMultiPartyCoinTransfer {
            limit: vec![U256::from(7u64)],
            token_addresses: vec![Address([0x77; 20])],
        });
        assert_ne!(single, multi);
    }
}
