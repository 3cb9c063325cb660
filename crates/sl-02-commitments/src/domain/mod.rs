pub mod conditional;
pub mod errors;
pub mod multisig_commitment;
pub mod set_state;
pub mod setup;
pub mod withdraw;

pub use conditional::{encode_interpreter_params, ConditionalTransactionCommitment};
pub use errors::CommitmentError;
pub use multisig_commitment::{multisig_tx_digest, MultisigTxCommitment, OwnerSignatures};
pub use set_state::{assert_signed_by, set_state_digest, SetStateCommitment};
pub use setup::SetupCommitment;
pub use withdraw::WithdrawCommitment;
