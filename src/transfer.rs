//! Construction of the unsigned payment transfer.
//!
//! Given a challenge and a sender, the builder derives the associated token
//! accounts on both sides, asks the chain which of them already exist, and
//! emits creation instructions for the missing ones ahead of the transfer
//! itself. The result is compiled, signed elsewhere, and only ever travels
//! inside a payment proof; this crate never submits it.

use solana_hash::Hash;
use solana_instruction::Instruction;
use solana_message::VersionedMessage;
use solana_message::v0::Message as MessageV0;
use solana_pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;
use std::sync::Arc;
use tracing::debug;

use crate::chain::ChainClient;
use crate::error::PaymentError;
use crate::proto::challenge::PaymentChallenge;

/// An unsubmitted transfer covering one payment challenge.
///
/// Instruction order is fixed: account creations (zero, one, or two of them)
/// precede the transfer. A transaction missing a still-absent creation step
/// would be rejected by the chain.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    /// Sender's token account for the challenge asset.
    pub sender_token_account: Pubkey,
    /// Recipient's token account for the challenge asset.
    pub recipient_token_account: Pubkey,
    /// Blockhash bounding the transaction's validity window.
    pub recent_blockhash: Hash,
    create_instructions: Vec<Instruction>,
    transfer_instruction: Instruction,
    payer: Pubkey,
}

impl UnsignedTransfer {
    /// Number of token-account creation steps included.
    pub fn account_creations(&self) -> usize {
        self.create_instructions.len()
    }

    /// All instructions in execution order: creations, then the transfer.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut instructions = self.create_instructions.clone();
        instructions.push(self.transfer_instruction.clone());
        instructions
    }

    /// Compiles a v0 message with the sender as fee payer.
    pub fn into_message(self) -> Result<VersionedMessage, PaymentError> {
        let instructions = self.instructions();
        let message = MessageV0::try_compile(&self.payer, &instructions, &[], self.recent_blockhash)
            .map_err(|e| PaymentError::MessageCompile(e.to_string()))?;
        Ok(VersionedMessage::V0(message))
    }
}

/// Builds [`UnsignedTransfer`]s from payment challenges.
#[derive(Clone)]
pub struct TransferBuilder {
    chain: Arc<dyn ChainClient>,
}

impl TransferBuilder {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Constructs the unsigned transfer paying `challenge` from `sender`.
    ///
    /// Side effects are limited to read-only chain queries: one existence
    /// check per derived token account and one blockhash fetch. Chain
    /// failures propagate as [`PaymentError::ChainQuery`] without retry.
    pub async fn build(
        &self,
        challenge: &PaymentChallenge,
        sender: Pubkey,
    ) -> Result<UnsignedTransfer, PaymentError> {
        let mint = challenge.asset.pubkey();
        let recipient = challenge.recipient.pubkey();
        let sender_token_account = get_associated_token_address(&sender, &mint);
        let recipient_token_account = get_associated_token_address(&recipient, &mint);

        let mut create_instructions = Vec::new();
        for (owner, token_account) in [
            (sender, sender_token_account),
            (recipient, recipient_token_account),
        ] {
            if !self.chain.account_exists(&token_account).await? {
                debug!(%owner, %token_account, "token account missing, adding creation step");
                create_instructions.push(create_associated_token_account(
                    &sender,
                    &owner,
                    &mint,
                    &spl_token::id(),
                ));
            }
        }

        // Plain SPL transfer, mirroring what the wallet emits elsewhere;
        // transfer_checked would cost an extra mint fetch for the decimals.
        #[allow(deprecated)]
        let transfer_instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            &sender_token_account,
            &recipient_token_account,
            &sender,
            &[],
            challenge.amount,
        )
        .map_err(|e| PaymentError::MessageCompile(e.to_string()))?;

        let recent_blockhash = self.chain.recent_block_reference().await?;

        Ok(UnsignedTransfer {
            sender_token_account,
            recipient_token_account,
            recent_blockhash,
            create_instructions,
            transfer_instruction,
            payer: sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Address;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ground-truth chain: a set of existing accounts and a fixed blockhash.
    struct FakeChain {
        existing: Mutex<HashSet<Pubkey>>,
        blockhash: Hash,
        queries: AtomicUsize,
        fail: bool,
    }

    impl FakeChain {
        fn with_accounts(existing: impl IntoIterator<Item = Pubkey>) -> Self {
            Self {
                existing: Mutex::new(existing.into_iter().collect()),
                blockhash: Hash::new_from_array([7; 32]),
                queries: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                existing: Mutex::new(HashSet::new()),
                blockhash: Hash::new_from_array([7; 32]),
                queries: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn account_exists(&self, address: &Pubkey) -> Result<bool, PaymentError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::ChainQuery("rpc unreachable".to_string()));
            }
            Ok(self.existing.lock().unwrap().contains(address))
        }

        async fn recent_block_reference(&self) -> Result<Hash, PaymentError> {
            if self.fail {
                return Err(PaymentError::ChainQuery("rpc unreachable".to_string()));
            }
            Ok(self.blockhash)
        }
    }

    fn challenge(amount: u64) -> PaymentChallenge {
        PaymentChallenge {
            asset: Address::new(Pubkey::new_unique()),
            recipient: Address::new(Pubkey::new_unique()),
            amount,
            premium_rpc_url: None,
        }
    }

    #[tokio::test]
    async fn test_no_creations_when_both_accounts_exist() {
        let challenge = challenge(100);
        let sender = Pubkey::new_unique();
        let mint = challenge.asset.pubkey();
        let sender_ata = get_associated_token_address(&sender, &mint);
        let recipient_ata =
            get_associated_token_address(&challenge.recipient.pubkey(), &mint);
        let chain = Arc::new(FakeChain::with_accounts([sender_ata, recipient_ata]));

        let transfer = TransferBuilder::new(chain.clone())
            .build(&challenge, sender)
            .await
            .unwrap();
        assert_eq!(transfer.account_creations(), 0);
        assert_eq!(transfer.instructions().len(), 1);
        assert_eq!(transfer.sender_token_account, sender_ata);
        assert_eq!(transfer.recipient_token_account, recipient_ata);
        // One existence query per derived account.
        assert_eq!(chain.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_creation_precedes_transfer_for_missing_recipient() {
        let challenge = challenge(100);
        let sender = Pubkey::new_unique();
        let mint = challenge.asset.pubkey();
        let sender_ata = get_associated_token_address(&sender, &mint);
        let chain = Arc::new(FakeChain::with_accounts([sender_ata]));

        let transfer = TransferBuilder::new(chain)
            .build(&challenge, sender)
            .await
            .unwrap();
        assert_eq!(transfer.account_creations(), 1);
        let instructions = transfer.instructions();
        assert_eq!(instructions.len(), 2);
        assert_eq!(
            instructions[0].program_id,
            spl_associated_token_account::id()
        );
        assert_eq!(instructions[1].program_id, spl_token::id());
    }

    #[tokio::test]
    async fn test_two_creations_when_nothing_exists() {
        let challenge = challenge(5);
        let sender = Pubkey::new_unique();
        let chain = Arc::new(FakeChain::with_accounts([]));

        let transfer = TransferBuilder::new(chain)
            .build(&challenge, sender)
            .await
            .unwrap();
        assert_eq!(transfer.account_creations(), 2);
        let instructions = transfer.instructions();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[2].program_id, spl_token::id());
    }

    #[tokio::test]
    async fn test_message_compiles_with_sender_as_payer() {
        let challenge = challenge(100);
        let sender = Pubkey::new_unique();
        let chain = Arc::new(FakeChain::with_accounts([]));

        let transfer = TransferBuilder::new(chain.clone())
            .build(&challenge, sender)
            .await
            .unwrap();
        let blockhash = transfer.recent_blockhash;
        assert_eq!(blockhash, chain.blockhash);
        let message = transfer.into_message().unwrap();
        assert_eq!(message.header().num_required_signatures, 1);
        assert_eq!(message.static_account_keys()[0], sender);
        assert_eq!(*message.recent_blockhash(), blockhash);
    }

    #[tokio::test]
    async fn test_chain_failure_propagates_unretried() {
        let challenge = challenge(100);
        let chain = Arc::new(FakeChain::failing());

        let err = TransferBuilder::new(chain.clone())
            .build(&challenge, Pubkey::new_unique())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::ChainQuery(_)));
        assert_eq!(chain.queries.load(Ordering::SeqCst), 1);
    }
}
