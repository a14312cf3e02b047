//! Signing seams: the key store that names the active account and the signer
//! that turns a compiled transfer message into signed transaction bytes.
//!
//! Both are external collaborators from the interceptor's point of view.
//! [`KeypairWallet`] implements both over a local keypair for standalone use;
//! extension hosts plug in their own key storage behind the same traits.

use async_trait::async_trait;
use solana_keypair::Keypair;
use solana_message::VersionedMessage;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use std::sync::Arc;

use crate::error::PaymentError;

/// Resolves the wallet's active signing identity.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Address of the account payments are drawn from.
    ///
    /// Fails with [`PaymentError::UnresolvedSender`] when no account is
    /// active.
    async fn active_account(&self) -> Result<Pubkey, PaymentError>;
}

/// Signs a compiled transfer message.
#[async_trait]
pub trait TransferSigner: Send + Sync {
    /// Returns the serialized, fully signed transaction for `message`.
    ///
    /// Fails with [`PaymentError::SigningRejected`] when the signer refuses,
    /// or [`PaymentError::SignerUnavailable`] when it cannot be reached.
    async fn sign_transfer(&self, message: &VersionedMessage) -> Result<Vec<u8>, PaymentError>;
}

/// [`KeyStore`] and [`TransferSigner`] over a local in-process keypair.
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl KeyStore for KeypairWallet {
    async fn active_account(&self) -> Result<Pubkey, PaymentError> {
        Ok(self.keypair.pubkey())
    }
}

#[async_trait]
impl TransferSigner for KeypairWallet {
    async fn sign_transfer(&self, message: &VersionedMessage) -> Result<Vec<u8>, PaymentError> {
        // Transfer messages compile with the sender as sole fee payer; a
        // message wanting more signatures did not come from our builder.
        let required = message.header().num_required_signatures as usize;
        if required != 1 {
            return Err(PaymentError::SigningRejected(format!(
                "expected a single required signature, got {required}"
            )));
        }
        let signature = self
            .keypair
            .try_sign_message(&message.serialize())
            .map_err(|e| PaymentError::SigningRejected(e.to_string()))?;
        let transaction = VersionedTransaction {
            signatures: vec![signature],
            message: message.clone(),
        };
        bincode::serialize(&transaction).map_err(|e| PaymentError::SigningRejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_hash::Hash;
    use solana_message::v0::Message as MessageV0;

    fn compiled_transfer_message(payer: Pubkey) -> VersionedMessage {
        #[allow(deprecated)]
        let instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &payer,
            &[],
            1,
        )
        .unwrap();
        let message =
            MessageV0::try_compile(&payer, &[instruction], &[], Hash::new_from_array([7; 32])).unwrap();
        VersionedMessage::V0(message)
    }

    #[tokio::test]
    async fn test_keypair_wallet_signs_single_payer_message() {
        let wallet = KeypairWallet::new(Keypair::new());
        let message = compiled_transfer_message(wallet.address());

        let signed = wallet.sign_transfer(&message).await.unwrap();
        let transaction: VersionedTransaction = bincode::deserialize(&signed).unwrap();
        assert_eq!(transaction.signatures.len(), 1);
        assert!(
            transaction.signatures[0]
                .verify(wallet.address().as_ref(), &message.serialize())
        );
    }

    #[tokio::test]
    async fn test_keypair_wallet_exposes_active_account() {
        let wallet = KeypairWallet::new(Keypair::new());
        let account = wallet.active_account().await.unwrap();
        assert_eq!(account, wallet.address());
    }

    #[tokio::test]
    async fn test_keypair_wallet_rejects_multi_signer_message() {
        let wallet = KeypairWallet::new(Keypair::new());
        // Authority differs from the payer, so the message wants two
        // signatures and the wallet must refuse it.
        let payer = Pubkey::new_unique();
        let second_signer = Pubkey::new_unique();
        #[allow(deprecated)]
        let instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &second_signer,
            &[],
            1,
        )
        .unwrap();
        let message = VersionedMessage::V0(
            MessageV0::try_compile(&payer, &[instruction], &[], Hash::new_from_array([7; 32])).unwrap(),
        );
        let err = wallet.sign_transfer(&message).await.unwrap_err();
        assert!(matches!(err, PaymentError::SigningRejected(_)));
    }
}
